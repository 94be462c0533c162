use crate::support::{FakeCompanion, Permission, client};

use emporter_core::error::{ConsentError, ErrorKind, RegistryError, SessionError};

use models::ConsentState;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::sleep;

#[tokio::test]
async fn given_stopped_companion_when_resolving_then_unknown_without_launching() {
    let fake = FakeCompanion::new();
    let client = client(&fake).await;

    let state = client.resolve_consent(true).await.unwrap();

    assert_eq!(state, ConsentState::Unknown);
    assert_eq!(fake.launches(), 0);
    assert_eq!(fake.prompts(), 0);
}

#[tokio::test]
async fn given_undetermined_permission_when_resolving_silently_then_required_without_prompt() {
    let fake = FakeCompanion::new();
    fake.start();
    fake.set_permission(Permission::Undetermined { answer: true });
    let client = client(&fake).await;

    let state = client.resolve_consent(false).await.unwrap();

    assert_eq!(state, ConsentState::Required);
    assert_eq!(fake.prompts(), 0);
    assert_eq!(client.consent().cached(), ConsentState::Unknown, "Required is not cached");
}

/// **VALUE**: Concurrent prompting callers share a single prompt.
///
/// **WHY THIS MATTERS**: A consent dialog per caller would stack identical system dialogs
/// in front of the user.
///
/// **BUG THIS CATCHES**: Would catch prompts issued per call instead of single-flighted.
#[tokio::test]
async fn given_concurrent_prompting_callers_when_resolving_then_one_prompt_shown() {
    // GIVEN: A running companion whose permission has not been decided
    let fake = FakeCompanion::new();
    fake.start();
    fake.set_permission(Permission::Undetermined { answer: true });
    let client = Arc::new(client(&fake).await);

    // WHEN: Five callers resolve with prompting allowed
    let calls = (0..5).map(|_| {
        let client = Arc::clone(&client);
        async move { client.resolve_consent(true).await }
    });
    let states = join_all(calls).await;

    // THEN: One prompt, everyone granted, result cached
    assert_eq!(fake.prompts(), 1);
    for state in states {
        assert_eq!(state.unwrap(), ConsentState::Granted);
    }
    assert_eq!(client.consent().cached(), ConsentState::Granted);
}

/// **VALUE**: A caller whose silent check outlives someone else's prompt adopts that answer.
///
/// **BUG THIS CATCHES**: Would catch the cache not being re-read between a slow silent
/// check returning `Required` and the prompt, which shows a second dialog after a denial.
#[tokio::test]
async fn given_denial_settled_during_slow_silent_check_when_resolving_then_no_second_prompt() {
    // GIVEN: Silent checks are slow and the user will deny the prompt
    let fake = FakeCompanion::new();
    fake.start();
    fake.set_permission(Permission::Undetermined { answer: false });
    fake.set_silent_check_delay(Duration::from_millis(100));
    let client = Arc::new(client(&fake).await);

    // WHEN: A prompts; B starts its own silent check while A's prompt is showing
    let first = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.resolve_consent(true).await })
    };
    sleep(Duration::from_millis(110)).await;
    let second = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.resolve_consent(true).await })
    };

    // THEN: Both see the one denial and only one prompting request was made
    assert_eq!(first.await.unwrap().unwrap(), ConsentState::Denied);
    assert_eq!(second.await.unwrap().unwrap(), ConsentState::Denied);
    assert_eq!(fake.prompt_requests(), 1);
    assert_eq!(fake.prompts(), 1);
}

/// **VALUE**: A denial is never re-prompted for the same companion instance.
///
/// **WHY THIS MATTERS**: Re-prompting after the user said no is hostile; the platform may
/// also stop showing the dialog and leave the caller hanging.
///
/// **BUG THIS CATCHES**: Would catch `Denied` not being cached, or the cache not being keyed
/// by process instance so a restart never gets a fresh decision.
#[tokio::test]
async fn given_denied_consent_when_resolving_again_then_no_new_prompt_until_new_instance() {
    // GIVEN: The user denies the first prompt
    let fake = FakeCompanion::new();
    fake.start();
    fake.set_permission(Permission::Undetermined { answer: false });
    let client = client(&fake).await;
    assert_eq!(client.resolve_consent(true).await.unwrap(), ConsentState::Denied);

    // WHEN: Resolving again with prompting allowed, twice
    let again = client.resolve_consent(true).await.unwrap();
    let once_more = client.resolve_consent(true).await.unwrap();

    // THEN: Still denied with no further prompt
    assert_eq!(again, ConsentState::Denied);
    assert_eq!(once_more, ConsentState::Denied);
    assert_eq!(fake.prompts(), 1);

    // AND WHEN: That instance exits and a new one starts with the decision reset
    fake.crash();
    fake.start();
    fake.set_permission(Permission::Undetermined { answer: true });

    // THEN: The new instance gets its own prompt
    assert_eq!(client.resolve_consent(true).await.unwrap(), ConsentState::Granted);
    assert_eq!(fake.prompts(), 2);
}

#[tokio::test]
async fn given_required_consent_when_listing_then_fails_without_prompting() {
    let fake = FakeCompanion::new();
    fake.start();
    fake.set_permission(Permission::Undetermined { answer: true });
    let client = client(&fake).await;

    let result = client.list_tunnels(None).await;

    assert!(matches!(
        result,
        Err(RegistryError::Session(SessionError::Consent(
            ConsentError::Required { .. }
        )))
    ));
    assert_eq!(fake.prompts(), 0);
}

/// **VALUE**: A companion-side authorization failure drops the cached grant.
///
/// **BUG THIS CATCHES**: Would catch a stale `Granted` cache that keeps every later call
/// failing with `Unauthorized` instead of re-probing.
#[tokio::test]
async fn given_revoked_permission_when_operating_then_unauthorized_and_cache_cleared() {
    // GIVEN: Consent granted and cached
    let fake = FakeCompanion::new();
    fake.start();
    let client = client(&fake).await;
    assert_eq!(client.resolve_consent(false).await.unwrap(), ConsentState::Granted);

    // WHEN: The user revokes access behind our back and we call the companion
    fake.set_permission(Permission::Denied);
    let result = client.list_tunnels(None).await;

    // THEN: Unauthorized, cache dropped, and the next resolve sees the denial
    let error = result.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Unauthorized);
    assert_eq!(client.consent().cached(), ConsentState::Unknown);
    assert_eq!(client.resolve_consent(false).await.unwrap(), ConsentState::Denied);
}

#[test]
fn given_blocking_caller_when_resolving_then_returns_state() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let fake = FakeCompanion::new();
    fake.start();
    let client = runtime.block_on(client(&fake));

    let state = client.resolve_consent_blocking(false).unwrap();

    assert_eq!(state, ConsentState::Granted);
}
