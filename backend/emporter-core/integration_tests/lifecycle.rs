use crate::support::{FakeCompanion, FIRST_PID, client, client_with, test_config};

use emporter_core::error::{ErrorKind, LifecycleError, RegistryError, SessionError};

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;

// ----------------------------------------------------------------------------
// launch_in_background()
// ----------------------------------------------------------------------------

/// **VALUE**: Concurrent launch requests produce exactly one launch attempt.
///
/// **WHY THIS MATTERS**: Several features may need the companion at the same time. Two
/// launches would start two instances fighting over the same tunnels.
///
/// **BUG THIS CATCHES**: Would catch the check-then-launch race where every caller sees
/// "not running" and launches on its own.
#[tokio::test]
async fn given_concurrent_launches_when_none_in_flight_then_one_attempt_and_same_outcome() {
    // GIVEN: An installed companion that is not running
    let fake = FakeCompanion::new();
    let client = Arc::new(client(&fake).await);

    // WHEN: Ten callers launch at once
    let attempts = (0..10).map(|_| {
        let client = Arc::clone(&client);
        async move { client.launch_in_background(None).await }
    });
    let outcomes = join_all(attempts).await;

    // THEN: One launch happened and everyone observed the same process
    assert_eq!(fake.launches(), 1);
    for outcome in outcomes {
        assert_eq!(outcome.unwrap().pid, FIRST_PID);
    }
}

#[tokio::test]
async fn given_running_companion_when_launching_then_attaches_without_new_launch() {
    let fake = FakeCompanion::new();
    let pid = fake.start();
    let client = client(&fake).await;

    let handle = client.launch_in_background(None).await.unwrap();

    assert_eq!(handle.pid, pid);
    assert_eq!(fake.launches(), 0);
}

#[tokio::test]
async fn given_missing_bundle_when_launching_then_not_installed() {
    let fake = FakeCompanion::new();
    fake.set_installed(false);
    let client = client(&fake).await;

    let result = client.launch_in_background(None).await;

    assert!(matches!(result, Err(LifecycleError::NotInstalled { .. })));
    assert_eq!(fake.launches(), 0);
}

/// **VALUE**: A companion that never accepts commands fails with `Timeout`.
///
/// **BUG THIS CATCHES**: Would catch a readiness loop with no deadline, which hangs every
/// caller forever when the companion wedges during startup.
#[tokio::test]
async fn given_companion_never_ready_when_launching_then_times_out() {
    // GIVEN: A companion that starts but never answers
    let fake = FakeCompanion::new();
    fake.set_never_ready();
    let client = client(&fake).await;

    // WHEN: Launching with a short deadline
    let result = client
        .launch_in_background(Some(Duration::from_millis(200)))
        .await;

    // THEN: Timeout, classified as retryable
    let error = result.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert!(error.kind().is_retryable());
}

/// **VALUE**: The deadline covers spawning the process, not just waiting for it.
///
/// **BUG THIS CATCHES**: Would catch a launch call that never returns escaping the
/// timeout and hanging every caller of the shared attempt.
#[tokio::test]
async fn given_launch_hangs_when_launching_then_times_out_within_deadline() {
    // GIVEN: Spawning the companion takes far longer than the deadline
    let fake = FakeCompanion::new();
    fake.set_launch_delay(Duration::from_secs(30));
    let client = client(&fake).await;

    // WHEN: Launching with a short deadline
    let started = Instant::now();
    let result = client
        .launch_in_background(Some(Duration::from_millis(100)))
        .await;

    // THEN: Timeout, reported near the deadline
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn given_launch_failure_when_launching_then_launch_failed_and_next_call_retries() {
    let fake = FakeCompanion::new();
    fake.set_fail_launch();
    let client = client(&fake).await;

    let first = client.launch_in_background(None).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = client.launch_in_background(None).await;

    assert!(matches!(first, Err(LifecycleError::LaunchFailed { .. })));
    assert!(matches!(second, Err(LifecycleError::LaunchFailed { .. })));
    assert_eq!(fake.launches(), 2, "A failed attempt must not be replayed");
}

/// **VALUE**: Abandoning a launch does not abort it for everyone else.
///
/// **BUG THIS CATCHES**: Would catch launch work tied to the first caller's future.
#[tokio::test]
async fn given_caller_gives_up_when_launch_continues_then_later_caller_joins_same_attempt() {
    // GIVEN: A slow-starting companion
    let fake = FakeCompanion::new();
    fake.set_ready_delay(Duration::from_millis(150));
    let client = client(&fake).await;

    // WHEN: The first caller stops waiting early and a second caller follows
    let abandoned =
        tokio::time::timeout(Duration::from_millis(30), client.launch_in_background(None)).await;
    let joined = client.launch_in_background(None).await;

    // THEN: Still exactly one launch, and it succeeded
    assert!(abandoned.is_err());
    assert_eq!(joined.unwrap().pid, FIRST_PID);
    assert_eq!(fake.launches(), 1);
}

#[test]
fn given_blocking_caller_when_launching_then_waits_for_outcome() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let fake = FakeCompanion::new();
    let client = runtime.block_on(client(&fake));

    let handle = client.launch_in_background_blocking(None).unwrap();

    assert_eq!(handle.pid, FIRST_PID);
    assert!(client.is_running());
}

// ----------------------------------------------------------------------------
// auto launch through remote operations
// ----------------------------------------------------------------------------

#[tokio::test]
async fn given_auto_launch_disabled_when_listing_then_not_running() {
    let fake = FakeCompanion::new();
    let client = client_with(&fake, test_config(false)).await;

    let result = client.list_tunnels(None).await;

    assert!(matches!(
        result,
        Err(RegistryError::Session(SessionError::Lifecycle(
            LifecycleError::NotRunning { .. }
        )))
    ));
    assert_eq!(fake.launches(), 0);
}

#[tokio::test]
async fn given_auto_launch_enabled_when_listing_then_launches_first() {
    let fake = FakeCompanion::new();
    let client = client(&fake).await;

    let tunnels = client.list_tunnels(None).await.unwrap();

    assert!(tunnels.is_empty());
    assert_eq!(fake.launches(), 1);
}

// ----------------------------------------------------------------------------
// application / activate / quit
// ----------------------------------------------------------------------------

#[tokio::test]
async fn given_running_companion_when_querying_application_then_reports_pid_and_version() {
    let fake = FakeCompanion::new();
    let pid = fake.start();
    let client = client(&fake).await;

    let application = client.application();
    let version = client.version().unwrap();

    assert!(application.is_installed);
    assert!(application.is_running);
    assert_eq!(application.process_identifier, Some(pid));
    assert_eq!(version.app.to_string(), "0.4.1 (412)");
    assert!(client.activate());
}

#[tokio::test]
async fn given_stopped_companion_when_activating_or_quitting_then_no_op() {
    let fake = FakeCompanion::new();
    let client = client(&fake).await;

    assert!(!client.activate());
    assert!(!client.quit());
    assert_eq!(fake.launches(), 0);
}

#[tokio::test]
async fn given_running_companion_when_quitting_then_requests_termination() {
    let fake = FakeCompanion::new();
    fake.start();
    let client = client(&fake).await;

    assert!(client.quit());
    assert!(!client.is_running());
    assert_eq!(fake.running_pid(), None);
}
