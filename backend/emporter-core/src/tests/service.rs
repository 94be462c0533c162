use crate::service::{ServiceSnapshot, decode_service_state};

use models::ServiceState;

use std::time::{Duration, UNIX_EPOCH};

use serde_json::{Value, json};

/// **VALUE**: Conflict details are decoded from both timestamp encodings.
///
/// **WHY THIS MATTERS**: `next_reconnect_at` drives the "retrying in ..." hint shown to
/// the user while the service is conflicted.
///
/// **BUG THIS CATCHES**: Would catch an RFC 3339 parser that rejects fractional
/// seconds, or epoch seconds being read as milliseconds.
#[test]
fn given_conflicted_state_when_decoding_then_carries_reason_and_reconnect_time() {
    // GIVEN: The same reconnect time in both encodings
    let expected = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    // WHEN: Decoding each
    let from_rfc3339 = decode_service_state(
        "conflicted",
        Some("Another device is using this account".to_string()),
        &json!("2023-11-14T22:13:20Z"),
    )
    .unwrap();
    let from_epoch = decode_service_state("conflicted", None, &json!(1_700_000_000)).unwrap();

    // THEN: Both carry the reconnect time; only the first has a reason
    assert_eq!(from_rfc3339.next_reconnect_at(), Some(expected));
    assert_eq!(
        from_rfc3339.conflict_reason(),
        Some("Another device is using this account")
    );
    assert_eq!(from_epoch.next_reconnect_at(), Some(expected));
    assert_eq!(from_epoch.conflict_reason(), None);
}

#[test]
fn given_state_names_when_decoding_then_maps_each_state() {
    assert_eq!(
        decode_service_state("suspended", None, &Value::Null),
        Some(ServiceState::Suspended)
    );
    assert_eq!(
        decode_service_state("connecting", None, &Value::Null),
        Some(ServiceState::Connecting)
    );
    assert_eq!(
        decode_service_state("connected", Some("ignored".to_string()), &Value::Null),
        Some(ServiceState::Connected)
    );
    assert_eq!(decode_service_state("offline", None, &Value::Null), None);
}

#[test]
fn given_empty_reason_when_decoding_conflict_then_reason_is_none() {
    let state = decode_service_state("conflicted", Some(String::new()), &json!("soon")).unwrap();

    assert_eq!(
        state,
        ServiceState::Conflicted {
            reason: None,
            next_reconnect_at: None,
        }
    );
}

#[test]
fn given_snapshot_when_replaced_then_clones_observe_new_state() {
    let snapshot = ServiceSnapshot::default();
    let observer = snapshot.clone();

    snapshot.replace(ServiceState::Connected);

    assert_eq!(observer.get(), ServiceState::Connected);
}
