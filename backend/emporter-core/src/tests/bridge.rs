use crate::bridge::EmporterEvent;
use crate::bridge::event::{
    PROCESS_TERMINATED, SERVICE_STATE_CHANGED, TUNNEL_REMOVED, TUNNEL_STATE_CHANGED,
};
use crate::transport::RawEvent;

use models::{ServiceState, TunnelId};

/// **VALUE**: Tunnel broadcasts decode with their tunnel id.
///
/// **BUG THIS CATCHES**: Would catch the user-info key drifting from `tunnelId`, which
/// turns every tunnel broadcast into a silently dropped one.
#[test]
fn given_tunnel_broadcasts_when_decoding_then_carry_tunnel_id() {
    let removed = RawEvent::new(TUNNEL_REMOVED).with("tunnelId", "t-9");
    let changed = RawEvent::new(TUNNEL_STATE_CHANGED).with("tunnelId", "t-9");

    assert_eq!(
        EmporterEvent::decode(&removed),
        Some(EmporterEvent::TunnelRemoved {
            id: TunnelId::new("t-9")
        })
    );
    assert_eq!(
        EmporterEvent::decode(&changed).and_then(|e| e.tunnel_id().cloned()),
        Some(TunnelId::new("t-9"))
    );
}

/// **VALUE**: Malformed and foreign broadcasts are dropped instead of surfacing.
///
/// **WHY THIS MATTERS**: The bus is shared; other applications' broadcasts and partial
/// payloads must never reach subscribers as bogus events.
#[test]
fn given_malformed_or_foreign_broadcasts_when_decoding_then_returns_none() {
    let missing_id = RawEvent::new(TUNNEL_REMOVED);
    let wrong_type = RawEvent::new(TUNNEL_REMOVED).with("tunnelId", 17);
    let foreign = RawEvent::new("SomeOtherAppDidLaunch").with("pid", 42);

    assert_eq!(EmporterEvent::decode(&missing_id), None);
    assert_eq!(EmporterEvent::decode(&wrong_type), None);
    assert_eq!(EmporterEvent::decode(&foreign), None);
}

#[test]
fn given_process_broadcast_when_decoding_then_pid_is_optional() {
    let with_pid = RawEvent::new(PROCESS_TERMINATED).with("pid", 4242);
    let without_pid = RawEvent::new(PROCESS_TERMINATED);

    assert_eq!(
        EmporterEvent::decode(&with_pid),
        Some(EmporterEvent::ProcessTerminated { pid: Some(4242) })
    );
    assert_eq!(
        EmporterEvent::decode(&without_pid),
        Some(EmporterEvent::ProcessTerminated { pid: None })
    );
}

#[test]
fn given_service_broadcast_when_decoding_then_state_is_decoded_when_present() {
    let connected = RawEvent::new(SERVICE_STATE_CHANGED).with("state", "connected");
    let bare = RawEvent::new(SERVICE_STATE_CHANGED);

    assert_eq!(
        EmporterEvent::decode(&connected),
        Some(EmporterEvent::ServiceStateChanged {
            state: Some(ServiceState::Connected)
        })
    );
    assert_eq!(
        EmporterEvent::decode(&bare),
        Some(EmporterEvent::ServiceStateChanged { state: None })
    );
}
