use crate::support::{FakeCompanion, client};

use emporter_core::error::{ErrorKind, ServiceError};

use models::ServiceState;

use serde_json::json;

fn proxy_record(port: u16) -> serde_json::Value {
    json!({
        "kind": "proxy",
        "name": format!("port {port}"),
        "isEnabled": true,
        "proxyPort": port,
        "state": "disconnected",
    })
}

#[tokio::test]
async fn given_no_tunnels_when_resuming_then_no_tunnels_configured() {
    let fake = FakeCompanion::new();
    fake.start();
    let client = client(&fake).await;

    let result = client.resume_service().await;

    assert!(matches!(result, Err(ServiceError::NoTunnelsConfigured { .. })));
    assert_eq!(client.service_state().await.unwrap(), ServiceState::Suspended);
}

#[tokio::test]
async fn given_tunnels_when_resuming_then_connected() {
    let fake = FakeCompanion::new();
    fake.start();
    fake.insert_tunnel(proxy_record(8080));
    let client = client(&fake).await;

    client.resume_service().await.unwrap();

    let state = client.service_state().await.unwrap();
    assert!(state.is_connected());
    assert_eq!(client.service_snapshot(), ServiceState::Connected);
}

/// **VALUE**: After suspending, nothing is left exposed.
///
/// **WHY THIS MATTERS**: Suspend is what users reach for to take everything offline at once.
///
/// **BUG THIS CATCHES**: Would catch the snapshot reporting the pre-suspend state, or
/// tunnels remaining connected behind a suspended service.
#[tokio::test]
async fn given_connected_service_when_suspended_then_no_tunnel_connected() {
    // GIVEN: Two tunnels, service resumed
    let fake = FakeCompanion::new();
    fake.start();
    fake.insert_tunnel(proxy_record(8080));
    fake.insert_tunnel(proxy_record(9090));
    let client = client(&fake).await;
    client.resume_service().await.unwrap();
    assert!(client.list_tunnels(None).await.unwrap().iter().all(|t| t.is_connected()));

    // WHEN: Suspending
    client.suspend_service().await.unwrap();

    // THEN: Snapshot and companion agree on Suspended and no tunnel is connected
    assert_eq!(client.service_snapshot(), ServiceState::Suspended);
    assert_eq!(client.service_state().await.unwrap(), ServiceState::Suspended);
    let tunnels = client.list_tunnels(None).await.unwrap();
    assert_eq!(tunnels.len(), 2);
    assert!(tunnels.iter().all(|t| !t.is_connected()));
}

#[tokio::test]
async fn given_stopped_companion_without_auto_launch_when_reading_state_then_not_running() {
    let fake = FakeCompanion::new();
    let client = crate::support::client_with(&fake, crate::support::test_config(false)).await;

    let error = client.service_state().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NotRunning);
    assert_eq!(fake.launches(), 0);
}

#[tokio::test]
async fn given_denied_consent_when_suspending_then_consent_denied() {
    let fake = FakeCompanion::new();
    fake.start();
    fake.set_permission(crate::support::Permission::Denied);
    let client = client(&fake).await;

    let error = client.suspend_service().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ConsentDenied);
}
