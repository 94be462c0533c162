use crate::{ModelError, TunnelBuilder, TunnelKind, TunnelSource, TunnelState};

use std::path::PathBuf;

fn proxy_source(port: u16) -> TunnelSource {
    TunnelSource::Proxy {
        port,
        should_rewrite_host_header: false,
        proxy_host_header: None,
    }
}

/// **VALUE**: Verifies that builder validation rejects records without an id.
///
/// **WHY THIS MATTERS**: Every lookup, delete and notification is keyed by tunnel id.
/// A snapshot without one could never be refreshed or matched against a removal event.
///
/// **BUG THIS CATCHES**: Would catch if the required-id check is removed and the
/// decoder starts producing tunnels that silently fall out of `find()`.
#[test]
fn given_missing_id_when_building_tunnel_then_returns_validation_error() {
    // GIVEN: Builder with everything but an id
    let builder = TunnelBuilder::default()
        .with_name("web")
        .with_source(proxy_source(8080));

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Tunnel id is required");
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}

#[test]
fn given_empty_id_when_building_tunnel_then_returns_validation_error() {
    let result = TunnelBuilder::default()
        .with_id("")
        .with_source(proxy_source(8080))
        .build();

    assert!(matches!(result, Err(ModelError::Validation { .. })));
}

/// **VALUE**: A proxy tunnel to port 0 is not a tunnel anyone can reach.
///
/// **BUG THIS CATCHES**: Would catch a decoder that defaults a missing `proxyPort`
/// to zero instead of rejecting the record.
#[test]
fn given_proxy_port_zero_when_building_tunnel_then_returns_validation_error() {
    let result = TunnelBuilder::default()
        .with_id("t-1")
        .with_source(proxy_source(0))
        .build();

    assert!(matches!(result, Err(ModelError::Validation { .. })));
}

#[test]
fn given_directory_source_with_empty_path_when_building_then_returns_validation_error() {
    let result = TunnelBuilder::default()
        .with_id("t-1")
        .with_source(TunnelSource::Directory {
            directory: PathBuf::new(),
            index_file: None,
            is_browsing_enabled: false,
            is_live_reload_enabled: false,
        })
        .build();

    assert!(matches!(result, Err(ModelError::Validation { .. })));
}

#[test]
fn given_complete_builder_when_building_then_produces_snapshot_with_defaults() {
    // GIVEN: Minimal valid builder plus empty optional strings
    let tunnel = TunnelBuilder::default()
        .with_id("t-1")
        .with_source(proxy_source(8080))
        .with_remote_url(Some(String::new()))
        .with_conflict_reason(Some(String::new()))
        .build()
        .expect("valid tunnel");

    // THEN: Empty strings normalize to None and state defaults to disconnected
    assert_eq!(tunnel.kind(), TunnelKind::Proxy);
    assert_eq!(tunnel.proxy_port(), Some(8080));
    assert_eq!(tunnel.directory(), None);
    assert_eq!(tunnel.state, TunnelState::Disconnected);
    assert_eq!(tunnel.remote_url, None);
    assert_eq!(tunnel.conflict_reason, None);
    assert!(tunnel.name.is_empty());
}
