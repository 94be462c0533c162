use crate::error::registry::RegistryError;
use crate::error::transport::TransportError;
use crate::registry::wire::{decode_id, decode_tunnel, properties_to_remote, update_value};

use models::{TunnelProperties, TunnelSource, TunnelState, TunnelUpdate};

use std::path::PathBuf;

use serde_json::{Value, json};

/// **VALUE**: A complete proxy record decodes into a proxy tunnel snapshot.
///
/// **BUG THIS CATCHES**: Would catch a camelCase key drifting out of sync with the
/// companion (e.g. `isAuthEnabled` read as `is_auth_enabled`), which silently
/// defaults the field.
#[test]
fn given_proxy_record_when_decoding_then_builds_proxy_tunnel() {
    // GIVEN: A proxy record as the companion reports it
    let record = json!({
        "id": "t-1",
        "kind": "proxy",
        "name": "web",
        "isTemporary": false,
        "isEnabled": true,
        "isAuthEnabled": true,
        "remoteUrl": "https://web.emporter.test",
        "state": "connected",
        "proxyPort": 8080,
        "shouldRewriteHostHeader": true,
        "proxyHostHeader": "web.local"
    });

    // WHEN: Decoding
    let tunnel = decode_tunnel(record).unwrap();

    // THEN: Every field is carried over
    assert_eq!(tunnel.id.as_str(), "t-1");
    assert_eq!(tunnel.name, "web");
    assert!(tunnel.is_enabled);
    assert!(tunnel.is_auth_enabled);
    assert_eq!(tunnel.state, TunnelState::Connected);
    assert_eq!(tunnel.remote_url.as_deref(), Some("https://web.emporter.test"));
    assert_eq!(
        tunnel.source,
        TunnelSource::Proxy {
            port: 8080,
            should_rewrite_host_header: true,
            proxy_host_header: Some("web.local".to_string()),
        }
    );
}

#[test]
fn given_directory_record_with_file_url_when_decoding_then_uses_local_path() {
    let record = json!({
        "id": "t-2",
        "kind": "directory",
        "directory": "file:///srv/site",
        "isBrowsingEnabled": true
    });

    let tunnel = decode_tunnel(record).unwrap();

    assert_eq!(tunnel.directory(), Some(PathBuf::from("/srv/site").as_path()));
    assert_eq!(tunnel.state, TunnelState::Disconnected);
    assert!(matches!(
        tunnel.source,
        TunnelSource::Directory {
            is_browsing_enabled: true,
            is_live_reload_enabled: false,
            ..
        }
    ));
}

/// **VALUE**: A proxy record without a port is a protocol error, not a tunnel on port 0.
#[test]
fn given_proxy_record_without_port_when_decoding_then_returns_transport_error() {
    let result = decode_tunnel(json!({ "id": "t-3", "kind": "proxy" }));

    assert!(matches!(
        result,
        Err(RegistryError::Transport(TransportError::Protocol { .. }))
    ));
}

#[test]
fn given_unknown_kind_when_decoding_then_returns_transport_error() {
    let result = decode_tunnel(json!({ "id": "t-4", "kind": "ssh", "proxyPort": 22 }));

    assert!(matches!(result, Err(RegistryError::Transport(_))));
}

#[test]
fn given_tunnel_references_when_decoding_id_then_accepts_string_object_and_null() {
    assert_eq!(decode_id(json!("t-1")).unwrap(), Some("t-1".to_string()));
    assert_eq!(decode_id(json!({ "id": "t-2" })).unwrap(), Some("t-2".to_string()));
    assert_eq!(decode_id(Value::Null).unwrap(), None);
    assert!(decode_id(json!(42)).is_err());
    assert!(decode_id(json!({ "name": "web" })).is_err());
}

#[test]
fn given_properties_when_encoding_then_only_set_fields_are_sent() {
    let properties = TunnelProperties::default()
        .with_name("docs")
        .with_browsing_enabled(true);

    let remote = properties_to_remote(&properties);

    assert_eq!(Value::Object(remote), json!({ "name": "docs", "isBrowsingEnabled": true }));
}

#[test]
fn given_cleared_host_header_when_encoding_update_then_sends_null() {
    assert_eq!(update_value(&TunnelUpdate::ProxyHostHeader(None)), Value::Null);
    assert_eq!(update_value(&TunnelUpdate::ProxyPort(3000)), json!(3000));
    assert_eq!(
        update_value(&TunnelUpdate::Directory(PathBuf::from("/srv/site"))),
        json!("/srv/site")
    );
}
