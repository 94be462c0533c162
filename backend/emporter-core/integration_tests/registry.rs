use crate::support::{FakeCompanion, client};

use emporter_core::error::{ErrorKind, RegistryError};
use emporter_core::{EmporterClient, PredicateCompiler};

use common::RedactedSecret;
use models::{TunnelField, TunnelId, TunnelKind, TunnelProperties, TunnelState, TunnelUpdate};

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::json;

/// A running companion with T1 proxying port 8080 (connected) and T2
/// serving a directory.
async fn two_tunnels() -> (Arc<FakeCompanion>, EmporterClient, TunnelId, TunnelId) {
    let fake = FakeCompanion::new();
    fake.start();
    let t1 = fake.insert_tunnel(json!({
        "kind": "proxy",
        "name": "api",
        "isEnabled": true,
        "proxyPort": 8080,
        "state": "connected",
        "remoteUrl": "https://api.emporter.eu",
    }));
    let t2 = fake.insert_tunnel(json!({
        "kind": "directory",
        "name": "site",
        "isEnabled": true,
        "directory": "/srv/site",
        "serverPort": 0,
        "state": "disconnected",
    }));
    let client = client(&fake).await;

    (fake, client, TunnelId::new(t1), TunnelId::new(t2))
}

/// **VALUE**: Port queries are evaluated by the companion and return only matches.
///
/// **WHY THIS MATTERS**: Callers asking "is 8080 already exposed?" must not get the
/// directory tunnel back just because it exists.
///
/// **BUG THIS CATCHES**: Would catch a compiled predicate that ORs the kind checks wrongly
/// or compares ports as strings.
#[tokio::test]
async fn given_proxy_and_directory_tunnels_when_listing_by_port_then_only_proxy_returned() {
    // GIVEN: T1 on 8080 and T2 serving a directory
    let (_fake, client, t1, _t2) = two_tunnels().await;

    // WHEN: Listing tunnels by port 8080
    let tunnels = client
        .list_tunnels(Some(&PredicateCompiler::by_port(8080)))
        .await
        .unwrap();

    // THEN: Exactly T1, fully decoded
    assert_eq!(tunnels.len(), 1);
    let tunnel = &tunnels[0];
    assert_eq!(tunnel.id, t1);
    assert_eq!(tunnel.kind(), TunnelKind::Proxy);
    assert_eq!(tunnel.proxy_port(), Some(8080));
    assert_eq!(tunnel.state, TunnelState::Connected);
    assert_eq!(tunnel.remote_url.as_deref(), Some("https://api.emporter.eu"));
}

#[tokio::test]
async fn given_tunnels_when_listing_without_predicate_then_all_in_companion_order() {
    let (_fake, client, t1, t2) = two_tunnels().await;

    let ids: Vec<TunnelId> = client
        .tunnels(None)
        .await
        .unwrap()
        .map(|tunnel| tunnel.unwrap().id)
        .collect()
        .await;

    assert_eq!(ids, vec![t1, t2]);
    assert_eq!(client.registry().count(None).await.unwrap(), 2);
}

#[tokio::test]
async fn given_unused_port_when_listing_then_empty() {
    let (_fake, client, _t1, _t2) = two_tunnels().await;

    let tunnels = client
        .list_tunnels(Some(&PredicateCompiler::by_port(9999)))
        .await
        .unwrap();

    assert!(tunnels.is_empty());
}

#[tokio::test]
async fn given_directory_tunnel_when_fetched_then_path_decoded() {
    let (_fake, client, _t1, t2) = two_tunnels().await;

    let tunnel = client.tunnel(&t2).await.unwrap().unwrap();

    assert_eq!(tunnel.kind(), TunnelKind::Directory);
    assert_eq!(tunnel.directory(), Some(Path::new("/srv/site")));
    assert_eq!(tunnel.proxy_port(), None);
}

/// **VALUE**: A deleted tunnel is simply absent, not an error.
///
/// **BUG THIS CATCHES**: Would catch `NotFound` from the companion leaking out of `find`
/// instead of becoming `None`.
#[tokio::test]
async fn given_deleted_tunnel_when_found_by_id_then_none() {
    // GIVEN: T1 exists
    let (fake, client, t1, _t2) = two_tunnels().await;
    let tunnel = client.tunnel(&t1).await.unwrap().unwrap();

    // WHEN: It is deleted
    client.delete_tunnel(&tunnel).await.unwrap();

    // THEN: Looking it up yields nothing, and the listing shrinks
    assert_eq!(client.tunnel(&t1).await.unwrap(), None);
    assert_eq!(fake.tunnel_count(), 1);
    assert_eq!(client.list_tunnels(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn given_deleted_tunnel_when_deleted_again_then_not_found() {
    let (_fake, client, t1, _t2) = two_tunnels().await;
    let tunnel = client.tunnel(&t1).await.unwrap().unwrap();
    client.delete_tunnel(&tunnel).await.unwrap();

    let result = client.delete_tunnel(&tunnel).await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
}

/// **VALUE**: Kind-illegal properties never reach the companion.
///
/// **WHY THIS MATTERS**: The companion would otherwise create a half-configured tunnel and
/// the caller would have to clean it up.
///
/// **BUG THIS CATCHES**: Would catch validation running after the remote call, or not at all.
#[tokio::test]
async fn given_directory_source_with_proxy_port_when_creating_then_rejected_locally() {
    // GIVEN: Two existing tunnels
    let (fake, client, _t1, _t2) = two_tunnels().await;
    let before = fake.tunnel_count();

    // WHEN: Creating a directory tunnel with a proxy-only property
    let result = client
        .create_tunnel(
            "/srv/other",
            TunnelProperties::default().with_proxy_port(3000),
        )
        .await;

    // THEN: InvalidProperty naming the field, and nothing was created
    match result {
        Err(RegistryError::InvalidProperty { field, kind, .. }) => {
            assert_eq!(field, TunnelField::ProxyPort);
            assert_eq!(kind, TunnelKind::Directory);
        }
        other => panic!("expected InvalidProperty, got {other:?}"),
    }
    assert_eq!(fake.tunnel_count(), before);
}

#[tokio::test]
async fn given_new_source_when_creating_then_tunnel_returned_with_properties() {
    let fake = FakeCompanion::new();
    fake.start();
    let client = client(&fake).await;

    let tunnel = client
        .create_tunnel(
            "http://localhost:3000",
            TunnelProperties::default()
                .with_name("dev server")
                .with_rewrite_host_header(true),
        )
        .await
        .unwrap();

    assert_eq!(tunnel.kind(), TunnelKind::Proxy);
    assert_eq!(tunnel.proxy_port(), Some(3000));
    assert_eq!(tunnel.name, "dev server");
    assert_eq!(fake.tunnel_count(), 1);
}

#[tokio::test]
async fn given_existing_source_when_creating_again_then_duplicate_source() {
    let (fake, client, _t1, _t2) = two_tunnels().await;

    let result = client
        .create_tunnel("http://localhost:8080", TunnelProperties::default())
        .await;

    assert!(matches!(result, Err(RegistryError::DuplicateSource { .. })));
    assert_eq!(fake.tunnel_count(), 2);
}

#[tokio::test]
async fn given_bad_source_when_creating_then_invalid_source() {
    let (_fake, client, _t1, _t2) = two_tunnels().await;

    let result = client
        .create_tunnel("ftp://example.com/pub", TunnelProperties::default())
        .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidSource);
}

/// **VALUE**: Loopback spellings are interchangeable when looking up a tunnel by source.
///
/// **BUG THIS CATCHES**: Would catch `127.0.0.1` being compared as a custom host header and
/// missing the tunnel created for `localhost`.
#[tokio::test]
async fn given_localhost_tunnel_when_finding_by_loopback_address_then_same_tunnel() {
    // GIVEN: T1 proxies localhost:8080
    let (_fake, client, t1, _t2) = two_tunnels().await;

    // WHEN: Looking it up by both spellings
    let by_name = client.tunnel_for_source("http://localhost:8080").await.unwrap();
    let by_address = client.tunnel_for_source("http://127.0.0.1:8080").await.unwrap();
    let bare = client.tunnel_for_source("localhost:8080").await.unwrap();

    // THEN: All three resolve to T1
    assert_eq!(by_name.map(|t| t.id), Some(t1.clone()));
    assert_eq!(by_address.map(|t| t.id), Some(t1.clone()));
    assert_eq!(bare.map(|t| t.id), Some(t1));
}

#[tokio::test]
async fn given_custom_host_tunnel_when_finding_then_host_compared_case_insensitively() {
    let fake = FakeCompanion::new();
    fake.start();
    let client = client(&fake).await;
    let created = client
        .create_tunnel("http://myapp.test:4000", TunnelProperties::default())
        .await
        .unwrap();

    let found = client.tunnel_for_source("http://MyApp.Test:4000").await.unwrap();
    let other_host = client.tunnel_for_source("http://other.test:4000").await.unwrap();

    assert_eq!(found.map(|t| t.id), Some(created.id));
    assert_eq!(other_host, None);
}

#[tokio::test]
async fn given_directory_tunnel_when_finding_by_path_then_found() {
    let (_fake, client, _t1, t2) = two_tunnels().await;

    let found = client.tunnel_for_source("/srv/site").await.unwrap();
    let missing = client.tunnel_for_source("/srv/elsewhere").await.unwrap();

    assert_eq!(found.map(|t| t.id), Some(t2));
    assert_eq!(missing, None);
}

/// **VALUE**: Configuring a directory reuses its tunnel however either side spells the path.
///
/// **BUG THIS CATCHES**: Would catch a trailing slash or a `file://` record missing the
/// lookup and `configure` creating a second tunnel for the same directory.
#[tokio::test]
async fn given_url_form_directory_record_when_configuring_with_trailing_slash_then_existing_edited() {
    // GIVEN: The companion recorded the directory as a file URL
    let (fake, client, _t1, _t2) = two_tunnels().await;
    let docs = TunnelId::new(fake.insert_tunnel(json!({
        "kind": "directory",
        "name": "docs",
        "isEnabled": true,
        "directory": "file:///srv/docs/",
        "state": "disconnected",
    })));

    // WHEN: The user names it as a plain path with a trailing slash
    let tunnel = client.configure_tunnel("/srv/docs/").await.unwrap();

    // THEN: The existing tunnel is edited and nothing is created
    assert_eq!(tunnel.map(|t| t.id), Some(docs));
    assert_eq!(fake.edits(), 1);
    assert_eq!(fake.tunnel_count(), 3);
}

#[tokio::test]
async fn given_directory_tunnel_when_finding_by_file_url_then_found() {
    let (_fake, client, _t1, t2) = two_tunnels().await;

    let found = client.tunnel_for_source("file:///srv/site/").await.unwrap();

    assert_eq!(found.map(|t| t.id), Some(t2));
}

/// **VALUE**: Password protection is applied once and never silently overwritten.
///
/// **WHY THIS MATTERS**: A second call with different credentials would lock out whoever
/// already received the first password.
///
/// **BUG THIS CATCHES**: Would catch the already-protected check being skipped.
#[tokio::test]
async fn given_protected_tunnel_when_protecting_again_then_false_and_credentials_unchanged() {
    // GIVEN: T1 protected once
    let (fake, client, t1, _t2) = two_tunnels().await;
    let tunnel = client.tunnel(&t1).await.unwrap().unwrap();
    let first = client
        .password_protect(&tunnel, "alice", &RedactedSecret::new("correct horse"))
        .await
        .unwrap();
    assert!(first);

    // WHEN: Protecting again with other credentials
    let second = client
        .password_protect(&tunnel, "mallory", &RedactedSecret::new("battery staple"))
        .await
        .unwrap();

    // THEN: Reports no change and the first credentials stand
    assert!(!second);
    let record = fake.tunnel_record(t1.as_str()).unwrap();
    assert_eq!(record["username"], json!("alice"));
    assert_eq!(record["password"], json!("correct horse"));
    let refreshed = client.tunnel(&t1).await.unwrap().unwrap();
    assert!(refreshed.is_auth_enabled);
}

#[tokio::test]
async fn given_empty_password_when_protecting_then_validation_error() {
    let (fake, client, t1, _t2) = two_tunnels().await;
    let tunnel = client.tunnel(&t1).await.unwrap().unwrap();

    let result = client
        .password_protect(&tunnel, "alice", &RedactedSecret::new(""))
        .await;

    assert!(matches!(result, Err(RegistryError::Validation { .. })));
    assert!(fake.tunnel_record(t1.as_str()).unwrap().get("username").is_none());
}

#[tokio::test]
async fn given_existing_source_when_configuring_then_editor_opened_for_it() {
    let (fake, client, t1, _t2) = two_tunnels().await;

    let tunnel = client.configure_tunnel("http://localhost:8080").await.unwrap();

    assert_eq!(tunnel.map(|t| t.id), Some(t1));
    assert_eq!(fake.edits(), 1);
    assert_eq!(fake.tunnel_count(), 2);
}

#[tokio::test]
async fn given_new_source_when_user_cancels_configuration_then_none() {
    let (fake, client, _t1, _t2) = two_tunnels().await;
    fake.set_configure_answer(false);

    let tunnel = client.configure_tunnel("http://localhost:5000").await.unwrap();

    assert_eq!(tunnel, None);
    assert_eq!(fake.tunnel_count(), 2);
    assert_eq!(fake.edits(), 0);
}

#[tokio::test]
async fn given_new_source_when_user_accepts_configuration_then_created_tunnel() {
    let (fake, client, _t1, _t2) = two_tunnels().await;

    let tunnel = client
        .configure_tunnel("http://localhost:5000")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(tunnel.proxy_port(), Some(5000));
    assert_eq!(fake.tunnel_count(), 3);
}

#[tokio::test]
async fn given_proxy_tunnel_when_updating_directory_then_rejected_without_write() {
    let (fake, client, t1, _t2) = two_tunnels().await;
    let tunnel = client.tunnel(&t1).await.unwrap().unwrap();

    let result = client
        .update_tunnel(&tunnel, TunnelUpdate::Directory("/tmp".into()))
        .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidProperty);
    assert!(fake.tunnel_record(t1.as_str()).unwrap().get("directory").is_none());
}

#[tokio::test]
async fn given_tunnel_when_renamed_and_disabled_then_changes_visible() {
    let (_fake, client, t1, _t2) = two_tunnels().await;
    let tunnel = client.tunnel(&t1).await.unwrap().unwrap();

    client
        .update_tunnel(&tunnel, TunnelUpdate::Name("public api".to_string()))
        .await
        .unwrap();
    client.set_tunnel_enabled(&tunnel, false).await.unwrap();

    let refreshed = client.tunnel(&t1).await.unwrap().unwrap();
    assert_eq!(refreshed.name, "public api");
    assert!(!refreshed.is_enabled);
}

#[tokio::test]
async fn given_zero_proxy_port_when_updating_then_validation_error() {
    let (_fake, client, t1, _t2) = two_tunnels().await;
    let tunnel = client.tunnel(&t1).await.unwrap().unwrap();

    let result = client.update_tunnel(&tunnel, TunnelUpdate::ProxyPort(0)).await;

    assert!(matches!(result, Err(RegistryError::Validation { .. })));
}
