use emporter_core::Predicate;
use emporter_core::error::{RemoteErrorCode, TransportError};
use emporter_core::transport::http::HttpScriptingChannel;
use emporter_core::transport::{
    ObjectRef, PermissionStatus, RemoteScriptingChannel, TUNNELS_COLLECTION, Target,
};

use models::TunnelId;

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn channel_for(server: &MockServer) -> HttpScriptingChannel {
    HttpScriptingChannel::new(&server.uri()).expect("mock server URI is valid")
}

/// **VALUE**: Operations are posted as JSON envelopes and the `result` is unwrapped.
///
/// **BUG THIS CATCHES**: Would catch a malformed request body (wrong target tagging or
/// argument order) that the companion would reject.
#[tokio::test]
async fn given_companion_when_invoking_then_posts_envelope_and_returns_result() {
    // GIVEN: A companion that answers createTunnel with an id
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/invoke"))
        .and(header_exists("x-emporter-client"))
        .and(body_partial_json(json!({
            "target": { "type": "application" },
            "operation": "createTunnel",
            "args": ["http://localhost:8080", {}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "t-1" })))
        .expect(1)
        .mount(&server)
        .await;
    let channel = channel_for(&server).await;

    // WHEN: Invoking the operation
    let result = channel
        .invoke(
            &Target::Application,
            "createTunnel",
            vec![json!("http://localhost:8080"), json!({})],
        )
        .await
        .unwrap();

    // THEN: The bare result comes back
    assert_eq!(result, json!("t-1"));
}

#[tokio::test]
async fn given_empty_response_when_invoking_then_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/invoke"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let channel = channel_for(&server).await;

    let result = channel
        .invoke(&Target::tunnel(&TunnelId::new("t-1")), "edit", Vec::new())
        .await
        .unwrap();

    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn given_tunnel_target_when_reading_and_writing_properties_then_object_addressed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/property/read"))
        .and(body_partial_json(json!({
            "target": { "type": "object", "collection": "tunnels", "id": "t-7" },
            "property": "name",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "docs" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/property/write"))
        .and(body_partial_json(json!({ "property": "isEnabled", "value": false })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let channel = channel_for(&server).await;
    let target = Target::tunnel(&TunnelId::new("t-7"));

    let name = channel.read_property(&target, "name").await.unwrap();
    channel
        .write_property(&target, "isEnabled", json!(false))
        .await
        .unwrap();

    assert_eq!(name, json!("docs"));
}

#[tokio::test]
async fn given_predicate_when_querying_then_returns_object_refs_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({ "collection": "tunnels" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objects": [
                { "collection": "tunnels", "id": "t-2" },
                { "collection": "tunnels", "id": "t-1" },
            ]
        })))
        .mount(&server)
        .await;
    let channel = channel_for(&server).await;

    let refs = channel
        .evaluate_predicate(TUNNELS_COLLECTION, Some(&Predicate::equals("proxyPort", 8080)))
        .await
        .unwrap();

    let ids: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["t-2", "t-1"]);
    assert_eq!(
        refs[0],
        ObjectRef {
            collection: TUNNELS_COLLECTION.to_string(),
            id: "t-2".to_string()
        }
    );
}

#[tokio::test]
async fn given_silent_probe_when_determining_permission_then_status_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/permission"))
        .and(body_partial_json(json!({ "prompt": false })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "wouldRequireConsent" })),
        )
        .mount(&server)
        .await;
    let channel = channel_for(&server).await;

    let status = channel.determine_permission(false).await.unwrap();

    assert_eq!(status, PermissionStatus::WouldRequireConsent);
}

/// **VALUE**: Authorization refusals are distinguishable from every other failure.
///
/// **WHY THIS MATTERS**: Only `PermissionDenied` makes the client drop its cached consent.
///
/// **BUG THIS CATCHES**: Would catch 401/403 being folded into a generic remote failure.
#[tokio::test]
async fn given_forbidden_response_when_invoking_then_permission_denied() {
    for status in [401, 403] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("not allowed"))
            .mount(&server)
            .await;
        let channel = channel_for(&server).await;

        let result = channel
            .invoke(&Target::Application, "suspendService", Vec::new())
            .await;

        assert!(
            matches!(result, Err(TransportError::PermissionDenied { .. })),
            "HTTP {status} should map to PermissionDenied, got {result:?}"
        );
    }
}

#[tokio::test]
async fn given_error_body_when_invoking_then_remote_code_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "duplicateSource",
            "message": "localhost:8080 already has a tunnel",
        })))
        .mount(&server)
        .await;
    let channel = channel_for(&server).await;

    let error = channel
        .invoke(&Target::Application, "createTunnel", Vec::new())
        .await
        .unwrap_err();

    assert_eq!(error.remote_code(), Some(RemoteErrorCode::DuplicateSource));
    assert_eq!(error.message(), "localhost:8080 already has a tunnel");
}

#[tokio::test]
async fn given_bare_status_codes_when_invoking_then_mapped_by_status() {
    let cases = [
        (404, Some(RemoteErrorCode::NotFound)),
        (409, Some(RemoteErrorCode::DuplicateSource)),
        (422, Some(RemoteErrorCode::InvalidArgument)),
        (500, Some(RemoteErrorCode::Failed)),
        (503, None),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        let channel = channel_for(&server).await;

        let error = channel
            .read_property(&Target::Application, "serviceState")
            .await
            .unwrap_err();

        assert_eq!(error.remote_code(), expected, "HTTP {status}");
        if expected.is_none() {
            assert!(matches!(error, TransportError::Unavailable { .. }));
        }
    }
}

#[tokio::test]
async fn given_garbage_body_when_querying_then_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    let channel = channel_for(&server).await;

    let result = channel.evaluate_predicate(TUNNELS_COLLECTION, None).await;

    assert!(matches!(result, Err(TransportError::Protocol { .. })));
}

#[tokio::test]
async fn given_nothing_listening_when_invoking_then_unavailable() {
    // Bind then drop to get a port nobody is listening on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let channel = HttpScriptingChannel::new(&format!("http://127.0.0.1:{port}")).unwrap();

    let result = channel.determine_permission(false).await;

    assert!(matches!(result, Err(TransportError::Unavailable { .. })));
}

#[test]
fn given_base_path_when_constructing_then_trailing_slash_added() {
    let channel = HttpScriptingChannel::new("http://127.0.0.1:47301/v1").unwrap();

    assert_eq!(channel.base_url().as_str(), "http://127.0.0.1:47301/v1/");
}
