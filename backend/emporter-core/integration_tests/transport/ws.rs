use emporter_core::bridge::event::{SUBSCRIBED_KINDS, TUNNEL_ADDED, TUNNEL_REMOVED};
use emporter_core::transport::ws::WsNotificationBus;
use emporter_core::transport::{NotificationBus, RawEvent};

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Serve one subscriber: capture its subscribe frame, push `frames`, then close.
async fn serve_once(frames: Vec<Message>) -> (String, oneshot::Receiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (subscribed_tx, subscribed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let frame: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        let _ = subscribed_tx.send(frame);

        for message in frames {
            ws.send(message).await.unwrap();
        }
        let _ = ws.close(None).await;
    });

    (url, subscribed_rx)
}

/// **VALUE**: The bus subscribes to the requested kinds and yields only decodable events.
///
/// **WHY THIS MATTERS**: One malformed broadcast must not end the subscription for
/// everything that follows it.
///
/// **BUG THIS CATCHES**: Would catch decode errors terminating the stream, or the
/// subscribe frame omitting the kinds.
#[tokio::test]
async fn given_mixed_frames_when_subscribed_then_only_valid_events_until_close() {
    // GIVEN: A bus that sends a valid text frame, garbage, a valid binary frame, then closes
    let added = json!({ "name": TUNNEL_ADDED, "userInfo": { "tunnelId": "t-1" } });
    let removed = json!({ "name": TUNNEL_REMOVED, "userInfo": { "tunnelId": "t-1" } });
    let (url, subscribed) = serve_once(vec![
        Message::Text(added.to_string().into()),
        Message::Text("{not json".to_string().into()),
        Message::Binary(serde_json::to_vec(&removed).unwrap().into()),
    ])
    .await;
    let bus = WsNotificationBus::new(&url).unwrap();

    // WHEN: Subscribing and draining the stream
    let stream = bus.subscribe(&SUBSCRIBED_KINDS).await.unwrap();
    let events: Vec<RawEvent> = timeout(Duration::from_secs(5), stream.collect())
        .await
        .expect("stream ends when the bus closes");

    // THEN: The subscribe frame listed every kind and both valid events arrived in order
    let frame = subscribed.await.unwrap();
    assert_eq!(frame["subscribe"].as_array().unwrap().len(), SUBSCRIBED_KINDS.len());
    assert!(frame["subscriber"].as_str().is_some_and(|s| !s.is_empty()));
    assert_eq!(
        events,
        vec![
            RawEvent::new(TUNNEL_ADDED).with("tunnelId", "t-1"),
            RawEvent::new(TUNNEL_REMOVED).with("tunnelId", "t-1"),
        ]
    );
}

#[tokio::test]
async fn given_event_without_user_info_when_received_then_empty_user_info() {
    let (url, _subscribed) =
        serve_once(vec![Message::Text(json!({ "name": "Anything" }).to_string().into())]).await;
    let bus = WsNotificationBus::new(&url).unwrap();

    let mut stream = bus.subscribe(&["Anything"]).await.unwrap();
    let event = timeout(Duration::from_secs(5), stream.next()).await.unwrap();

    assert_eq!(event, Some(RawEvent::new("Anything")));
}

#[test]
fn given_http_url_when_constructing_then_rejected() {
    assert!(WsNotificationBus::new("http://127.0.0.1:47302").is_err());
    assert!(WsNotificationBus::new("not a url").is_err());
    assert!(WsNotificationBus::new("wss://127.0.0.1:47302/events").is_ok());
}

#[tokio::test]
async fn given_nothing_listening_when_subscribing_then_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let bus = WsNotificationBus::new(&format!("ws://127.0.0.1:{port}")).unwrap();

    assert!(bus.subscribe(&SUBSCRIBED_KINDS).await.is_err());
}
