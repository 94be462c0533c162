//! Notification bus over the companion's WebSocket broadcast endpoint.

use crate::error::transport::TransportError;
use crate::transport::{NotificationBus, RawEvent};

use async_trait::async_trait;
use futures_util::future::ready;
use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use serde::Serialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use uuid::Uuid;

#[derive(Serialize)]
struct SubscribeFrame<'a> {
    subscriber: String,
    subscribe: &'a [&'a str],
}

/// [`NotificationBus`] that opens one WebSocket per subscription.
#[derive(Debug, Clone)]
pub struct WsNotificationBus {
    url: Url,
}

impl WsNotificationBus {
    pub fn new(url_str: &str) -> Result<Self, TransportError> {
        let url = Url::parse(url_str)?;

        match url.scheme() {
            "ws" | "wss" => Ok(Self { url }),
            other => Err(TransportError::protocol(format!(
                "Unsupported notification scheme '{other}' in {url_str}"
            ))),
        }
    }
}

fn decode_frame(message: Message) -> Option<RawEvent> {
    let decoded = match message {
        Message::Text(text) => serde_json::from_str::<RawEvent>(text.as_str()),
        Message::Binary(bytes) => serde_json::from_slice::<RawEvent>(&bytes),
        _ => return None,
    };

    decoded
        .map_err(|e| trace!("Dropping malformed broadcast: {e}"))
        .ok()
}

#[async_trait]
impl NotificationBus for WsNotificationBus {
    async fn subscribe(
        &self,
        kinds: &[&str],
    ) -> Result<BoxStream<'static, RawEvent>, TransportError> {
        debug!("Connecting to notification bus at {}", self.url);

        let (mut ws, _) = connect_async(self.url.as_str()).await?;

        let frame = SubscribeFrame {
            subscriber: Uuid::new_v4().to_string(),
            subscribe: kinds,
        };
        let payload = serde_json::to_string(&frame)?;
        ws.send(Message::Text(payload.into())).await?;

        info!("Subscribed to {} broadcast kinds", kinds.len());

        let events = ws
            .take_while(|message| {
                let open = match message {
                    Ok(Message::Close(_)) => false,
                    Ok(_) => true,
                    Err(e) => {
                        warn!("Notification bus connection lost: {e}");
                        false
                    }
                };
                ready(open)
            })
            .filter_map(|message| ready(message.ok().and_then(decode_frame)));

        Ok(events.boxed())
    }
}
