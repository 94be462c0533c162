//! Companion broadcasts, decoded and fanned out to subscribers.
//!
//! The bridge owns a single bus subscription and republishes decoded events
//! on a broadcast channel. Foreign or malformed broadcasts are dropped.
//! Process broadcasts also retire cached consent, and service broadcasts
//! refresh the service snapshot. A lost bus connection is re-established in
//! the background. Dropping the bridge ends the subscription.

pub mod event;

pub use event::EmporterEvent;

use crate::consent::ConsentGate;
use crate::service::ServiceSnapshot;
use crate::transport::{NotificationBus, RawEvent};

use event::SUBSCRIBED_KINDS;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use log::{debug, info, trace, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Receiver, Sender, channel as broadcast_channel};
use tokio::task::JoinHandle;
use tokio::time::sleep as TokioSleep;

pub const DEFAULT_EVENT_BUFFER: usize = 64;
const RECONNECT_INITIAL_INTERVAL: Duration = Duration::from_millis(250);
const RECONNECT_MAX_INTERVAL: Duration = Duration::from_secs(5);

pub struct NotificationBridge {
    events: Sender<EmporterEvent>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl NotificationBridge {
    /// Subscribe to the bus and start forwarding.
    ///
    /// The first subscription is attempted before returning, so broadcasts
    /// sent right after `start` are not missed. When the bus is unreachable
    /// (typically because the companion is not running) or the connection
    /// drops, the bridge keeps resubscribing in the background.
    pub async fn start(
        bus: Arc<dyn NotificationBus>,
        consent: Arc<ConsentGate>,
        snapshot: ServiceSnapshot,
        capacity: usize,
    ) -> Self {
        let (events, _) = broadcast_channel(capacity.max(1));
        let connected = Arc::new(AtomicBool::new(false));

        let first = match bus.subscribe(&SUBSCRIBED_KINDS).await {
            Ok(stream) => {
                connected.store(true, Ordering::SeqCst);
                Some(stream)
            }
            Err(e) => {
                info!("Notification bus unavailable, will keep retrying: {e}");
                None
            }
        };

        let forwarder = Forwarder {
            events: events.clone(),
            consent,
            snapshot,
        };
        let task = tokio::spawn(listen(bus, first, forwarder, Arc::clone(&connected)));

        Self {
            events,
            connected,
            task,
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.events.subscribe(),
        }
    }

    /// True while a bus subscription is live.
    pub fn is_listening(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.task.is_finished()
    }
}

impl Drop for NotificationBridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn listen(
    bus: Arc<dyn NotificationBus>,
    mut stream: Option<BoxStream<'static, RawEvent>>,
    forwarder: Forwarder,
    connected: Arc<AtomicBool>,
) {
    let mut backoff = ExponentialBackoff {
        initial_interval: RECONNECT_INITIAL_INTERVAL,
        max_interval: RECONNECT_MAX_INTERVAL,
        max_elapsed_time: None,
        ..Default::default()
    };

    loop {
        if let Some(live) = stream.take() {
            connected.store(true, Ordering::SeqCst);
            backoff.reset();

            forwarder.forward(live).await;

            connected.store(false, Ordering::SeqCst);
            warn!("Companion broadcast stream ended, resubscribing");
        }

        let delay = backoff.next_backoff().unwrap_or(RECONNECT_MAX_INTERVAL);
        TokioSleep(delay).await;

        match bus.subscribe(&SUBSCRIBED_KINDS).await {
            Ok(live) => {
                info!("Resubscribed to companion broadcasts");
                stream = Some(live);
            }
            Err(e) => trace!("Notification bus still unavailable: {e}"),
        }
    }
}

struct Forwarder {
    events: Sender<EmporterEvent>,
    consent: Arc<ConsentGate>,
    snapshot: ServiceSnapshot,
}

impl Forwarder {
    async fn forward(&self, mut stream: BoxStream<'static, RawEvent>) {
        debug!("Listening for companion broadcasts");

        while let Some(raw) = stream.next().await {
            let Some(event) = EmporterEvent::decode(&raw) else {
                trace!("Dropping broadcast {}", raw.name);
                continue;
            };

            match &event {
                EmporterEvent::ProcessLaunched { pid } => {
                    self.consent.forget_other_instances(*pid)
                }
                EmporterEvent::ProcessTerminated { pid } => self.consent.forget_instance(*pid),
                EmporterEvent::ServiceStateChanged { state: Some(state) } => {
                    self.snapshot.replace(state.clone())
                }
                _ => {}
            }

            // No subscribers is fine
            if self.events.send(event).is_err() {
                trace!("No subscribers for broadcast {}", raw.name);
            }
        }
    }
}

/// A subscriber's view of decoded events.
pub struct EventSubscription {
    receiver: Receiver<EmporterEvent>,
}

impl EventSubscription {
    /// The next event, or `None` once the bridge is gone. A subscriber that
    /// falls behind skips the events it missed.
    pub async fn next(&mut self) -> Option<EmporterEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Subscriber lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
