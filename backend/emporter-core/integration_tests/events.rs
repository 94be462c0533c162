use crate::support::{FakeCompanion, client, test_config};

use emporter_core::EmporterClient;
use emporter_core::bridge::event::{
    PROCESS_LAUNCHED, SERVICE_STATE_CHANGED, TUNNEL_REMOVED, TUNNEL_STATE_CHANGED,
};
use emporter_core::bridge::{EmporterEvent, EventSubscription};
use emporter_core::error::TransportError;
use emporter_core::transport::{
    NotificationBus, ProcessDirectory, RawEvent, RemoteScriptingChannel,
};

use models::{ConsentState, ServiceState, TunnelId};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::json;
use tokio::time::{sleep, timeout};

/// A bus that refuses the first `failures` subscriptions.
struct FlakyBus {
    inner: Arc<FakeCompanion>,
    failures: AtomicUsize,
}

#[async_trait]
impl NotificationBus for FlakyBus {
    async fn subscribe(
        &self,
        kinds: &[&str],
    ) -> Result<BoxStream<'static, RawEvent>, TransportError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::unavailable("connection refused"));
        }
        self.inner.subscribe(kinds).await
    }
}

/// Wait for the first event matching `wanted`, skipping anything else.
async fn next_matching(
    subscription: &mut EventSubscription,
    wanted: impl Fn(&EmporterEvent) -> bool,
) -> EmporterEvent {
    timeout(Duration::from_secs(2), async {
        loop {
            let event = subscription.next().await.expect("bridge is alive");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event arrives in time")
}

/// **VALUE**: Deleting a tunnel is observable by every subscriber.
///
/// **WHY THIS MATTERS**: UIs drop rows on `TunnelRemoved`; without it they show ghosts.
///
/// **BUG THIS CATCHES**: Would catch the tunnel id being lost while decoding `userInfo`.
#[tokio::test]
async fn given_subscriber_when_tunnel_deleted_then_removed_event_carries_id() {
    // GIVEN: A running companion with one directory tunnel and a subscriber
    let fake = FakeCompanion::new();
    fake.start();
    let id = fake.insert_tunnel(json!({
        "kind": "directory",
        "name": "site",
        "directory": "/srv/site",
        "serverPort": 0,
        "state": "connected",
    }));
    let client = client(&fake).await;
    let mut subscription = client.subscribe();

    // WHEN: The tunnel is deleted
    let tunnel = client.tunnel(&TunnelId::new(&id)).await.unwrap().unwrap();
    client.delete_tunnel(&tunnel).await.unwrap();

    // THEN: Subscribers see TunnelRemoved for exactly that id
    let event = next_matching(&mut subscription, |e| {
        matches!(e, EmporterEvent::TunnelRemoved { .. })
    })
    .await;
    assert_eq!(event.tunnel_id(), Some(&TunnelId::new(&id)));
}

#[tokio::test]
async fn given_foreign_and_malformed_broadcasts_when_forwarding_then_dropped() {
    let fake = FakeCompanion::new();
    let client = client(&fake).await;
    let mut subscription = client.subscribe();

    fake.emit(RawEvent::new("SomeOtherAppDidSomething").with("tunnelId", "t-9"));
    fake.emit(RawEvent::new(TUNNEL_REMOVED));
    fake.emit(RawEvent::new(TUNNEL_STATE_CHANGED).with("tunnelId", ""));
    fake.emit(RawEvent::new(TUNNEL_STATE_CHANGED).with("tunnelId", "t-1"));

    let event = timeout(Duration::from_secs(2), subscription.next())
        .await
        .expect("event arrives in time");
    assert_eq!(
        event,
        Some(EmporterEvent::TunnelStateChanged {
            id: TunnelId::new("t-1")
        })
    );
}

#[tokio::test]
async fn given_two_subscribers_when_broadcast_arrives_then_both_receive_it() {
    let fake = FakeCompanion::new();
    let client = client(&fake).await;
    let mut first = client.subscribe();
    let mut second = client.subscribe();

    fake.emit(RawEvent::new(TUNNEL_STATE_CHANGED).with("tunnelId", "t-3"));

    for subscription in [&mut first, &mut second] {
        let event = next_matching(subscription, |e| e.tunnel_id().is_some()).await;
        assert_eq!(event.tunnel_id(), Some(&TunnelId::new("t-3")));
    }
}

/// **VALUE**: Service broadcasts keep the cached snapshot current without a round trip.
///
/// **BUG THIS CATCHES**: Would catch the bridge forwarding the event but never updating the
/// snapshot, leaving `service_snapshot()` stale until the next explicit read.
#[tokio::test]
async fn given_service_broadcast_when_forwarded_then_snapshot_updated() {
    // GIVEN: A fresh client, snapshot still at its default
    let fake = FakeCompanion::new();
    let client = client(&fake).await;
    let mut subscription = client.subscribe();

    // WHEN: The companion reports a conflict
    fake.emit(
        RawEvent::new(SERVICE_STATE_CHANGED)
            .with("state", "conflicted")
            .with("conflictReason", "Another Mac is using this URL")
            .with("nextReconnect", 1_800_000_000),
    );

    // THEN: Subscribers get the decoded state and the snapshot matches it
    let event = next_matching(&mut subscription, |e| {
        matches!(e, EmporterEvent::ServiceStateChanged { .. })
    })
    .await;
    let EmporterEvent::ServiceStateChanged { state: Some(state) } = event else {
        panic!("expected a decoded service state, got {event:?}");
    };
    assert_eq!(state.conflict_reason(), Some("Another Mac is using this URL"));
    assert!(state.next_reconnect_at().is_some());
    assert_eq!(client.service_snapshot(), state);
}

#[tokio::test]
async fn given_service_broadcast_without_state_when_forwarded_then_snapshot_untouched() {
    let fake = FakeCompanion::new();
    let client = client(&fake).await;
    let mut subscription = client.subscribe();
    let before = client.service_snapshot();

    fake.emit(RawEvent::new(SERVICE_STATE_CHANGED));

    let event = next_matching(&mut subscription, |e| {
        matches!(e, EmporterEvent::ServiceStateChanged { .. })
    })
    .await;
    assert_eq!(event, EmporterEvent::ServiceStateChanged { state: None });
    assert_eq!(client.service_snapshot(), before);
}

#[tokio::test]
async fn given_companion_terminates_when_broadcast_forwarded_then_consent_forgotten() {
    // GIVEN: Consent granted and cached for the running instance
    let fake = FakeCompanion::new();
    fake.start();
    let client = client(&fake).await;
    assert_eq!(client.resolve_consent(false).await.unwrap(), ConsentState::Granted);
    let mut subscription = client.subscribe();

    // WHEN: The companion exits
    fake.crash();
    next_matching(&mut subscription, |e| {
        matches!(e, EmporterEvent::ProcessTerminated { .. })
    })
    .await;

    // THEN: The cached answer is gone (forwarding happens before fan-out)
    assert_eq!(client.consent().cached(), ConsentState::Unknown);
    assert!(client.is_listening());
}

/// **VALUE**: A late launch broadcast never discards consent the new instance already gave.
///
/// **BUG THIS CATCHES**: Would catch launch broadcasts clearing the cache regardless of pid,
/// which forces a fresh probe (and possibly a prompt) right after consent was settled.
#[tokio::test]
async fn given_consent_for_new_instance_when_its_launch_broadcast_arrives_late_then_kept() {
    // GIVEN: Consent settled for the running instance
    let fake = FakeCompanion::new();
    let pid = fake.start();
    let client = client(&fake).await;
    assert_eq!(client.resolve_consent(false).await.unwrap(), ConsentState::Granted);
    let mut subscription = client.subscribe();

    // WHEN: That instance's launch broadcast is delivered afterwards
    fake.emit(RawEvent::new(PROCESS_LAUNCHED).with("pid", pid));
    next_matching(&mut subscription, |e| {
        matches!(e, EmporterEvent::ProcessLaunched { .. })
    })
    .await;

    // THEN: The answer stands
    assert_eq!(client.consent().cached(), ConsentState::Granted);

    // AND WHEN: A different instance announces itself
    fake.emit(RawEvent::new(PROCESS_LAUNCHED).with("pid", pid + 1));
    next_matching(&mut subscription, |e| {
        matches!(e, EmporterEvent::ProcessLaunched { .. })
    })
    .await;

    // THEN: The previous instance's answer is dropped
    assert_eq!(client.consent().cached(), ConsentState::Unknown);
}

#[tokio::test]
async fn given_client_when_built_then_listening() {
    let fake = FakeCompanion::new();
    let client = client(&fake).await;

    sleep(Duration::from_millis(10)).await;

    assert!(client.is_listening());
    assert_eq!(client.service_snapshot(), ServiceState::default());
}

/// **VALUE**: A client built while the companion is down starts receiving events once
/// the bus comes up.
///
/// **WHY THIS MATTERS**: The usual first run is "companion not running yet"; building the
/// client must not fail, and events must flow after the launch.
///
/// **BUG THIS CATCHES**: Would catch a bridge that gives up after the first failed
/// subscription and stays deaf for the rest of the process.
#[tokio::test]
async fn given_bus_down_at_build_when_it_comes_up_then_bridge_resubscribes() {
    // GIVEN: A bus that refuses the first subscription
    let fake = FakeCompanion::new();
    let bus = Arc::new(FlakyBus {
        inner: Arc::clone(&fake),
        failures: AtomicUsize::new(1),
    });
    let client = EmporterClient::builder()
        .with_config(test_config(true))
        .with_process_directory(Arc::clone(&fake) as Arc<dyn ProcessDirectory>)
        .with_channel(Arc::clone(&fake) as Arc<dyn RemoteScriptingChannel>)
        .with_notification_bus(bus as Arc<dyn NotificationBus>)
        .build()
        .await
        .expect("client builds without a bus");
    assert!(!client.is_listening());
    let mut subscription = client.subscribe();

    // WHEN: The background retry gets through
    timeout(Duration::from_secs(3), async {
        while !client.is_listening() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("bridge resubscribes");
    fake.emit(RawEvent::new(TUNNEL_STATE_CHANGED).with("tunnelId", "t-4"));

    // THEN: Events flow to existing subscribers
    let event = next_matching(&mut subscription, |e| e.tunnel_id().is_some()).await;
    assert_eq!(event.tunnel_id(), Some(&TunnelId::new("t-4")));
}
