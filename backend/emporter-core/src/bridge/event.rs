use crate::service::decode_service_state;
use crate::transport::RawEvent;

use models::{ServiceState, TunnelId};

use serde_json::Value;

pub const PROCESS_LAUNCHED: &str = "EmporterProcessDidLaunch";
pub const PROCESS_TERMINATED: &str = "EmporterProcessDidTerminate";
pub const TUNNEL_ADDED: &str = "EmporterTunnelWasAdded";
pub const TUNNEL_REMOVED: &str = "EmporterTunnelWasRemoved";
pub const TUNNEL_STATE_CHANGED: &str = "EmporterTunnelStateDidChange";
pub const TUNNEL_CONFIGURATION_CHANGED: &str = "EmporterTunnelConfigurationDidChange";
pub const SERVICE_STATE_CHANGED: &str = "EmporterServiceStateDidChange";

/// Every broadcast the bridge subscribes to.
pub const SUBSCRIBED_KINDS: [&str; 7] = [
    PROCESS_LAUNCHED,
    PROCESS_TERMINATED,
    TUNNEL_ADDED,
    TUNNEL_REMOVED,
    TUNNEL_STATE_CHANGED,
    TUNNEL_CONFIGURATION_CHANGED,
    SERVICE_STATE_CHANGED,
];

const PID_KEY: &str = "pid";
const TUNNEL_ID_KEY: &str = "tunnelId";
const STATE_KEY: &str = "state";
const CONFLICT_REASON_KEY: &str = "conflictReason";
const NEXT_RECONNECT_KEY: &str = "nextReconnect";

/// A companion broadcast, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmporterEvent {
    ProcessLaunched { pid: Option<u32> },
    ProcessTerminated { pid: Option<u32> },
    TunnelAdded { id: TunnelId },
    TunnelRemoved { id: TunnelId },
    TunnelStateChanged { id: TunnelId },
    TunnelConfigurationChanged { id: TunnelId },
    /// `state` is absent when the broadcast did not carry one; read
    /// [`ServiceController::state`](crate::service::ServiceController::state)
    /// for the current value.
    ServiceStateChanged { state: Option<ServiceState> },
}

impl EmporterEvent {
    /// The tunnel this event concerns, if any.
    pub fn tunnel_id(&self) -> Option<&TunnelId> {
        match self {
            EmporterEvent::TunnelAdded { id }
            | EmporterEvent::TunnelRemoved { id }
            | EmporterEvent::TunnelStateChanged { id }
            | EmporterEvent::TunnelConfigurationChanged { id } => Some(id),
            _ => None,
        }
    }

    /// `None` for foreign broadcasts and for tunnel broadcasts without a
    /// tunnel id.
    pub fn decode(raw: &RawEvent) -> Option<Self> {
        let info = &raw.user_info;
        let pid = || {
            info.get(PID_KEY)
                .and_then(Value::as_u64)
                .and_then(|pid| u32::try_from(pid).ok())
        };
        let tunnel_id = || {
            info.get(TUNNEL_ID_KEY)
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(TunnelId::new)
        };

        let event = match raw.name.as_str() {
            PROCESS_LAUNCHED => EmporterEvent::ProcessLaunched { pid: pid() },
            PROCESS_TERMINATED => EmporterEvent::ProcessTerminated { pid: pid() },
            TUNNEL_ADDED => EmporterEvent::TunnelAdded { id: tunnel_id()? },
            TUNNEL_REMOVED => EmporterEvent::TunnelRemoved { id: tunnel_id()? },
            TUNNEL_STATE_CHANGED => EmporterEvent::TunnelStateChanged { id: tunnel_id()? },
            TUNNEL_CONFIGURATION_CHANGED => {
                EmporterEvent::TunnelConfigurationChanged { id: tunnel_id()? }
            }
            SERVICE_STATE_CHANGED => {
                let state = info.get(STATE_KEY).and_then(Value::as_str).and_then(|name| {
                    decode_service_state(
                        name,
                        info.get(CONFLICT_REASON_KEY)
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        info.get(NEXT_RECONNECT_KEY).unwrap_or(&Value::Null),
                    )
                });
                EmporterEvent::ServiceStateChanged { state }
            }
            _ => return None,
        };

        Some(event)
    }
}
