//! The companion's connection to the tunneling service.

use crate::error::service::ServiceError;
use crate::error::transport::TransportError;
use crate::registry::TunnelRegistryClient;
use crate::session::Session;
use crate::transport::{RemoteScriptingChannel, Target};

use common::ErrorLocation;
use models::ServiceState;

use std::panic::Location;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, trace};
use serde_json::Value;

pub const SERVICE_STATE_PROPERTY: &str = "serviceState";
pub const CONFLICT_REASON_PROPERTY: &str = "conflictReason";
pub const NEXT_RECONNECT_PROPERTY: &str = "nextReconnect";
pub const RESUME_SERVICE_OPERATION: &str = "resumeService";
pub const SUSPEND_SERVICE_OPERATION: &str = "suspendService";

/// Last service state observed, by explicit read or by broadcast.
#[derive(Debug, Clone, Default)]
pub struct ServiceSnapshot(Arc<RwLock<ServiceState>>);

impl ServiceSnapshot {
    pub fn get(&self) -> ServiceState {
        match self.0.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn replace(&self, state: ServiceState) {
        let mut current = match self.0.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trace!("Service state {} -> {}", current.name(), state.name());
        *current = state;
    }
}

/// Decode a state name and its conflict details.
///
/// `next_reconnect` is an RFC 3339 timestamp or seconds since the Unix epoch.
pub fn decode_service_state(
    name: &str,
    conflict_reason: Option<String>,
    next_reconnect: &Value,
) -> Option<ServiceState> {
    match name {
        "suspended" => Some(ServiceState::Suspended),
        "connecting" => Some(ServiceState::Connecting),
        "connected" => Some(ServiceState::Connected),
        "conflicted" => Some(ServiceState::Conflicted {
            reason: conflict_reason.filter(|r| !r.is_empty()),
            next_reconnect_at: decode_timestamp(next_reconnect),
        }),
        _ => None,
    }
}

fn decode_timestamp(value: &Value) -> Option<SystemTime> {
    match value {
        Value::String(s) => humantime::parse_rfc3339_weak(s).ok(),
        Value::Number(n) => n
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| UNIX_EPOCH + Duration::from_secs_f64(secs)),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ServiceController {
    session: Arc<Session>,
    registry: TunnelRegistryClient,
    snapshot: ServiceSnapshot,
}

impl ServiceController {
    pub(crate) fn new(
        session: Arc<Session>,
        registry: TunnelRegistryClient,
        snapshot: ServiceSnapshot,
    ) -> Self {
        Self {
            session,
            registry,
            snapshot,
        }
    }

    /// Read the current state from the companion.
    pub async fn state(&self) -> Result<ServiceState, ServiceError> {
        let channel = self.session.channel().await?;

        let name = self.read(channel.as_ref(), SERVICE_STATE_PROPERTY).await?;
        let name = name.as_str().ok_or_else(|| {
            TransportError::protocol(format!("Service state is not a string: {name}"))
        })?;

        let state = match name {
            "conflicted" => {
                let reason = self.read(channel.as_ref(), CONFLICT_REASON_PROPERTY).await?;
                let next = self.read(channel.as_ref(), NEXT_RECONNECT_PROPERTY).await?;
                decode_service_state(name, reason.as_str().map(str::to_string), &next)
            }
            _ => decode_service_state(name, None, &Value::Null),
        }
        .ok_or_else(|| TransportError::protocol(format!("Unknown service state '{name}'")))?;

        self.snapshot.replace(state.clone());
        Ok(state)
    }

    /// Last observed state, without contacting the companion.
    pub fn snapshot(&self) -> ServiceState {
        self.snapshot.get()
    }

    pub async fn resume(&self) -> Result<(), ServiceError> {
        if self.registry.count(None).await? == 0 {
            return Err(ServiceError::NoTunnelsConfigured {
                message: "Create a tunnel before resuming the service".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let channel = self.session.channel().await?;
        self.session.observe(
            channel
                .invoke(&Target::Application, RESUME_SERVICE_OPERATION, Vec::new())
                .await,
        )?;

        info!("Service resume requested");
        Ok(())
    }

    pub async fn suspend(&self) -> Result<(), ServiceError> {
        let channel = self.session.channel().await?;
        self.session.observe(
            channel
                .invoke(&Target::Application, SUSPEND_SERVICE_OPERATION, Vec::new())
                .await,
        )?;

        self.snapshot.replace(ServiceState::Suspended);
        info!("Service suspended");
        Ok(())
    }

    async fn read(
        &self,
        channel: &dyn RemoteScriptingChannel,
        property: &str,
    ) -> Result<Value, ServiceError> {
        debug!("Reading service property {property}");
        Ok(self
            .session
            .observe(channel.read_property(&Target::Application, property).await)?)
    }
}
