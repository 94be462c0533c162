use crate::error::model_error::ModelError;
use crate::tunnel::{Tunnel, TunnelId, TunnelSource, TunnelState};
use crate::ErrorLocation;

use std::panic::Location;

/// Builder for creating validated Tunnel snapshots.
///
/// Used when decoding tunnels reported by the companion; a record that does
/// not describe a consistent tunnel is rejected instead of half-populated.
#[derive(Debug, Default)]
pub struct TunnelBuilder {
    id: Option<TunnelId>,
    name: Option<String>,
    is_temporary: bool,
    is_enabled: bool,
    is_auth_enabled: bool,
    remote_url: Option<String>,
    state: Option<TunnelState>,
    conflict_reason: Option<String>,
    source: Option<TunnelSource>,
}

impl TunnelBuilder {
    pub fn with_id(mut self, id: impl Into<TunnelId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_temporary(mut self, temporary: bool) -> Self {
        self.is_temporary = temporary;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = enabled;
        self
    }

    pub fn with_auth_enabled(mut self, auth_enabled: bool) -> Self {
        self.is_auth_enabled = auth_enabled;
        self
    }

    pub fn with_remote_url(mut self, url: Option<String>) -> Self {
        self.remote_url = url.filter(|u| !u.is_empty());
        self
    }

    pub fn with_state(mut self, state: TunnelState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_conflict_reason(mut self, reason: Option<String>) -> Self {
        self.conflict_reason = reason.filter(|r| !r.is_empty());
        self
    }

    pub fn with_source(mut self, source: TunnelSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Build the Tunnel with validation.
    #[track_caller]
    pub fn build(self) -> Result<Tunnel, ModelError> {
        let id = self.id.ok_or_else(|| ModelError::Validation {
            message: String::from("Tunnel id is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if id.as_str().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Tunnel id cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let source = self.source.ok_or_else(|| ModelError::Validation {
            message: format!("Tunnel {id} has no source"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        match &source {
            TunnelSource::Proxy { port: 0, .. } => {
                return Err(ModelError::Validation {
                    message: format!("Proxy tunnel {id} has port 0"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            TunnelSource::Directory { directory, .. } if directory.as_os_str().is_empty() => {
                return Err(ModelError::Validation {
                    message: format!("Directory tunnel {id} has an empty directory"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            _ => {}
        }

        Ok(Tunnel {
            id,
            name: self.name.unwrap_or_default(),
            is_temporary: self.is_temporary,
            is_enabled: self.is_enabled,
            is_auth_enabled: self.is_auth_enabled,
            remote_url: self.remote_url,
            state: self.state.unwrap_or(TunnelState::Disconnected),
            conflict_reason: self.conflict_reason,
            source,
        })
    }
}
