use crate::error::registry::RegistryError;
use crate::error::session::SessionError;
use crate::error::transport::{RemoteErrorCode, TransportError};

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum ServiceError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("No Tunnels Configured Error: {message} {location}")]
    NoTunnelsConfigured {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unauthorized Error: {message} {location}")]
    Unauthorized {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Transport(TransportError),
}

impl From<TransportError> for ServiceError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        let location = ErrorLocation::from(Location::caller());

        match error {
            TransportError::PermissionDenied { message, .. } => {
                ServiceError::Unauthorized { message, location }
            }
            TransportError::Remote {
                code: RemoteErrorCode::NoTunnels,
                message,
                ..
            } => ServiceError::NoTunnelsConfigured { message, location },
            other => ServiceError::Transport(other),
        }
    }
}

impl From<RegistryError> for ServiceError {
    #[track_caller]
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Session(e) => ServiceError::Session(e),
            RegistryError::Unauthorized { message, location } => {
                ServiceError::Unauthorized { message, location }
            }
            RegistryError::Transport(e) => ServiceError::Transport(e),
            other => ServiceError::Transport(TransportError::protocol(other.to_string())),
        }
    }
}
