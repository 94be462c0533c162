use crate::error::predicate::PredicateError;
use crate::error::session::SessionError;
use crate::error::transport::{RemoteErrorCode, TransportError};

use common::ErrorLocation;
use models::{ModelError, TunnelField, TunnelKind};

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum RegistryError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    InvalidSource(#[from] PredicateError),

    #[error("Unauthorized Error: {message} {location}")]
    Unauthorized {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Property Error: '{field}' cannot be used with {kind} tunnels {location}")]
    InvalidProperty {
        field: TunnelField,
        kind: TunnelKind,
        location: ErrorLocation,
    },

    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Duplicate Source Error: {message} {location}")]
    DuplicateSource {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Found Error: {message} {location}")]
    NotFound {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Transport(TransportError),
}

impl From<TransportError> for RegistryError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        let location = ErrorLocation::from(Location::caller());

        match error {
            TransportError::PermissionDenied { message, .. } => {
                RegistryError::Unauthorized { message, location }
            }
            TransportError::Remote {
                code: RemoteErrorCode::NotFound,
                message,
                ..
            } => RegistryError::NotFound { message, location },
            TransportError::Remote {
                code: RemoteErrorCode::DuplicateSource,
                message,
                ..
            } => RegistryError::DuplicateSource { message, location },
            other => RegistryError::Transport(other),
        }
    }
}

impl From<ModelError> for RegistryError {
    #[track_caller]
    fn from(error: ModelError) -> Self {
        match error {
            ModelError::InvalidProperty {
                field,
                kind,
                location,
            } => RegistryError::InvalidProperty {
                field,
                kind,
                location,
            },
            ModelError::Validation { message, location } => {
                RegistryError::Validation { message, location }
            }
            // A record the companion sent that does not decode
            ModelError::Parse { message, .. } => {
                RegistryError::Transport(TransportError::protocol(message))
            }
        }
    }
}
