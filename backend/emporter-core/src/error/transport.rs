use common::ErrorLocation;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Failure codes the companion reports for a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteErrorCode {
    NotFound,
    DuplicateSource,
    InvalidArgument,
    NoTunnels,
    Failed,
}

impl Display for RemoteErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        let name = match self {
            RemoteErrorCode::NotFound => "not found",
            RemoteErrorCode::DuplicateSource => "duplicate source",
            RemoteErrorCode::InvalidArgument => "invalid argument",
            RemoteErrorCode::NoTunnels => "no tunnels",
            RemoteErrorCode::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Errors raised by the scripting channel and the notification bus.
///
/// Transport errors are surfaced as-is; nothing in the client retries them.
#[derive(Debug, Clone, ThisError)]
pub enum TransportError {
    #[error("Unavailable Error: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Permission Denied Error: {message} {location}")]
    PermissionDenied {
        message: String,
        location: ErrorLocation,
    },

    #[error("Remote Error: {code}: {message} {location}")]
    Remote {
        code: RemoteErrorCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    #[track_caller]
    pub fn unavailable(message: impl Into<String>) -> Self {
        TransportError::Unavailable {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        TransportError::PermissionDenied {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn remote(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        TransportError::Remote {
            code,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        TransportError::Protocol {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// The remote error code, if the companion rejected the operation.
    pub fn remote_code(&self) -> Option<RemoteErrorCode> {
        match self {
            TransportError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TransportError::Unavailable { message, .. }
            | TransportError::PermissionDenied { message, .. }
            | TransportError::Remote { message, .. }
            | TransportError::Protocol { message, .. }
            | TransportError::Timeout { message, .. } => message,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        let location = ErrorLocation::from(Location::caller());

        // Classify before the error is flattened into a string
        if error.is_timeout() {
            TransportError::Timeout {
                message: error.to_string(),
                location,
            }
        } else if error.is_decode() {
            TransportError::Protocol {
                message: error.to_string(),
                location,
            }
        } else {
            TransportError::Unavailable {
                message: error.to_string(),
                location,
            }
        }
    }
}

impl From<serde_json::Error> for TransportError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        TransportError::Protocol {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<url::ParseError> for TransportError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        TransportError::Protocol {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    #[track_caller]
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::Unavailable {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
