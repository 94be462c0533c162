use common::ErrorLocation;
use emporter_core::{CoreError, ErrorKind};

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by CLI commands.
///
/// Core failures keep their [`ErrorKind`] so the process exit code can tell
/// "not installed" apart from "consent denied".
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum AppError {
    /// Error from this app
    #[error("Emporter Error: {message} {location}")]
    App {
        message: String,
        location: ErrorLocation,
    },

    /// Error from emporter-core operations
    #[error("Core Error: {message} {location}")]
    Core {
        #[serde(skip)]
        kind: ErrorKind,
        message: String,
        location: ErrorLocation,
    },

    /// A tunnel named on the command line does not exist
    #[error("Not Found Error: {message} {location}")]
    NotFound {
        message: String,
        location: ErrorLocation,
    },
}

impl AppError {
    #[track_caller]
    pub fn app(message: impl Into<String>) -> Self {
        AppError::App {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn core(error: impl Into<CoreError>) -> Self {
        let error = error.into();
        AppError::Core {
            kind: error.kind(),
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Core { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::App { .. } => 1,
            AppError::NotFound { .. } => 2,
            AppError::Core { kind, .. } => match kind {
                ErrorKind::NotInstalled => 3,
                ErrorKind::NotRunning | ErrorKind::Timeout | ErrorKind::LaunchFailed => 4,
                ErrorKind::ConsentRequired | ErrorKind::ConsentDenied | ErrorKind::Unauthorized => 5,
                ErrorKind::InvalidProperty | ErrorKind::InvalidSource | ErrorKind::DuplicateSource => {
                    6
                }
                ErrorKind::NotFound => 2,
                ErrorKind::Transport | ErrorKind::NoTunnelsConfigured | ErrorKind::Config => 1,
            },
        }
    }
}
