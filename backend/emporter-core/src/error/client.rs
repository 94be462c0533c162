use crate::error::config::ConfigError;
use crate::error::transport::TransportError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Errors from assembling an [`EmporterClient`](crate::EmporterClient).
#[derive(Debug, ThisError)]
pub enum ClientError {
    #[error("Runtime Error: {message} {location}")]
    Runtime {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A configured transport URL could not be used.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
