use crate::error::transport::TransportError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum ConsentError {
    #[error("Consent Required Error: {message} {location}")]
    Required {
        message: String,
        location: ErrorLocation,
    },

    #[error("Consent Denied Error: {message} {location}")]
    Denied {
        message: String,
        location: ErrorLocation,
    },

    /// The authorization probe itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
