use crate::ErrorLocation;
use crate::tunnel::TunnelKind;
use crate::tunnel::properties::TunnelField;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum ModelError {
    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Property Error: '{field}' cannot be used with {kind} tunnels {location}")]
    InvalidProperty {
        field: TunnelField,
        kind: TunnelKind,
        location: ErrorLocation,
    },

    #[error("Parse Error: {message} {location}")]
    Parse {
        message: String,
        location: ErrorLocation,
    },
}
