use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum PredicateError {
    #[error("Invalid Source Error: {message} {location}")]
    InvalidSource {
        message: String,
        location: ErrorLocation,
    },
}
