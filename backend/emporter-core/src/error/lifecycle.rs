use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Errors from detecting, launching and attaching to the companion.
///
/// Cloneable because a single launch attempt reports the same outcome to
/// every coalesced caller.
#[derive(Debug, Clone, ThisError)]
pub enum LifecycleError {
    #[error("Not Installed Error: {message} {location}")]
    NotInstalled {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Running Error: {message} {location}")]
    NotRunning {
        message: String,
        location: ErrorLocation,
    },

    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Launch Failed Error: {message} {location}")]
    LaunchFailed {
        message: String,
        location: ErrorLocation,
    },
}
