use crate::error::consent::ConsentError;
use crate::error::lifecycle::LifecycleError;

use thiserror::Error as ThisError;

/// Why a remote operation was refused before it reached the companion.
#[derive(Debug, Clone, ThisError)]
pub enum SessionError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Consent(#[from] ConsentError),
}
