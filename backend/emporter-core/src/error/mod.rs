pub mod client;
pub mod config;
pub mod consent;
pub mod lifecycle;
pub mod predicate;
pub mod registry;
pub mod service;
pub mod session;
pub mod transport;

pub use client::ClientError;
pub use config::ConfigError;
pub use consent::ConsentError;
pub use lifecycle::LifecycleError;
pub use predicate::PredicateError;
pub use registry::RegistryError;
pub use service::ServiceError;
pub use session::SessionError;
pub use transport::{RemoteErrorCode, TransportError};

use thiserror::Error;

/// Flat classification of every failure the client can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotInstalled,
    NotRunning,
    Timeout,
    LaunchFailed,
    ConsentRequired,
    ConsentDenied,
    Unauthorized,
    Transport,
    InvalidProperty,
    InvalidSource,
    DuplicateSource,
    NoTunnelsConfigured,
    NotFound,
    Config,
}

impl ErrorKind {
    /// Only transport hiccups and launch timeouts are worth retrying, and only
    /// by the caller. `NotInstalled` means directing the user to install.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::Timeout)
    }
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::PermissionDenied { .. } => ErrorKind::Unauthorized,
            TransportError::Remote {
                code: RemoteErrorCode::NotFound,
                ..
            } => ErrorKind::NotFound,
            TransportError::Remote {
                code: RemoteErrorCode::DuplicateSource,
                ..
            } => ErrorKind::DuplicateSource,
            TransportError::Remote {
                code: RemoteErrorCode::NoTunnels,
                ..
            } => ErrorKind::NoTunnelsConfigured,
            _ => ErrorKind::Transport,
        }
    }
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::NotInstalled { .. } => ErrorKind::NotInstalled,
            LifecycleError::NotRunning { .. } => ErrorKind::NotRunning,
            LifecycleError::Timeout { .. } => ErrorKind::Timeout,
            LifecycleError::LaunchFailed { .. } => ErrorKind::LaunchFailed,
        }
    }
}

impl ConsentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsentError::Required { .. } => ErrorKind::ConsentRequired,
            ConsentError::Denied { .. } => ErrorKind::ConsentDenied,
            ConsentError::Transport(e) => e.kind(),
        }
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Lifecycle(e) => e.kind(),
            SessionError::Consent(e) => e.kind(),
        }
    }
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Session(e) => e.kind(),
            RegistryError::InvalidSource(_) => ErrorKind::InvalidSource,
            RegistryError::Unauthorized { .. } => ErrorKind::Unauthorized,
            RegistryError::InvalidProperty { .. } => ErrorKind::InvalidProperty,
            RegistryError::Validation { .. } => ErrorKind::InvalidProperty,
            RegistryError::DuplicateSource { .. } => ErrorKind::DuplicateSource,
            RegistryError::NotFound { .. } => ErrorKind::NotFound,
            RegistryError::Transport(e) => e.kind(),
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Session(e) => e.kind(),
            ServiceError::NoTunnelsConfigured { .. } => ErrorKind::NoTunnelsConfigured,
            ServiceError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ServiceError::Transport(e) => e.kind(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Consent(#[from] ConsentError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Predicate(#[from] PredicateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Lifecycle(e) => e.kind(),
            CoreError::Consent(e) => e.kind(),
            CoreError::Session(e) => e.kind(),
            CoreError::Registry(e) => e.kind(),
            CoreError::Service(e) => e.kind(),
            CoreError::Transport(e) => e.kind(),
            CoreError::Predicate(_) => ErrorKind::InvalidSource,
            CoreError::Config(_) => ErrorKind::Config,
            CoreError::Client(ClientError::Transport(e)) => e.kind(),
            CoreError::Client(_) => ErrorKind::Config,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
