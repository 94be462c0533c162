use std::fmt::{Display, Formatter, Result as FormatResult};
use std::time::SystemTime;

/// State of the companion's connection to the tunneling service.
///
/// Conflict details only exist in the `Conflicted` state. While conflicted the
/// companion retries on its own at `next_reconnect_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ServiceState {
    #[default]
    Suspended,
    Connecting,
    Connected,
    Conflicted {
        reason: Option<String>,
        next_reconnect_at: Option<SystemTime>,
    },
}

impl ServiceState {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceState::Suspended => "suspended",
            ServiceState::Connecting => "connecting",
            ServiceState::Connected => "connected",
            ServiceState::Conflicted { .. } => "conflicted",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ServiceState::Connected)
    }

    pub fn conflict_reason(&self) -> Option<&str> {
        match self {
            ServiceState::Conflicted { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn next_reconnect_at(&self) -> Option<SystemTime> {
        match self {
            ServiceState::Conflicted {
                next_reconnect_at, ..
            } => *next_reconnect_at,
            _ => None,
        }
    }
}

impl Display for ServiceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self.conflict_reason() {
            Some(reason) => write!(f, "{} ({reason})", self.name()),
            None => write!(f, "{}", self.name()),
        }
    }
}
