use serde::{Deserialize, Serialize};

/// Whether this host may exchange data with the companion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentState {
    /// Not resolved yet, or the companion is not running.
    #[default]
    Unknown,
    /// The user has to approve access interactively.
    Required,
    Granted,
    Denied,
}

impl ConsentState {
    /// Granted and Denied are cached for the lifetime of a companion process.
    pub fn is_settled(&self) -> bool {
        matches!(self, ConsentState::Granted | ConsentState::Denied)
    }
}
