use std::path::PathBuf;

/// Identity of the companion application as seen from this host.
///
/// Re-derived from the process directory whenever it is asked for; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub bundle_location: PathBuf,
    pub is_installed: bool,
    pub is_running: bool,
    /// Set only while the companion is running.
    pub process_identifier: Option<u32>,
}
