//! Tunnel snapshots.
//!
//! A tunnel exposes either a local HTTP server (proxy kind) or a directory
//! served by the companion's built-in web server (directory kind). The
//! kind-specific settings live in [`TunnelSource`], so a proxy tunnel can never
//! carry directory settings and vice versa.

pub mod builder;
pub mod properties;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier assigned by the companion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TunnelId(String);

impl TunnelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TunnelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for TunnelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TunnelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelKind {
    Proxy,
    Directory,
}

impl TunnelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelKind::Proxy => "proxy",
            TunnelKind::Directory => "directory",
        }
    }
}

impl Display for TunnelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelState {
    Initializing,
    Disconnecting,
    Disconnected,
    Connecting,
    Connected,
    Conflicted,
}

impl TunnelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelState::Initializing => "initializing",
            TunnelState::Disconnecting => "disconnecting",
            TunnelState::Disconnected => "disconnected",
            TunnelState::Connecting => "connecting",
            TunnelState::Connected => "connected",
            TunnelState::Conflicted => "conflicted",
        }
    }
}

impl Display for TunnelState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.as_str())
    }
}

/// Kind-specific configuration of a tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelSource {
    Proxy {
        /// Port of the existing local web server.
        port: u16,
        should_rewrite_host_header: bool,
        /// Host header sent upstream when rewriting is enabled.
        proxy_host_header: Option<String>,
    },
    Directory {
        directory: PathBuf,
        /// File served for directory requests.
        index_file: Option<String>,
        is_browsing_enabled: bool,
        is_live_reload_enabled: bool,
    },
}

impl TunnelSource {
    pub fn kind(&self) -> TunnelKind {
        match self {
            TunnelSource::Proxy { .. } => TunnelKind::Proxy,
            TunnelSource::Directory { .. } => TunnelKind::Directory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunnel {
    pub id: TunnelId,
    pub name: String,
    pub is_temporary: bool,
    pub is_enabled: bool,
    /// Password protected. Read-only; see `set_password_protection` on the client.
    pub is_auth_enabled: bool,
    /// Public URL, once the companion has been assigned one.
    pub remote_url: Option<String>,
    pub state: TunnelState,
    pub conflict_reason: Option<String>,
    pub source: TunnelSource,
}

impl Tunnel {
    pub fn kind(&self) -> TunnelKind {
        self.source.kind()
    }

    pub fn proxy_port(&self) -> Option<u16> {
        match &self.source {
            TunnelSource::Proxy { port, .. } => Some(*port),
            TunnelSource::Directory { .. } => None,
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        match &self.source {
            TunnelSource::Directory { directory, .. } => Some(directory),
            TunnelSource::Proxy { .. } => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == TunnelState::Connected
    }
}
