//! Capabilities the client needs from the outside world.
//!
//! The companion is reached through three seams:
//!
//! - [`ProcessDirectory`]: finding, launching and signalling the companion process
//! - [`RemoteScriptingChannel`]: invoking operations and reading/writing properties
//! - [`NotificationBus`]: companion broadcasts, delivered as [`RawEvent`]s
//!
//! Each has one concrete adapter in this module ([`process`], [`http`], [`ws`]);
//! tests and embedders can supply their own implementations.

pub mod http;
pub mod process;
pub mod ws;

use crate::error::transport::TransportError;
use crate::predicate::Predicate;

use models::TunnelId;

use std::io::Error as IoError;
use std::path::Path;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Values exchanged with the companion.
pub type RemoteValue = Value;

/// Remote collection holding the companion's tunnels.
pub const TUNNELS_COLLECTION: &str = "tunnels";

/// Receiver of a remote operation or property access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Target {
    /// The companion application object.
    Application,
    /// An element of one of the application's collections.
    Object { collection: String, id: String },
}

impl Target {
    pub fn tunnel(id: &TunnelId) -> Self {
        Target::Object {
            collection: TUNNELS_COLLECTION.to_string(),
            id: id.as_str().to_string(),
        }
    }
}

/// Reference to a remote object returned by predicate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub collection: String,
    pub id: String,
}

/// Outcome of asking the platform whether this host may script the companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// Approval is possible but needs an interactive prompt.
    WouldRequireConsent,
}

#[async_trait]
pub trait RemoteScriptingChannel: Send + Sync {
    /// Invoke a named operation on `target`.
    async fn invoke(
        &self,
        target: &Target,
        operation: &str,
        args: Vec<RemoteValue>,
    ) -> Result<RemoteValue, TransportError>;

    async fn read_property(
        &self,
        target: &Target,
        property: &str,
    ) -> Result<RemoteValue, TransportError>;

    async fn write_property(
        &self,
        target: &Target,
        property: &str,
        value: RemoteValue,
    ) -> Result<(), TransportError>;

    /// Evaluate `predicate` inside the companion and return the matching
    /// elements of `collection` in the companion's order. `None` matches all.
    async fn evaluate_predicate(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<ObjectRef>, TransportError>;

    /// Determine whether this host is allowed to script the companion,
    /// prompting the user when `allow_prompt` is set and the platform needs it.
    async fn determine_permission(
        &self,
        allow_prompt: bool,
    ) -> Result<PermissionStatus, TransportError>;
}

/// A running companion process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    pub name: String,
}

/// How the companion is recognized in the process table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppIdentity {
    pub bundle_ids: Vec<String>,
}

impl AppIdentity {
    pub fn new<I, S>(bundle_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bundle_ids: bundle_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.bundle_ids
            .iter()
            .any(|id| id.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Bring the companion to the foreground once launched.
    pub activate: bool,
    /// Keep the companion's windows hidden.
    pub hide: bool,
}

impl LaunchOptions {
    /// No activation, no windows.
    pub fn background() -> Self {
        Self {
            activate: false,
            hide: true,
        }
    }
}

/// Version metadata shipped inside the installed bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub short_version: String,
    pub build_number: String,
    pub api_version: String,
}

#[async_trait]
pub trait ProcessDirectory: Send + Sync {
    fn is_installed(&self, bundle_location: &Path) -> bool;

    fn find_running(&self, identity: &AppIdentity) -> Option<ProcessHandle>;

    async fn launch(
        &self,
        bundle_location: &Path,
        args: &[String],
        options: LaunchOptions,
    ) -> Result<ProcessHandle, IoError>;

    /// Returns false when the process could not be activated.
    fn activate(&self, handle: &ProcessHandle) -> bool;

    /// Request termination without waiting for the process to exit.
    fn terminate(&self, handle: &ProcessHandle) -> bool;

    fn bundle_metadata(&self, bundle_location: &Path) -> Option<BundleMetadata>;
}

/// A broadcast as delivered by the bus, before any decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub name: String,
    #[serde(default)]
    pub user_info: Map<String, Value>,
}

impl RawEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_info: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.user_info.insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
pub trait NotificationBus: Send + Sync {
    /// Subscribe to the broadcasts named in `kinds`. The stream ends when the
    /// bus connection is lost.
    async fn subscribe(
        &self,
        kinds: &[&str],
    ) -> Result<BoxStream<'static, RawEvent>, TransportError>;
}
