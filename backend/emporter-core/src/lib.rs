//! Client for the Emporter companion application.
//!
//! The companion owns tunnels that expose local web servers and directories
//! on public URLs. This crate finds or launches it, resolves the user's
//! consent to control it, queries and mutates its tunnels, drives its
//! connection to the tunneling service and republishes its broadcasts.
//!
//! [`EmporterClient`] is the entry point. The transports it uses are traits
//! in [`transport`], so the companion can be replaced by a test double.

pub mod bridge;
pub mod client;
pub mod config;
pub mod consent;
pub mod error;
pub mod lifecycle;
pub mod predicate;
pub mod registry;
pub mod service;
pub mod transport;

mod flight;
mod session;

#[cfg(test)]
mod tests;

pub use bridge::{EmporterEvent, EventSubscription, NotificationBridge};
pub use client::{EmporterClient, EmporterClientBuilder};
pub use config::ClientConfig;
pub use consent::ConsentGate;
pub use error::{CoreError, ErrorKind};
pub use lifecycle::ProcessLifecycleManager;
pub use predicate::{Predicate, PredicateCompiler, SourceUrl};
pub use registry::{TunnelRegistryClient, TunnelStream};
pub use service::ServiceController;

pub const COMPANION_NAME: &str = "Emporter";
pub const COMPANION_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_SCRIPTING_PORT: u16 = 47301;
pub const DEFAULT_NOTIFICATION_PORT: u16 = 47302;
pub const DEFAULT_SCRIPTING_URL: &str =
    const_format::concatcp!("http://", COMPANION_HOSTNAME, ":", DEFAULT_SCRIPTING_PORT);
pub const DEFAULT_NOTIFICATION_URL: &str =
    const_format::concatcp!("ws://", COMPANION_HOSTNAME, ":", DEFAULT_NOTIFICATION_PORT);
