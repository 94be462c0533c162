//! Domain models for the Emporter client.
//!
//! Pure data: tunnels, service and consent state, companion identity and
//! version. No I/O and no business logic; the `emporter-core` crate operates on
//! these values and the `emporter` app renders them.
//!
//! Every entity here is a snapshot. The companion process owns the
//! authoritative state, so a value may be stale the moment it is returned.

pub mod application;
pub mod consent;
pub mod error;
pub mod service;
pub mod tunnel;
pub mod version;

pub use application::Application;
pub use common::ErrorLocation;
pub use consent::ConsentState;
pub use error::model_error::ModelError;
pub use service::ServiceState;
pub use tunnel::builder::TunnelBuilder;
pub use tunnel::properties::{TunnelField, TunnelProperties, TunnelUpdate};
pub use tunnel::{Tunnel, TunnelId, TunnelKind, TunnelSource, TunnelState};
pub use version::{ApiVersion, AppVersion, Version};

#[cfg(test)]
mod tests;
