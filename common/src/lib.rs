//! Shared building blocks for the Emporter client workspace.
//!
//! Everything here is dependency-light and used by every other crate:
//!
//! - [`ErrorLocation`]: file/line/column captured at the point an error is raised
//! - [`RedactedSecret`]: a credential that never shows up in logs or serialized output

pub mod error;
pub mod redacted_secret;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_secret::RedactedSecret;

#[cfg(test)]
mod tests;
