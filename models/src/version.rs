//! Companion version information.
//!
//! Read from the installed bundle's metadata, so it is available whether or
//! not the companion is running.

use crate::ErrorLocation;
use crate::error::model_error::ModelError;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::str::FromStr;

/// Version of the companion's scripting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Marketing version plus build number of the companion app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub api: ApiVersion,
    pub app: AppVersion,
}

/// Parses "1", "1.2" or "1.2.3"; missing components are zero.
#[track_caller]
fn parse_triple(text: &str) -> Result<(u32, u32, u32), ModelError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ModelError::Parse {
            message: String::from("Version string is empty"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mut parts = [0u32; 3];

    for (index, component) in trimmed.split('.').enumerate() {
        if index >= parts.len() {
            return Err(ModelError::Parse {
                message: format!("Too many version components in '{trimmed}'"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        parts[index] = component.parse().map_err(|_| ModelError::Parse {
            message: format!("Invalid version component '{component}' in '{trimmed}'"),
            location: ErrorLocation::from(Location::caller()),
        })?;
    }

    Ok((parts[0], parts[1], parts[2]))
}

impl FromStr for ApiVersion {
    type Err = ModelError;

    #[track_caller]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor, patch) = parse_triple(s)?;
        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

impl AppVersion {
    #[track_caller]
    pub fn parse(short_version: &str, build_number: &str) -> Result<Self, ModelError> {
        let (major, minor, patch) = parse_triple(short_version)?;
        let build_number = build_number
            .trim()
            .parse()
            .map_err(|_| ModelError::Parse {
                message: format!("Invalid build number '{build_number}'"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(Self {
            major,
            minor,
            patch,
            build_number,
        })
    }
}

impl Display for ApiVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Display for AppVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(
            f,
            "{}.{}.{} ({})",
            self.major, self.minor, self.patch, self.build_number
        )
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "app {} / api {}", self.app, self.api)
    }
}
