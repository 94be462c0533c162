pub mod env;

pub use env::{EnvLoadResult, apply_env_overrides, default_config_dir, try_load_dotenv};

use crate::bridge::DEFAULT_EVENT_BUFFER;
use crate::error::config::ConfigError;
use crate::transport::AppIdentity;
use crate::{DEFAULT_NOTIFICATION_URL, DEFAULT_SCRIPTING_URL};

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;
const MAX_LAUNCH_TIMEOUT_SECS: u64 = 600;

#[cfg(target_os = "macos")]
const DEFAULT_BUNDLE_LOCATION: &str = "/Applications/Emporter.app";
#[cfg(not(target_os = "macos"))]
const DEFAULT_BUNDLE_LOCATION: &str = "/opt/emporter";

const DEFAULT_BUNDLE_IDS: [&str; 3] = [
    "net.youngdynasty.emporter",
    "net.youngdynasty.emporter.mas",
    "emporter",
];

// ============================================
// CONFIG STRUCTS
// ============================================

/// Where the companion lives and how it is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionConfig {
    #[serde(default = "default_bundle_location")]
    pub bundle_location: PathBuf,
    /// Names the running companion is recognized by, in preference order.
    #[serde(default = "default_bundle_ids")]
    pub bundle_ids: Vec<String>,
    #[serde(default)]
    pub launch_arguments: Vec<String>,
    #[serde(default = "default_launch_timeout_secs")]
    pub launch_timeout_secs: u64,
    /// Launch the companion on demand before remote operations.
    #[serde(default = "default_auto_launch")]
    pub auto_launch: bool,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            bundle_location: default_bundle_location(),
            bundle_ids: default_bundle_ids(),
            launch_arguments: Vec::new(),
            launch_timeout_secs: default_launch_timeout_secs(),
            auto_launch: default_auto_launch(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_scripting_url")]
    pub scripting_url: String,
    #[serde(default = "default_notification_url")]
    pub notification_url: String,
    /// Events buffered per subscriber before a slow one starts skipping.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scripting_url: default_scripting_url(),
            notification_url: default_notification_url(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub companion: CompanionConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            companion: CompanionConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_bundle_location() -> PathBuf {
    PathBuf::from(DEFAULT_BUNDLE_LOCATION)
}
fn default_bundle_ids() -> Vec<String> {
    DEFAULT_BUNDLE_IDS.iter().map(|id| id.to_string()).collect()
}
fn default_launch_timeout_secs() -> u64 {
    20
}
fn default_auto_launch() -> bool {
    true
}
fn default_scripting_url() -> String {
    DEFAULT_SCRIPTING_URL.to_string()
}
fn default_notification_url() -> String {
    DEFAULT_NOTIFICATION_URL.to_string()
}
fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ClientConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// A missing file yields defaults. A file that exists but cannot be read,
    /// parsed or validated is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: ClientConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json via temp file and rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Load from `config_dir` (or the platform default), then apply
    /// environment overrides.
    pub fn resolve(config_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let dir = match config_dir {
            Some(dir) => dir.to_path_buf(),
            None => default_config_dir()?,
        };

        let mut config = Self::load(&dir)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{CONFIG_VERSION})",
                    self.version
                ),
            });
        }

        if self.companion.bundle_location.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "bundle_location cannot be empty".to_string(),
            });
        }

        if self.companion.bundle_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "bundle_ids must name at least one identifier".to_string(),
            });
        }

        if self.companion.launch_timeout_secs == 0
            || self.companion.launch_timeout_secs > MAX_LAUNCH_TIMEOUT_SECS
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid launch timeout: {}s (must be 1-{MAX_LAUNCH_TIMEOUT_SECS})",
                    self.companion.launch_timeout_secs
                ),
            });
        }

        validate_url(&self.transport.scripting_url, &["http", "https"])?;
        validate_url(&self.transport.notification_url, &["ws", "wss"])?;

        if self.transport.event_buffer == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "event_buffer must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.companion.launch_timeout_secs)
    }

    pub fn identity(&self) -> AppIdentity {
        AppIdentity::new(
            self.companion
                .bundle_ids
                .iter()
                .filter(|id| !id.trim().is_empty())
                .cloned(),
        )
    }
}

#[track_caller]
fn validate_url(url: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: format!("Invalid URL {url}: {e}"),
    })?;

    if !schemes.contains(&parsed.scheme()) {
        return Err(ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("Invalid URL scheme in {url} (expected one of {schemes:?})"),
        });
    }

    Ok(())
}
