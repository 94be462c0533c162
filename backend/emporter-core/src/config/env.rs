//! Environment overrides and config directory discovery.

use crate::config::ClientConfig;
use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::PathBuf;

use log::{debug, info, warn};

pub const BUNDLE_LOCATION_ENV: &str = "EMPORTER_BUNDLE_LOCATION";
pub const BUNDLE_IDS_ENV: &str = "EMPORTER_BUNDLE_IDS";
pub const SCRIPTING_URL_ENV: &str = "EMPORTER_SCRIPTING_URL";
pub const NOTIFICATION_URL_ENV: &str = "EMPORTER_NOTIFICATION_URL";
pub const LAUNCH_TIMEOUT_ENV: &str = "EMPORTER_LAUNCH_TIMEOUT";
pub const AUTO_LAUNCH_ENV: &str = "EMPORTER_AUTO_LAUNCH";
pub const CONFIG_DIR_ENV: &str = "EMPORTER_CONFIG_DIR";
const CONFIG_DIR_NAME: &str = "emporter";

/// Result of looking for a .env file.
#[derive(Debug, Clone, Default)]
pub struct EnvLoadResult {
    pub path: Option<PathBuf>,
    pub loaded: bool,
}

/// Load a .env file from the working directory, then next to the executable.
pub fn try_load_dotenv() -> EnvLoadResult {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {path:?}");
        return EnvLoadResult {
            path: Some(path),
            loaded: true,
        };
    }

    if let Some(env_path) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")))
        .filter(|path| path.exists())
    {
        match dotenvy::from_path(&env_path) {
            Ok(()) => {
                info!("Loaded .env from: {env_path:?}");
                return EnvLoadResult {
                    path: Some(env_path),
                    loaded: true,
                };
            }
            Err(e) => warn!("Failed to parse .env at {env_path:?}: {e}"),
        }
    }

    EnvLoadResult::default()
}

/// `{EMPORTER_CONFIG_DIR}` when set, else the platform config dir.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
        debug!("Using {CONFIG_DIR_ENV} override: {custom_dir}");
        return Ok(PathBuf::from(custom_dir));
    }

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| ConfigError::DirectoryNotFound {
            location: ErrorLocation::from(Location::caller()),
            reason: "Platform has no configuration directory".to_string(),
        })
}

#[track_caller]
fn read_var(variable: &str) -> Result<Option<String>, ConfigError> {
    match env::var(variable) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::EnvOverride {
            location: ErrorLocation::from(Location::caller()),
            variable: variable.to_string(),
            reason: "contains invalid unicode".to_string(),
        }),
    }
}

/// Overlay `EMPORTER_*` environment variables onto `config`.
pub fn apply_env_overrides(config: &mut ClientConfig) -> Result<(), ConfigError> {
    let env_result = try_load_dotenv();
    if !env_result.loaded {
        debug!("No .env file found - checking existing environment variables");
    }

    if let Some(location) = read_var(BUNDLE_LOCATION_ENV)? {
        info!("Using {BUNDLE_LOCATION_ENV} override: {location}");
        config.companion.bundle_location = PathBuf::from(location);
    }

    if let Some(ids) = read_var(BUNDLE_IDS_ENV)? {
        config.companion.bundle_ids = ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        info!("Using {BUNDLE_IDS_ENV} override: {:?}", config.companion.bundle_ids);
    }

    if let Some(url) = read_var(SCRIPTING_URL_ENV)? {
        info!("Using {SCRIPTING_URL_ENV} override: {url}");
        config.transport.scripting_url = url;
    }

    if let Some(url) = read_var(NOTIFICATION_URL_ENV)? {
        info!("Using {NOTIFICATION_URL_ENV} override: {url}");
        config.transport.notification_url = url;
    }

    if let Some(timeout) = read_var(LAUNCH_TIMEOUT_ENV)? {
        let duration =
            humantime::parse_duration(&timeout).map_err(|e| ConfigError::EnvOverride {
                location: ErrorLocation::from(Location::caller()),
                variable: LAUNCH_TIMEOUT_ENV.to_string(),
                reason: e.to_string(),
            })?;
        config.companion.launch_timeout_secs = duration.as_secs().max(1);
    }

    if let Some(auto_launch) = read_var(AUTO_LAUNCH_ENV)? {
        config.companion.auto_launch =
            auto_launch
                .trim()
                .parse::<bool>()
                .map_err(|e| ConfigError::EnvOverride {
                    location: ErrorLocation::from(Location::caller()),
                    variable: AUTO_LAUNCH_ENV.to_string(),
                    reason: e.to_string(),
                })?;
    }

    Ok(())
}
