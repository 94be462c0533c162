use crate::config::env::{
    AUTO_LAUNCH_ENV, BUNDLE_IDS_ENV, BUNDLE_LOCATION_ENV, LAUNCH_TIMEOUT_ENV, SCRIPTING_URL_ENV,
};
use crate::config::{ClientConfig, apply_env_overrides};
use crate::error::config::ConfigError;
use crate::{DEFAULT_NOTIFICATION_URL, DEFAULT_SCRIPTING_URL};

use std::fs;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::tempdir;

const OVERRIDE_VARS: [&str; 5] = [
    BUNDLE_LOCATION_ENV,
    BUNDLE_IDS_ENV,
    SCRIPTING_URL_ENV,
    LAUNCH_TIMEOUT_ENV,
    AUTO_LAUNCH_ENV,
];

fn clear_overrides() {
    for var in OVERRIDE_VARS {
        // SAFETY: env-mutating tests are serialized with #[serial]
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
fn given_missing_file_when_loading_then_returns_defaults() {
    let dir = tempdir().unwrap();

    let config = ClientConfig::load(dir.path()).unwrap();

    assert_eq!(config, ClientConfig::default());
    assert_eq!(config.transport.scripting_url, DEFAULT_SCRIPTING_URL);
    assert_eq!(config.transport.notification_url, DEFAULT_NOTIFICATION_URL);
    assert!(config.companion.auto_launch);
}

/// **VALUE**: Saved config round-trips through the atomic write.
///
/// **BUG THIS CATCHES**: Would catch the temp file being left behind or the rename
/// target being the temp path itself.
#[test]
fn given_saved_config_when_loading_then_values_survive_and_no_temp_file_remains() {
    // GIVEN: A customized config saved to disk
    let dir = tempdir().unwrap();
    let mut config = ClientConfig::default();
    config.companion.bundle_location = PathBuf::from("/opt/companion");
    config.companion.auto_launch = false;
    config.companion.launch_timeout_secs = 45;
    config.save(dir.path()).unwrap();

    // WHEN: Loading it back
    let loaded = ClientConfig::load(dir.path()).unwrap();

    // THEN: Values survive and only config.json exists
    assert_eq!(loaded, config);
    assert!(!dir.path().join("config.json.tmp").exists());
}

#[test]
fn given_partial_file_when_loading_then_missing_fields_use_defaults() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{ "companion": { "auto_launch": false } }"#,
    )
    .unwrap();

    let config = ClientConfig::load(dir.path()).unwrap();

    assert!(!config.companion.auto_launch);
    assert_eq!(config.companion.launch_timeout_secs, 20);
    assert_eq!(config.transport, ClientConfig::default().transport);
}

/// **VALUE**: A corrupted file is an error, not silently replaced with defaults.
///
/// **BUG THIS CATCHES**: Would catch a loader that swallows parse errors and later
/// overwrites the user's file on save.
#[test]
fn given_corrupted_file_when_loading_then_returns_parse_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.json"), "{ not json").unwrap();

    let result = ClientConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn given_invalid_values_when_validating_then_returns_validation_error() {
    let mut zero_timeout = ClientConfig::default();
    zero_timeout.companion.launch_timeout_secs = 0;

    let mut wrong_scheme = ClientConfig::default();
    wrong_scheme.transport.notification_url = "http://127.0.0.1:1".to_string();

    let mut no_ids = ClientConfig::default();
    no_ids.companion.bundle_ids = vec![" ".to_string()];

    let mut future_version = ClientConfig::default();
    future_version.version = 99;

    for config in [zero_timeout, wrong_scheme, no_ids, future_version] {
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}

/// **VALUE**: Environment overrides redirect the client to a different bundle.
///
/// **WHY THIS MATTERS**: Tests and staged installs point the client at a non-default
/// companion build without touching the user's config file.
///
/// **BUG THIS CATCHES**: Would catch comma-separated ids not being split and trimmed,
/// or an override being read from the wrong variable.
#[test]
#[serial]
fn given_env_overrides_when_applying_then_config_is_updated() {
    // GIVEN: Override variables set
    clear_overrides();
    // SAFETY: serialized with #[serial]
    unsafe {
        std::env::set_var(BUNDLE_LOCATION_ENV, "/tmp/Emporter-Beta.app");
        std::env::set_var(BUNDLE_IDS_ENV, "net.example.beta, emporter-beta ,");
        std::env::set_var(SCRIPTING_URL_ENV, "http://127.0.0.1:9999");
        std::env::set_var(LAUNCH_TIMEOUT_ENV, "1m 30s");
        std::env::set_var(AUTO_LAUNCH_ENV, "false");
    }

    // WHEN: Applying them
    let mut config = ClientConfig::default();
    let result = apply_env_overrides(&mut config);
    clear_overrides();

    // THEN: Each override is reflected
    result.unwrap();
    assert_eq!(
        config.companion.bundle_location,
        PathBuf::from("/tmp/Emporter-Beta.app")
    );
    assert_eq!(
        config.companion.bundle_ids,
        vec!["net.example.beta".to_string(), "emporter-beta".to_string()]
    );
    assert_eq!(config.transport.scripting_url, "http://127.0.0.1:9999");
    assert_eq!(config.companion.launch_timeout_secs, 90);
    assert!(!config.companion.auto_launch);
}

#[test]
#[serial]
fn given_unparseable_override_when_applying_then_names_the_variable() {
    clear_overrides();
    // SAFETY: serialized with #[serial]
    unsafe { std::env::set_var(AUTO_LAUNCH_ENV, "sometimes") };

    let mut config = ClientConfig::default();
    let result = apply_env_overrides(&mut config);
    clear_overrides();

    match result {
        Err(ConfigError::EnvOverride { variable, .. }) => assert_eq!(variable, AUTO_LAUNCH_ENV),
        other => panic!("Expected EnvOverride error, got {other:?}"),
    }
}
