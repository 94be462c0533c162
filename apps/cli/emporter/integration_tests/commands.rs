// Subcommands driven against a client whose companion is absent

use emporter::cli::{Commands, ListArgs};
use emporter::commands;
use emporter::output::Output;

use emporter_core::{ClientConfig, EmporterClient, ErrorKind};

use std::path::Path;

use tempfile::TempDir;

/// A client pointed at a bundle that does not exist and at endpoints nobody
/// listens on.
async fn absent_companion(dir: &Path, auto_launch: bool) -> EmporterClient {
    let mut config = ClientConfig::default();
    config.companion.bundle_location = dir.join("Missing.app");
    config.companion.bundle_ids = vec![String::from("emporter-cli-absent")];
    config.companion.auto_launch = auto_launch;
    config.transport.scripting_url = String::from("http://127.0.0.1:1/");
    config.transport.notification_url = String::from("ws://127.0.0.1:1/");

    EmporterClient::from_config(config).await.unwrap()
}

/// **VALUE**: `status` is safe to run on a machine without the companion.
///
/// **BUG THIS CATCHES**: Would catch status trying to launch or prompt, which
/// would surface as an error instead of a report.
#[tokio::test]
async fn given_missing_companion_when_status_then_reports_without_error() {
    // GIVEN: Nothing installed, nothing running
    let temp = TempDir::new().unwrap();
    let client = absent_companion(temp.path(), true).await;

    // WHEN: Asking for status
    let result = commands::run(&client, Commands::Status, Output::new(true)).await;

    // THEN: A report, not a failure
    assert!(result.is_ok());
    assert!(!client.is_running());
}

#[tokio::test]
async fn given_missing_companion_when_listing_then_not_installed_exit_code() {
    let temp = TempDir::new().unwrap();
    let client = absent_companion(temp.path(), false).await;

    let args = ListArgs {
        port: Some(8080),
        source: None,
    };
    let error = commands::run(&client, Commands::List(args), Output::new(false))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), Some(ErrorKind::NotInstalled));
    assert_eq!(error.exit_code(), 3);
}

#[tokio::test]
async fn given_missing_companion_when_version_then_app_error() {
    let temp = TempDir::new().unwrap();
    let client = absent_companion(temp.path(), false).await;

    let error = commands::run(&client, Commands::Version, Output::new(false))
        .await
        .unwrap_err();

    assert_eq!(error.exit_code(), 1);
}

#[tokio::test]
async fn given_companion_not_running_when_activating_then_error() {
    let temp = TempDir::new().unwrap();
    let client = absent_companion(temp.path(), false).await;

    let result = commands::run(&client, Commands::Activate, Output::new(false)).await;

    assert!(result.is_err());
}
