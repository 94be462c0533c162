use emporter::cli::Cli;
use emporter::commands;
use emporter::error::AppError;
use emporter::logger::{initialize as LoggerInitialize, level_for_verbosity};
use emporter::output::Output;

use emporter_core::config::env::default_config_dir;
use emporter_core::{ClientConfig, EmporterClient};

use std::fs::create_dir_all;
use std::process::ExitCode;

use clap::Parser;
use log::debug;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(cli.json);

    match run(cli, output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e, output);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli, output: Output) -> Result<(), AppError> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_config_dir().map_err(AppError::core)?,
    };

    create_dir_all(&config_dir).map_err(|e| {
        AppError::app(format!(
            "Failed to create config directory {}: {e}",
            config_dir.display()
        ))
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&config_dir, level_for_verbosity(cli.verbose))?;

    let mut config = ClientConfig::resolve(Some(&config_dir)).map_err(AppError::core)?;
    if cli.no_launch {
        config.companion.auto_launch = false;
    }
    debug!("Using companion at {}", config.companion.bundle_location.display());

    let client = EmporterClient::from_config(config)
        .await
        .map_err(AppError::core)?;

    commands::run(&client, cli.command, output).await
}

fn report(error: &AppError, output: Output) {
    if output.json {
        match serde_json::to_string(error) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("emporter: {error}"),
        }
    } else {
        eprintln!("emporter: {error}");
    }
}
