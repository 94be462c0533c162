use crate::error::AppError;
use crate::output::{Output, StatusView};

use emporter_core::EmporterClient;
use models::ConsentState;

use std::time::Duration;

use log::debug;
use serde_json::json;

pub async fn status(client: &EmporterClient, output: Output) -> Result<(), AppError> {
    let application = client.application();

    // Never prompt or launch just to report status
    let consent = client.resolve_consent(false).await.map_err(AppError::core)?;
    let service = if consent == ConsentState::Granted {
        match client.service_state().await {
            Ok(state) => Some(state),
            Err(e) => {
                debug!("Service state unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let view = StatusView::new(application, consent, service.as_ref(), client.is_listening());
    output.emit(&view, || {
        let mut lines = vec![
            format!("Companion:  {}", view.bundle_location.display()),
            format!("Installed:  {}", view.installed),
            match view.pid {
                Some(pid) => format!("Running:    yes (PID {pid})"),
                None => String::from("Running:    no"),
            },
            format!("Consent:    {:?}", view.consent),
        ];
        if let Some(service) = &view.service {
            lines.push(format!("Service:    {service}"));
        }
        lines.join("\n")
    })
}

pub fn version(client: &EmporterClient, output: Output) -> Result<(), AppError> {
    let version = client
        .version()
        .ok_or_else(|| AppError::app("Companion version is unavailable (not installed?)"))?;

    output.emit(
        &json!({ "app": version.app.to_string(), "api": version.api.to_string() }),
        || version.to_string(),
    )
}

pub async fn launch(
    client: &EmporterClient,
    timeout_secs: Option<u64>,
    output: Output,
) -> Result<(), AppError> {
    let timeout = timeout_secs.map(Duration::from_secs);
    client
        .launch_in_background(timeout)
        .await
        .map_err(AppError::core)?;

    let pid = client.application().process_identifier;
    output.emit(&json!({ "running": true, "pid": pid }), || match pid {
        Some(pid) => format!("Companion is running (PID {pid})"),
        None => String::from("Companion is running"),
    })
}

pub fn activate(client: &EmporterClient, output: Output) -> Result<(), AppError> {
    if !client.activate() {
        return Err(AppError::app("Companion is not running"));
    }
    output.done("Companion activated")
}

pub fn quit(client: &EmporterClient, output: Output) -> Result<(), AppError> {
    if !client.quit() {
        return Err(AppError::app("Companion is not running"));
    }
    output.done("Companion asked to quit")
}

pub async fn consent(
    client: &EmporterClient,
    prompt: bool,
    output: Output,
) -> Result<(), AppError> {
    let state = client.resolve_consent(prompt).await.map_err(AppError::core)?;

    output.emit(&json!({ "consent": state }), || match state {
        ConsentState::Granted => String::from("Control of the companion is granted"),
        ConsentState::Denied => String::from("Control of the companion was denied"),
        ConsentState::Required => {
            String::from("Permission has not been decided; run with --prompt to ask")
        }
        ConsentState::Unknown => String::from("Companion is not running"),
    })
}
