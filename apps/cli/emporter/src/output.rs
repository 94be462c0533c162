//! Rendering of command results as text or JSON on stdout.

use crate::error::AppError;

use emporter_core::EmporterEvent;
use models::{Application, ConsentState, ServiceState, Tunnel, TunnelSource};

use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TunnelView {
    pub id: String,
    pub name: String,
    pub kind: &'static str,
    pub state: &'static str,
    pub enabled: bool,
    pub temporary: bool,
    pub password_protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_reason: Option<String>,
}

impl From<&Tunnel> for TunnelView {
    fn from(tunnel: &Tunnel) -> Self {
        let (port, directory) = match &tunnel.source {
            TunnelSource::Proxy { port, .. } => (Some(*port), None),
            TunnelSource::Directory { directory, .. } => (None, Some(directory.clone())),
        };

        Self {
            id: tunnel.id.to_string(),
            name: tunnel.name.clone(),
            kind: tunnel.kind().as_str(),
            state: tunnel.state.as_str(),
            enabled: tunnel.is_enabled,
            temporary: tunnel.is_temporary,
            password_protected: tunnel.is_auth_enabled,
            remote_url: tunnel.remote_url.clone(),
            port,
            directory,
            conflict_reason: tunnel.conflict_reason.clone(),
        }
    }
}

impl TunnelView {
    /// One line: id, kind, state, source, public URL.
    pub fn line(&self) -> String {
        let source = match (&self.port, &self.directory) {
            (Some(port), _) => format!("localhost:{port}"),
            (None, Some(directory)) => directory.display().to_string(),
            (None, None) => String::from("-"),
        };
        let mut line = format!(
            "{}\t{}\t{}\t{}\t{}",
            self.id,
            self.kind,
            self.state,
            source,
            self.remote_url.as_deref().unwrap_or("-")
        );
        if !self.enabled {
            line.push_str("\t(disabled)");
        }
        line
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub bundle_location: PathBuf,
    pub installed: bool,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub consent: ConsentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub listening: bool,
}

impl StatusView {
    pub fn new(
        application: Application,
        consent: ConsentState,
        service: Option<&ServiceState>,
        listening: bool,
    ) -> Self {
        Self {
            bundle_location: application.bundle_location,
            installed: application.is_installed,
            running: application.is_running,
            pid: application.process_identifier,
            consent,
            service: service.map(ToString::to_string),
            listening,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventView {
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl From<&EmporterEvent> for EventView {
    fn from(event: &EmporterEvent) -> Self {
        let (name, pid, state) = match event {
            EmporterEvent::ProcessLaunched { pid } => ("process-launched", *pid, None),
            EmporterEvent::ProcessTerminated { pid } => ("process-terminated", *pid, None),
            EmporterEvent::TunnelAdded { .. } => ("tunnel-added", None, None),
            EmporterEvent::TunnelRemoved { .. } => ("tunnel-removed", None, None),
            EmporterEvent::TunnelStateChanged { .. } => ("tunnel-state-changed", None, None),
            EmporterEvent::TunnelConfigurationChanged { .. } => {
                ("tunnel-configuration-changed", None, None)
            }
            EmporterEvent::ServiceStateChanged { state } => (
                "service-state-changed",
                None,
                state.as_ref().map(ToString::to_string),
            ),
        };

        Self {
            event: name,
            tunnel_id: event.tunnel_id().map(ToString::to_string),
            pid,
            state,
        }
    }
}

impl EventView {
    pub fn line(&self) -> String {
        let detail = self
            .tunnel_id
            .clone()
            .or_else(|| self.pid.map(|pid| format!("pid {pid}")))
            .or_else(|| self.state.clone());

        match detail {
            Some(detail) => format!("{} {detail}", self.event),
            None => self.event.to_string(),
        }
    }
}

/// Where command results go.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print `value` as JSON, or `text` otherwise.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<(), AppError> {
        if self.json {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| AppError::app(format!("Failed to serialize output: {e}")))?;
            println!("{json}");
        } else {
            println!("{}", text());
        }
        Ok(())
    }

    pub fn tunnels(&self, tunnels: &[Tunnel]) -> Result<(), AppError> {
        let views: Vec<TunnelView> = tunnels.iter().map(TunnelView::from).collect();
        self.emit(&views, || {
            if views.is_empty() {
                String::from("No tunnels")
            } else {
                views.iter().map(TunnelView::line).collect::<Vec<_>>().join("\n")
            }
        })
    }

    pub fn tunnel(&self, tunnel: &Tunnel) -> Result<(), AppError> {
        let view = TunnelView::from(tunnel);
        self.emit(&view, || view.line())
    }

    pub fn event(&self, event: &EmporterEvent) -> Result<(), AppError> {
        let view = EventView::from(event);
        if self.json {
            // One object per line so the stream can be piped
            let json = serde_json::to_string(&view)
                .map_err(|e| AppError::app(format!("Failed to serialize event: {e}")))?;
            println!("{json}");
            Ok(())
        } else {
            println!("{}", view.line());
            Ok(())
        }
    }

    /// Acknowledge a command that has no result of its own.
    pub fn done(&self, message: &str) -> Result<(), AppError> {
        self.emit(&serde_json::json!({ "ok": true, "message": message }), || {
            message.to_string()
        })
    }
}
