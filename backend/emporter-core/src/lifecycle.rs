//! Detecting, launching and attaching to the companion process.

use crate::error::lifecycle::LifecycleError;
use crate::error::transport::TransportError;
use crate::flight::SingleFlight;
use crate::transport::{
    AppIdentity, LaunchOptions, ProcessDirectory, ProcessHandle, RemoteScriptingChannel, Target,
};

use common::ErrorLocation;
use models::{ApiVersion, AppVersion, Application, Version};

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tokio::time::{sleep as TokioSleep, timeout as TokioTimeout};

/// Application property read to decide the companion accepts commands.
pub const API_VERSION_PROPERTY: &str = "apiVersion";
const READY_PROBE_INITIAL_INTERVAL: Duration = Duration::from_millis(50);
const READY_PROBE_MAX_INTERVAL: Duration = Duration::from_secs(1);

type LaunchOutcome = Result<ProcessHandle, LifecycleError>;

pub struct ProcessLifecycleManager {
    directory: Arc<dyn ProcessDirectory>,
    channel: Arc<dyn RemoteScriptingChannel>,
    bundle_location: PathBuf,
    identity: AppIdentity,
    launch_arguments: Vec<String>,
    launches: SingleFlight<LaunchOutcome>,
    runtime: Handle,
}

impl ProcessLifecycleManager {
    pub fn new(
        directory: Arc<dyn ProcessDirectory>,
        channel: Arc<dyn RemoteScriptingChannel>,
        bundle_location: PathBuf,
        identity: AppIdentity,
        launch_arguments: Vec<String>,
        runtime: Handle,
    ) -> Self {
        Self {
            directory,
            channel,
            bundle_location,
            identity,
            launch_arguments,
            launches: SingleFlight::new(),
            runtime,
        }
    }

    pub fn bundle_location(&self) -> &Path {
        &self.bundle_location
    }

    pub fn is_installed(&self) -> bool {
        self.directory.is_installed(&self.bundle_location)
    }

    pub fn is_running(&self) -> bool {
        self.running_process().is_some()
    }

    pub fn running_process(&self) -> Option<ProcessHandle> {
        self.directory.find_running(&self.identity)
    }

    /// Snapshot of the companion's install and run status.
    pub fn application(&self) -> Application {
        let process = self.running_process();

        Application {
            bundle_location: self.bundle_location.clone(),
            is_installed: self.is_installed(),
            is_running: process.is_some(),
            process_identifier: process.map(|p| p.pid),
        }
    }

    /// Versions of the installed bundle, if its manifest can be read.
    pub fn version(&self) -> Option<Version> {
        let metadata = self.directory.bundle_metadata(&self.bundle_location)?;

        let api = metadata
            .api_version
            .parse::<ApiVersion>()
            .map_err(|e| warn!("Ignoring bundle API version: {e}"))
            .ok()?;
        let app = AppVersion::parse(&metadata.short_version, &metadata.build_number)
            .map_err(|e| warn!("Ignoring bundle app version: {e}"))
            .ok()?;

        Some(Version { api, app })
    }

    /// Launch the companion without activating it and wait until it accepts
    /// commands.
    ///
    /// Concurrent calls share one attempt. Dropping the returned future does
    /// not abort the attempt; other callers still observe its outcome.
    pub async fn launch_in_background(&self, timeout: Duration) -> LaunchOutcome {
        if !self.is_installed() {
            return Err(LifecycleError::NotInstalled {
                message: format!("No companion at {}", self.bundle_location.display()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let directory = Arc::clone(&self.directory);
        let channel = Arc::clone(&self.channel);
        let location = self.bundle_location.clone();
        let identity = self.identity.clone();
        let arguments = self.launch_arguments.clone();

        self.launches
            .run(
                move || launch_and_wait(directory, channel, location, identity, arguments, timeout),
                launch_aborted,
            )
            .await
    }

    /// Blocking form of [`launch_in_background`](Self::launch_in_background).
    ///
    /// Must not be called from within an async context.
    pub fn launch_in_background_blocking(&self, timeout: Duration) -> LaunchOutcome {
        self.runtime.block_on(self.launch_in_background(timeout))
    }

    /// The running companion, launching it first when `auto_launch` allows.
    pub async fn ensure_running(&self, auto_launch: bool, timeout: Duration) -> LaunchOutcome {
        if self.launches.in_flight() {
            return self.launch_in_background(timeout).await;
        }

        if let Some(process) = self.running_process() {
            return Ok(process);
        }

        if !self.is_installed() {
            return Err(LifecycleError::NotInstalled {
                message: format!("No companion at {}", self.bundle_location.display()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if !auto_launch {
            return Err(LifecycleError::NotRunning {
                message: "Companion is not running and automatic launch is disabled".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.launch_in_background(timeout).await
    }

    /// Bring the companion to the foreground. No-op when it is not running.
    pub fn activate(&self) -> bool {
        match self.running_process() {
            Some(process) => self.directory.activate(&process),
            None => {
                debug!("Activation skipped: companion is not running");
                false
            }
        }
    }

    /// Ask the companion to terminate. Returns whether a request was sent.
    pub fn quit(&self) -> bool {
        match self.running_process() {
            Some(process) => {
                info!("Requesting companion termination (PID: {})", process.pid);
                self.directory.terminate(&process)
            }
            None => {
                debug!("Quit skipped: companion is not running");
                false
            }
        }
    }
}

fn launch_aborted(error: JoinError) -> LaunchOutcome {
    Err(LifecycleError::LaunchFailed {
        message: format!("Launch attempt aborted: {error}"),
        location: ErrorLocation::from(Location::caller()),
    })
}

async fn launch_and_wait(
    directory: Arc<dyn ProcessDirectory>,
    channel: Arc<dyn RemoteScriptingChannel>,
    location: PathBuf,
    identity: AppIdentity,
    arguments: Vec<String>,
    timeout: Duration,
) -> LaunchOutcome {
    let attempt = attach_or_launch(
        directory.as_ref(),
        channel.as_ref(),
        &location,
        &identity,
        &arguments,
    );

    // The bound covers spawning as well as readiness
    match TokioTimeout(timeout, attempt).await {
        Ok(Ok(process)) => {
            info!("Companion ready (PID: {})", process.pid);
            Ok(process)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(LifecycleError::Timeout {
            message: format!("Companion did not accept commands within {timeout:?}"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

async fn attach_or_launch(
    directory: &dyn ProcessDirectory,
    channel: &dyn RemoteScriptingChannel,
    location: &Path,
    identity: &AppIdentity,
    arguments: &[String],
) -> LaunchOutcome {
    let process = match directory.find_running(identity) {
        Some(process) => {
            debug!("Attaching to running companion (PID: {})", process.pid);
            process
        }
        None => {
            info!("Launching companion from {}", location.display());
            directory
                .launch(location, arguments, LaunchOptions::background())
                .await
                .map_err(|e| LifecycleError::LaunchFailed {
                    message: format!("Failed to launch {}: {e}", location.display()),
                    location: ErrorLocation::from(Location::caller()),
                })?
        }
    };

    wait_until_ready(directory, channel, identity, &process).await?;
    Ok(process)
}

async fn wait_until_ready(
    directory: &dyn ProcessDirectory,
    channel: &dyn RemoteScriptingChannel,
    identity: &AppIdentity,
    process: &ProcessHandle,
) -> Result<(), LifecycleError> {
    let mut backoff = ExponentialBackoff {
        initial_interval: READY_PROBE_INITIAL_INTERVAL,
        max_interval: READY_PROBE_MAX_INTERVAL,
        max_elapsed_time: None,
        ..Default::default()
    };

    debug!("Waiting for companion (PID: {}) to accept commands", process.pid);

    loop {
        if probe_ready(channel).await {
            return Ok(());
        }

        if directory.find_running(identity).is_none() {
            return Err(LifecycleError::LaunchFailed {
                message: format!("Companion (PID: {}) exited before accepting commands", process.pid),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let delay = backoff.next_backoff().unwrap_or(READY_PROBE_MAX_INTERVAL);
        trace!("Companion not ready, retrying after {delay:?}");
        TokioSleep(delay).await;
    }
}

/// A companion refusing us for lack of consent is still accepting commands.
async fn probe_ready(channel: &dyn RemoteScriptingChannel) -> bool {
    match channel
        .read_property(&Target::Application, API_VERSION_PROPERTY)
        .await
    {
        Ok(_) | Err(TransportError::PermissionDenied { .. }) => true,
        Err(e) => {
            trace!("Readiness probe failed: {}", e.message());
            false
        }
    }
}
