//! Process table access backed by `sysinfo` and `tokio::process`.

use crate::transport::{AppIdentity, BundleMetadata, LaunchOptions, ProcessDirectory, ProcessHandle};

use std::fs::read_to_string;
use std::io::Error as IoError;
use std::path::{Path, PathBuf};
use std::process::{Stdio, id as current_pid};

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use sysinfo::{Pid, Process, ProcessesToUpdate, Signal, System};
use tokio::process::Command as TokioCommand;

/// Executable looked up inside a bundle directory.
pub const DEFAULT_EXECUTABLE_NAME: &str = "emporter";
/// Manifest carrying the bundle's version metadata.
pub const BUNDLE_MANIFEST_NAME: &str = "version.toml";
const BACKGROUND_FLAG: &str = "--background";
const ACTIVATE_FLAG: &str = "--activate";

/// [`ProcessDirectory`] for the local machine.
///
/// A bundle location is either the companion executable itself or a
/// directory containing it (and its `version.toml` manifest).
#[derive(Debug, Clone)]
pub struct SystemProcessDirectory {
    executable_name: String,
}

impl Default for SystemProcessDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLE_NAME)
    }
}

impl SystemProcessDirectory {
    pub fn new(executable_name: impl Into<String>) -> Self {
        Self {
            executable_name: executable_name.into(),
        }
    }

    pub(crate) fn resolve_executable(&self, bundle_location: &Path) -> PathBuf {
        if bundle_location.is_dir() {
            bundle_location.join(&self.executable_name)
        } else {
            bundle_location.to_path_buf()
        }
    }

    pub(crate) fn bundle_dir(bundle_location: &Path) -> Option<&Path> {
        if bundle_location.is_dir() {
            Some(bundle_location)
        } else {
            bundle_location.parent()
        }
    }
}

pub(crate) fn with_process<F, R>(pid: u32, f: F) -> Option<R>
where
    F: FnOnce(&Process) -> R,
{
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    sys.process(pid).map(f)
}

pub(crate) fn format_command(process: &Process) -> String {
    process
        .cmd()
        .iter()
        .map(|s| s.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn process_names(process: &Process) -> impl Iterator<Item = String> {
    let name = process.name().to_string_lossy().to_string();
    let exe_name = process
        .exe()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().to_string());

    std::iter::once(name).chain(exe_name)
}

#[async_trait]
impl ProcessDirectory for SystemProcessDirectory {
    fn is_installed(&self, bundle_location: &Path) -> bool {
        self.resolve_executable(bundle_location).is_file()
    }

    fn find_running(&self, identity: &AppIdentity) -> Option<ProcessHandle> {
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);

        trace!("Scanning {} processes", sys.processes().len());

        let own_pid = current_pid();

        // Lowest PID wins when several instances are running
        let mut candidates: Vec<_> = sys
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != own_pid)
            .filter(|(_, p)| process_names(p).any(|n| identity.matches(&n)))
            .map(|(pid, p)| (pid.as_u32(), p))
            .collect();
        candidates.sort_by_key(|(pid, _)| *pid);

        candidates.first().map(|(pid, p)| {
            let name = p.name().to_string_lossy().to_string();
            trace!("Found companion process: {name} (PID: {pid}) {}", format_command(p));
            ProcessHandle { pid: *pid, name }
        })
    }

    async fn launch(
        &self,
        bundle_location: &Path,
        args: &[String],
        options: LaunchOptions,
    ) -> Result<ProcessHandle, IoError> {
        let executable = self.resolve_executable(bundle_location);

        let mut cmd = TokioCommand::new(&executable);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if options.hide {
            cmd.arg(BACKGROUND_FLAG);
        }
        if options.activate {
            cmd.arg(ACTIVATE_FLAG);
        }
        if let Some(dir) = Self::bundle_dir(bundle_location) {
            cmd.current_dir(dir);
        }

        debug!("Spawning {}", executable.display());

        // Dropping the child leaves the process running
        let child = cmd.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| IoError::other("spawned process exited immediately"))?;

        let name = executable
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.executable_name.clone());

        info!("Spawned {name} (PID: {pid})");
        Ok(ProcessHandle { pid, name })
    }

    fn activate(&self, handle: &ProcessHandle) -> bool {
        // There is no window server to ask, so activation only confirms the
        // process is still alive.
        let alive = with_process(handle.pid, |_| true).unwrap_or(false);
        debug!(
            "Activation requested for {} (PID: {}): alive={alive}",
            handle.name, handle.pid
        );
        alive
    }

    fn terminate(&self, handle: &ProcessHandle) -> bool {
        let pid = handle.pid;

        if pid <= 1 || pid == current_pid() {
            warn!("Refusing to terminate PID {pid}");
            return false;
        }

        with_process(pid, |p| {
            if let Some(sent) = p.kill_with(Signal::Term) {
                debug!("Sent SIGTERM to PID {pid}: success={sent}");
                sent
            } else {
                let killed = p.kill();
                debug!("Sent SIGKILL to PID {pid}: success={killed}");
                killed
            }
        })
        .unwrap_or_else(|| {
            debug!("Process {pid} not found");
            false
        })
    }

    fn bundle_metadata(&self, bundle_location: &Path) -> Option<BundleMetadata> {
        let manifest = Self::bundle_dir(bundle_location)?.join(BUNDLE_MANIFEST_NAME);
        let contents = read_to_string(&manifest).ok()?;

        match toml::from_str(&contents) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Ignoring malformed manifest {}: {e}", manifest.display());
                None
            }
        }
    }
}
