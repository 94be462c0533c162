use emporter_core::transport::process::SystemProcessDirectory;
use emporter_core::transport::{AppIdentity, LaunchOptions, ProcessDirectory};

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use tempfile::tempdir;
use tokio::time::sleep;

/// Short enough to survive the kernel's 15-character process name limit.
fn unique_name() -> String {
    format!("emp{}", std::process::id())
}

fn install_fake_companion(dir: &Path, name: &str) {
    let executable = dir.join(name);
    fs::write(&executable, "#!/bin/sh\nwhile true; do sleep 1; done\n").unwrap();
    fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();
}

/// **VALUE**: A launched companion can be found in the process table and terminated.
///
/// **WHY THIS MATTERS**: Lifecycle management attaches to running instances by name and
/// quits them by PID; both depend on the real process table.
///
/// **BUG THIS CATCHES**: Would catch launch returning a PID that discovery cannot see, or
/// terminate refusing a legitimate companion PID.
#[tokio::test]
async fn given_installed_executable_when_launched_then_found_and_terminated() {
    // GIVEN: A bundle directory holding a long-running executable
    let dir = tempdir().unwrap();
    let name = unique_name();
    install_fake_companion(dir.path(), &name);
    let directory = SystemProcessDirectory::new(name.clone());
    let identity = AppIdentity::new([name.as_str()]);
    assert!(directory.is_installed(dir.path()));

    // WHEN: Launching it in the background
    let handle = directory
        .launch(dir.path(), &[], LaunchOptions::background())
        .await
        .unwrap();

    // THEN: Discovery finds it and it can be activated and terminated
    let mut found = None;
    for _ in 0..50 {
        found = directory.find_running(&identity);
        if found.is_some() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    let found = found.expect("launched process is visible");
    assert_eq!(found.pid, handle.pid);
    assert!(directory.activate(&handle));
    assert!(directory.terminate(&handle));
}

#[tokio::test]
async fn given_missing_executable_when_launching_then_io_error() {
    let dir = tempdir().unwrap();
    let directory = SystemProcessDirectory::new("absent");

    let result = directory
        .launch(dir.path(), &[], LaunchOptions::background())
        .await;

    assert!(result.is_err());
}
