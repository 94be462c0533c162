// Unit tests for the process table helpers
// Launch behavior against a real executable lives in integration_tests/transport/process.rs

use crate::transport::process::{SystemProcessDirectory, format_command, with_process};
use crate::transport::{AppIdentity, ProcessDirectory, ProcessHandle};

use std::fs;

use tempfile::tempdir;

/// **VALUE**: Tests the `format_command()` helper against a real process.
///
/// **BUG THIS CATCHES**: Ensures we don't crash on the command line of a live process
/// while logging discovery candidates.
#[test]
fn given_valid_process_when_format_command_called_then_returns_command_string() {
    // GIVEN: A valid process (using our own PID)
    let our_pid = std::process::id();

    // WHEN: Calling format_command on the process
    let result = with_process(our_pid, format_command);

    // THEN: Should return Some with non-empty command string
    let cmd = result.expect("Should find the process");
    assert!(!cmd.is_empty(), "Command string should not be empty");
}

/// **VALUE**: Tests that `with_process()` gracefully handles non-existent PIDs.
///
/// **WHY THIS MATTERS**: The companion can exit between discovery and termination.
///
/// **BUG THIS CATCHES**: Prevents crashes when querying processes that died between
/// the process scan and the follow-up lookup.
#[test]
fn given_nonexistent_pid_when_with_process_called_then_returns_none() {
    let result = with_process(u32::MAX, |_| true);

    assert!(result.is_none(), "Should return None for non-existent process");
}

/// **VALUE**: The directory never signals init, itself, or a PID that does not exist.
///
/// **BUG THIS CATCHES**: Would catch a stale or zeroed handle turning `quit` into a
/// signal to PID 1 or to the host process.
#[test]
fn given_unsafe_or_missing_pid_when_terminating_then_refuses() {
    let directory = SystemProcessDirectory::default();

    for pid in [0, 1, std::process::id(), u32::MAX] {
        let handle = ProcessHandle {
            pid,
            name: "emporter".to_string(),
        };
        assert!(!directory.terminate(&handle), "PID {pid} must not be signalled");
    }
}

#[test]
fn given_identity_matching_nothing_when_finding_running_then_returns_none() {
    let directory = SystemProcessDirectory::default();
    let identity = AppIdentity::new(["no-such-companion-3f9a1c"]);

    assert!(directory.find_running(&identity).is_none());
}

#[test]
fn given_bundle_directory_when_checking_install_then_requires_executable() {
    // GIVEN: A bundle directory without, then with, its executable
    let dir = tempdir().unwrap();
    let directory = SystemProcessDirectory::new("companion");

    // WHEN/THEN: Installed only once the executable exists
    assert!(!directory.is_installed(dir.path()));
    fs::write(dir.path().join("companion"), b"#!/bin/sh\n").unwrap();
    assert!(directory.is_installed(dir.path()));
    assert!(!directory.is_installed(&dir.path().join("missing")));
}

/// **VALUE**: Version metadata is read from the bundle manifest.
///
/// **BUG THIS CATCHES**: Would catch the manifest being resolved relative to the
/// executable path instead of its directory.
#[test]
fn given_manifest_when_reading_bundle_metadata_then_parses_versions() {
    // GIVEN: A bundle with a version manifest
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("emporter"), b"").unwrap();
    fs::write(
        dir.path().join("version.toml"),
        "short_version = \"0.4.1\"\nbuild_number = \"412\"\napi_version = \"1.2.0\"\n",
    )
    .unwrap();
    let directory = SystemProcessDirectory::default();

    // WHEN: Reading metadata through the directory and through the executable
    let from_dir = directory.bundle_metadata(dir.path()).unwrap();
    let from_exe = directory
        .bundle_metadata(&dir.path().join("emporter"))
        .unwrap();

    // THEN: Both resolve the same manifest
    assert_eq!(from_dir.short_version, "0.4.1");
    assert_eq!(from_dir.build_number, "412");
    assert_eq!(from_dir.api_version, "1.2.0");
    assert_eq!(from_dir, from_exe);
}

#[test]
fn given_malformed_manifest_when_reading_bundle_metadata_then_returns_none() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("version.toml"), "short_version = [").unwrap();

    let metadata = SystemProcessDirectory::default().bundle_metadata(dir.path());

    assert!(metadata.is_none());
}
