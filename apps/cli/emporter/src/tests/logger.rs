// Unit tests for logger initialization
// Tests focus on idempotence and error handling

use crate::logger::{initialize, level_for_verbosity};

use std::path::PathBuf;

use log::LevelFilter;
use tempfile::tempdir;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: Tests and embedding code may both initialize logging. A second
/// call must not crash the process.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed,
/// causing fern to fail when setting a global logger twice.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A valid temporary directory
    let temp_dir = tempdir().unwrap();

    // WHEN: Calling initialize twice
    let result1 = initialize(temp_dir.path(), LevelFilter::Warn);
    let result2 = initialize(temp_dir.path(), LevelFilter::Warn);

    // THEN: The second call is a no-op, whatever the first one did
    assert!(
        result2.is_ok(),
        "Second initialization should succeed (idempotent)"
    );
    let _ = result1;
}

/// **VALUE**: The first-call error path reports a file problem instead of panicking.
///
/// **BUG THIS CATCHES**: Would catch `fern::log_file()` being unwrapped.
///
/// Only meaningful when this test wins the race to initialize; otherwise the guard
/// returns Ok and there is nothing left to check.
#[test]
fn given_invalid_log_dir_when_initialize_called_then_never_panics() {
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    let result = initialize(&invalid_dir, LevelFilter::Warn);

    if let Err(err) = result {
        assert!(format!("{err:?}").contains("App"), "Should be AppError::App");
    }
}

#[test]
fn given_verbosity_flags_when_mapped_then_levels_increase() {
    assert_eq!(level_for_verbosity(0), LevelFilter::Warn);
    assert_eq!(level_for_verbosity(1), LevelFilter::Info);
    assert_eq!(level_for_verbosity(2), LevelFilter::Debug);
    assert_eq!(level_for_verbosity(7), LevelFilter::Trace);
}
