// Unit tests for error module
// Tests JSON error output and exit code mapping

use crate::error::AppError;

use emporter_core::error::{LifecycleError, RegistryError};

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Errors serialize for `--json` output.
///
/// **BUG THIS CATCHES**: Would catch a non-serializable field sneaking into `AppError`,
/// which would turn every JSON-mode failure into a plain-text one.
#[test]
fn given_app_error_when_serialized_then_contains_variant_and_message() {
    // GIVEN: An AppError
    let err = AppError::NotFound {
        message: String::from("No tunnel with id 't-9'"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Serializing to JSON
    let json = serde_json::to_string(&err).unwrap();

    // THEN: Variant and message are present
    assert!(json.contains("NotFound"), "JSON should contain variant name");
    assert!(json.contains("t-9"), "JSON should contain message");
}

/// **VALUE**: Scripts can branch on why a command failed.
///
/// **WHY THIS MATTERS**: "install the companion" and "grant permission" need different
/// follow-ups; a single exit status hides that.
#[test]
fn given_core_errors_when_mapped_then_exit_codes_distinguish_causes() {
    let not_installed = AppError::core(LifecycleError::NotInstalled {
        message: String::from("missing"),
        location: ErrorLocation::from(Location::caller()),
    });
    let duplicate = AppError::core(RegistryError::DuplicateSource {
        message: String::from("exists"),
        location: ErrorLocation::from(Location::caller()),
    });

    assert_eq!(not_installed.exit_code(), 3);
    assert_eq!(duplicate.exit_code(), 6);
    assert_eq!(AppError::not_found("gone").exit_code(), 2);
    assert_eq!(AppError::app("boom").exit_code(), 1);
}

#[test]
fn given_core_error_when_serialized_then_kind_is_omitted() {
    let err = AppError::core(LifecycleError::NotInstalled {
        message: String::from("missing"),
        location: ErrorLocation::from(Location::caller()),
    });

    let json = serde_json::to_string(&err).unwrap();

    assert!(json.contains("Core"));
    assert!(!json.contains("\"kind\""));
}
