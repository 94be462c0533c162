use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation` points at the code that raised the error.
///
/// **WHY THIS MATTERS**: Every error in the client carries a location. If capture breaks,
/// a launch timeout and a consent denial become indistinguishable in the log.
///
/// **BUG THIS CATCHES**: Would catch if `#[track_caller]` is dropped from
/// `ErrorLocation::caller()` and every location collapses onto the helper itself.
#[test]
fn given_tracked_helper_when_capturing_location_then_points_at_call_site() {
    // GIVEN: A helper that captures its caller, the way error constructors do
    #[track_caller]
    fn raise() -> ErrorLocation {
        ErrorLocation::caller()
    }

    // WHEN: Capturing from two consecutive lines
    let first = raise();
    let second = raise();

    // THEN: Both point into this file, on consecutive lines
    assert!(first.file.ends_with("error_location.rs"));
    assert_eq!(first.file, second.file);
    assert_eq!(first.line + 1, second.line);
}

#[test]
fn given_error_location_when_formatted_then_produces_bracketed_triple() {
    let location = ErrorLocation::from(Location::caller());

    let formatted = format!("{location}");

    assert!(formatted.starts_with('[') && formatted.ends_with(']'));
    assert!(formatted.contains(&format!(":{}:", location.line)));
    assert_eq!(formatted.matches(':').count(), 2);
}

#[test]
fn given_same_location_when_compared_then_equal() {
    let location = ErrorLocation::caller();
    let copy = location;

    assert_eq!(location, copy);
}
