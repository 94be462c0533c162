use crate::RedactedSecret;

/// **VALUE**: Tunnel passwords must never appear in log output.
///
/// **BUG THIS CATCHES**: Would catch a derived `Debug` sneaking back in, which would
/// print the password wherever a tunnel update is debug-logged.
#[test]
fn given_secret_when_debug_and_display_formatted_then_value_is_hidden() {
    let secret = RedactedSecret::new("hunter2");

    let debug = format!("{secret:?}");
    let display = format!("{secret}");

    assert!(!debug.contains("hunter2"));
    assert!(!display.contains("hunter2"));
    assert_eq!(secret.expose(), "hunter2");
    assert_eq!(secret.len(), 7);
}

#[test]
fn given_secret_when_serialized_then_fails() {
    let secret = RedactedSecret::from("hunter2");

    let result = serde_json::to_string(&secret);

    assert!(result.is_err(), "Serializing a secret must fail");
}

#[test]
fn given_empty_secret_when_checked_then_is_empty() {
    assert!(RedactedSecret::new(String::new()).is_empty());
}
