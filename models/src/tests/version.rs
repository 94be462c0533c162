use crate::{ApiVersion, AppVersion, ModelError};

#[test]
fn given_partial_api_version_when_parsed_then_missing_components_are_zero() {
    let version: ApiVersion = "2.1".parse().expect("valid version");

    assert_eq!(
        version,
        ApiVersion {
            major: 2,
            minor: 1,
            patch: 0
        }
    );
    assert_eq!(version.to_string(), "2.1.0");
}

#[test]
fn given_app_version_and_build_when_parsed_then_formats_with_build() {
    let version = AppVersion::parse("1.4.2", "318").expect("valid version");

    assert_eq!(version.build_number, 318);
    assert_eq!(version.to_string(), "1.4.2 (318)");
}

/// **BUG THIS CATCHES**: Would catch a parser that accepts "1.2.3.4" by silently
/// dropping the extra component, misreporting the installed version.
#[test]
fn given_malformed_versions_when_parsed_then_parse_error() {
    for input in ["", "  ", "1.x", "1.2.3.4", "1..2", "-1"] {
        let result = input.parse::<ApiVersion>();
        assert!(
            matches!(result, Err(ModelError::Parse { .. })),
            "Should reject {input:?}"
        );
    }

    assert!(AppVersion::parse("1.0.0", "build").is_err());
}
