// Unit tests for argument parsing and create-flag translation

use crate::cli::{Cli, Commands};
use crate::commands::tunnels::properties_from;

use models::TunnelKind;

use clap::{CommandFactory, Parser};

#[test]
fn given_cli_definition_when_debug_asserted_then_valid() {
    Cli::command().debug_assert();
}

#[test]
fn given_port_and_source_when_listing_then_rejected_as_conflicting() {
    let result = Cli::try_parse_from([
        "emporter",
        "list",
        "--port",
        "8080",
        "--source",
        "http://localhost:8080",
    ]);

    assert!(result.is_err());
}

#[test]
fn given_global_flags_after_subcommand_when_parsed_then_applied() {
    let cli = Cli::try_parse_from(["emporter", "consent", "--prompt", "--json", "-vv"]).unwrap();

    assert!(cli.json);
    assert_eq!(cli.verbose, 2);
    assert!(matches!(cli.command, Commands::Consent { prompt: true }));
}

/// **VALUE**: Create flags become exactly the properties the user asked for.
///
/// **BUG THIS CATCHES**: Would catch an unset flag being sent as an explicit `false`,
/// which for proxy tunnels would trip the directory-only property check.
#[test]
fn given_proxy_flags_when_translated_then_only_set_fields_present() {
    // GIVEN: A proxy create with a name and host rewriting
    let cli = Cli::try_parse_from([
        "emporter",
        "create",
        "http://localhost:8080",
        "--name",
        "api",
        "--rewrite-host-header",
    ])
    .unwrap();
    let Commands::Create(args) = cli.command else {
        panic!("expected create");
    };

    // WHEN: Translating to properties
    let properties = properties_from(&args);

    // THEN: Legal for proxies, and nothing directory-specific leaked in
    assert_eq!(properties.name.as_deref(), Some("api"));
    assert_eq!(properties.should_rewrite_host_header, Some(true));
    assert_eq!(properties.is_browsing_enabled, None);
    assert_eq!(properties.is_live_reload_enabled, None);
    assert!(properties.validate_for(TunnelKind::Proxy).is_ok());
}

#[test]
fn given_directory_flags_on_proxy_source_when_validated_then_rejected() {
    let cli = Cli::try_parse_from([
        "emporter",
        "create",
        "http://localhost:8080",
        "--live-reload",
    ])
    .unwrap();
    let Commands::Create(args) = cli.command else {
        panic!("expected create");
    };

    let properties = properties_from(&args);

    assert!(properties.validate_for(TunnelKind::Proxy).is_err());
    assert!(properties.validate_for(TunnelKind::Directory).is_ok());
}
