use crate::error::predicate::PredicateError;
use crate::predicate::{Predicate, PredicateCompiler, SourceUrl};

use models::TunnelKind;

use std::path::PathBuf;

use serde_json::{Map, Value, json};

fn record(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected object, got {other}"),
    }
}

/// **VALUE**: Loopback aliases compile to the same predicate.
///
/// **WHY THIS MATTERS**: Users type `localhost`, `127.0.0.1` or paste a deep link to the
/// same dev server. Treating them as different sources would create duplicate tunnels.
///
/// **BUG THIS CATCHES**: Would catch host-sensitive matching for loopback sources, or a
/// path component leaking into the predicate.
#[test]
fn given_loopback_aliases_when_compiling_by_source_then_predicates_are_identical() {
    // GIVEN: Three spellings of the same local server
    let sources = [
        "http://localhost:9000",
        "http://127.0.0.1:9000/anything",
        "localhost:9000",
    ];

    // WHEN: Compiling each
    let predicates: Vec<Predicate> = sources
        .iter()
        .map(|s| PredicateCompiler::by_source_url(s).unwrap())
        .collect();

    // THEN: All three are the same predicate
    assert_eq!(predicates[0], predicates[1]);
    assert_eq!(predicates[1], predicates[2]);
}

#[test]
fn given_ipv6_loopback_when_parsing_source_then_normalizes_to_localhost() {
    let source = SourceUrl::parse("http://[::1]:3000/").unwrap();

    assert_eq!(
        source,
        SourceUrl::Http {
            host: "localhost".to_string(),
            port: 3000,
            loopback: true,
        }
    );
}

/// **VALUE**: Scheme default ports are applied.
///
/// **BUG THIS CATCHES**: Would catch `Url::port()` being used instead of
/// `port_or_known_default()`, which makes `http://example.test` fail to parse.
#[test]
fn given_url_without_port_when_parsing_source_then_uses_scheme_default() {
    let http = SourceUrl::parse("http://Example.test").unwrap();
    let https = SourceUrl::parse("https://example.test/path").unwrap();

    assert_eq!(
        http,
        SourceUrl::Http {
            host: "example.test".to_string(),
            port: 80,
            loopback: false,
        }
    );
    assert!(matches!(https, SourceUrl::Http { port: 443, .. }));
}

#[test]
fn given_non_loopback_host_when_compiling_then_matches_host_header_ignoring_case() {
    // GIVEN: A predicate for a named virtual host
    let predicate = PredicateCompiler::by_source_url("http://app.test:8080").unwrap();

    // WHEN: Evaluating against records with different header casing and hosts
    let matching = record(json!({
        "kind": "proxy", "proxyPort": 8080, "proxyHostHeader": "APP.test"
    }));
    let other_host = record(json!({
        "kind": "proxy", "proxyPort": 8080, "proxyHostHeader": "other.test"
    }));
    let no_header = record(json!({ "kind": "proxy", "proxyPort": 8080 }));

    // THEN: Only the matching host header is selected
    assert!(predicate.evaluate(&matching));
    assert!(!predicate.evaluate(&other_host));
    assert!(!predicate.evaluate(&no_header));
}

/// **VALUE**: A port query finds both proxies to that port and directory servers on it.
///
/// **BUG THIS CATCHES**: Would catch the directory branch being dropped, or the port
/// comparison leaking across kinds (a directory tunnel matching on `proxyPort`).
#[test]
fn given_port_when_compiling_by_port_then_matches_proxy_and_directory_tunnels() {
    // GIVEN: The port predicate for 4000
    let predicate = PredicateCompiler::by_port(4000);

    // WHEN/THEN: Proxy and directory tunnels on 4000 match, others do not
    assert!(predicate.evaluate(&record(json!({ "kind": "proxy", "proxyPort": 4000 }))));
    assert!(predicate.evaluate(&record(json!({ "kind": "directory", "serverPort": 4000 }))));
    assert!(!predicate.evaluate(&record(json!({ "kind": "proxy", "proxyPort": 4001 }))));
    assert!(!predicate.evaluate(&record(json!({ "kind": "directory", "proxyPort": 4000 }))));
}

#[test]
fn given_directory_sources_when_parsing_then_yields_directory_kind() {
    let from_path = SourceUrl::parse("/srv/site").unwrap();
    let from_file_url = SourceUrl::parse("file:///srv/site").unwrap();

    assert_eq!(from_path, SourceUrl::Directory(PathBuf::from("/srv/site")));
    assert_eq!(from_path, from_file_url);
    assert_eq!(from_path.kind(), TunnelKind::Directory);

    let predicate = PredicateCompiler::by_source(&from_path);
    assert!(predicate.evaluate(&record(json!({
        "kind": "directory", "directory": "/srv/site"
    }))));
}

/// **VALUE**: Every spelling of a directory finds the tunnel serving it.
///
/// **WHY THIS MATTERS**: Shell completion adds trailing slashes and the companion may record
/// directories as `file://` URLs. A miss makes `configure` create a duplicate tunnel.
///
/// **BUG THIS CATCHES**: Would catch directory sources being compared as raw strings.
#[test]
fn given_directory_spellings_when_matching_then_all_find_same_tunnel() {
    // GIVEN: The same directory written four ways
    let sources = ["/srv/site", "/srv/site/", "file:///srv/site", "file:///srv/site/"];

    for source in sources {
        // WHEN: Compiling a source predicate
        let parsed = SourceUrl::parse(source).unwrap();
        let predicate = PredicateCompiler::by_source(&parsed);

        // THEN: One normalized path, matching plain and URL-form records alike
        assert_eq!(parsed, SourceUrl::Directory(PathBuf::from("/srv/site")), "{source}");
        for stored in ["/srv/site", "/srv/site/", "file:///srv/site", "file:///srv/site/"] {
            assert!(
                predicate.evaluate(&record(json!({ "kind": "directory", "directory": stored }))),
                "{source} should match a record stored as {stored}"
            );
        }
        assert!(!predicate.evaluate(&record(json!({
            "kind": "directory", "directory": "/srv/site-old"
        }))));
    }
}

#[test]
fn given_root_directory_when_parsing_then_keeps_root() {
    let root = SourceUrl::parse("/").unwrap();

    assert_eq!(root, SourceUrl::Directory(PathBuf::from("/")));
    assert!(PredicateCompiler::by_source(&root).evaluate(&record(json!({
        "kind": "directory", "directory": "file:///"
    }))));
}

#[test]
fn given_relative_directory_when_parsing_then_resolves_to_absolute_path() {
    let source = SourceUrl::parse("./public").unwrap();

    match source {
        SourceUrl::Directory(path) => assert!(path.is_absolute()),
        other => panic!("Expected directory source, got {other:?}"),
    }
}

/// **VALUE**: Sources the companion cannot serve are rejected before any remote call.
///
/// **BUG THIS CATCHES**: Would catch unsupported schemes falling through as directories.
#[test]
fn given_unsupported_sources_when_parsing_then_returns_invalid_source() {
    for input in ["", "   ", "ftp://example.test/", "mailto:dev@example.test"] {
        let result = SourceUrl::parse(input);
        assert!(
            matches!(result, Err(PredicateError::InvalidSource { .. })),
            "Expected InvalidSource for {input:?}, got {result:?}"
        );
    }
}

#[test]
fn given_http_source_when_formatting_for_companion_then_uses_normalized_origin() {
    assert_eq!(
        SourceUrl::parse("127.0.0.1:5173/index.html").unwrap().to_remote(),
        "http://localhost:5173"
    );
    assert_eq!(
        SourceUrl::parse("http://[2001:db8::1]:8000").unwrap().to_remote(),
        "http://[2001:db8::1]:8000"
    );
}

#[test]
fn given_predicate_when_serialized_then_uses_tagged_wire_form() {
    let predicate = Predicate::all(vec![Predicate::equals("kind", "proxy")]);

    let wire = serde_json::to_value(&predicate).unwrap();

    assert_eq!(
        wire,
        json!({
            "op": "all",
            "predicates": [{ "op": "equals", "key": "kind", "value": "proxy" }]
        })
    );
}
