//! Tunnel queries evaluated inside the companion.
//!
//! A [`Predicate`] is a small expression tree over a tunnel's remote
//! properties. [`PredicateCompiler`] builds the ones the client needs from a
//! port or a source URL, unifying loopback aliases so that
//! `http://localhost:9000` and `http://127.0.0.1:9000/anything` select the
//! same tunnels.

use crate::error::predicate::PredicateError;

use common::ErrorLocation;
use models::TunnelKind;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::panic::Location;
use std::path::{Path, PathBuf, absolute};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::{Host, Url};

pub(crate) const KIND_KEY: &str = "kind";
pub(crate) const PROXY_PORT_KEY: &str = "proxyPort";
pub(crate) const SERVER_PORT_KEY: &str = "serverPort";
pub(crate) const DIRECTORY_KEY: &str = "directory";
pub(crate) const PROXY_HOST_HEADER_KEY: &str = "proxyHostHeader";

/// Host every loopback alias is normalized to.
pub const LOOPBACK_HOST: &str = "localhost";
const FILE_SCHEME: &str = "file";
const HOST_PORT_PATTERN: &str = r"^(?P<host>\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9.-]+):(?P<port>\d{1,5})(?:/.*)?$";

static HOST_PORT_REGEX: OnceLock<Regex> = OnceLock::new();

fn host_port_regex() -> &'static Regex {
    HOST_PORT_REGEX.get_or_init(|| Regex::new(HOST_PORT_PATTERN).expect("valid regex pattern"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Predicate {
    Equals { key: String, value: Value },
    EqualsIgnoringCase { key: String, value: String },
    All { predicates: Vec<Predicate> },
    Any { predicates: Vec<Predicate> },
}

impl Predicate {
    pub fn equals(key: &str, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn equals_ignoring_case(key: &str, value: impl Into<String>) -> Self {
        Predicate::EqualsIgnoringCase {
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn all(predicates: Vec<Predicate>) -> Self {
        Predicate::All { predicates }
    }

    pub fn any(predicates: Vec<Predicate>) -> Self {
        Predicate::Any { predicates }
    }

    /// Evaluate against a tunnel's remote property map.
    ///
    /// Missing keys never match.
    pub fn evaluate(&self, record: &Map<String, Value>) -> bool {
        match self {
            Predicate::Equals { key, value } => record.get(key) == Some(value),
            Predicate::EqualsIgnoringCase { key, value } => record
                .get(key)
                .and_then(Value::as_str)
                .is_some_and(|actual| actual.eq_ignore_ascii_case(value)),
            Predicate::All { predicates } => predicates.iter().all(|p| p.evaluate(record)),
            Predicate::Any { predicates } => predicates.iter().any(|p| p.evaluate(record)),
        }
    }
}

/// A tunnel source, parsed and normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceUrl {
    Directory(PathBuf),
    Http {
        host: String,
        port: u16,
        loopback: bool,
    },
}

impl SourceUrl {
    #[track_caller]
    pub fn parse(input: &str) -> Result<Self, PredicateError> {
        let location = ErrorLocation::from(Location::caller());
        let input = input.trim();

        if input.is_empty() {
            return Err(PredicateError::InvalidSource {
                message: "Source URL is empty".to_string(),
                location,
            });
        }

        if input.starts_with('/') || input.starts_with('.') {
            return directory(input, location);
        }

        if host_port_regex().is_match(input) {
            return http(&format!("http://{input}"), location);
        }

        match Url::parse(input) {
            Ok(url) if url.scheme() == FILE_SCHEME => {
                let path = url.to_file_path().map_err(|_| PredicateError::InvalidSource {
                    message: format!("'{input}' is not a local file URL"),
                    location,
                })?;
                Ok(SourceUrl::Directory(without_trailing_separator(&path)))
            }
            Ok(url) if matches!(url.scheme(), "http" | "https") => http(input, location),
            Ok(url) => Err(PredicateError::InvalidSource {
                message: format!("Unsupported scheme '{}' in '{input}'", url.scheme()),
                location,
            }),
            Err(url::ParseError::RelativeUrlWithoutBase) => directory(input, location),
            Err(e) => Err(PredicateError::InvalidSource {
                message: format!("'{input}' is not a valid source: {e}"),
                location,
            }),
        }
    }

    pub fn kind(&self) -> TunnelKind {
        match self {
            SourceUrl::Directory(_) => TunnelKind::Directory,
            SourceUrl::Http { .. } => TunnelKind::Proxy,
        }
    }

    /// Form handed to the companion when creating or configuring a tunnel.
    pub fn to_remote(&self) -> String {
        self.to_string()
    }
}

impl Display for SourceUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            SourceUrl::Directory(path) => write!(f, "{}", path.display()),
            SourceUrl::Http { host, port, .. } if host.contains(':') => {
                write!(f, "http://[{host}]:{port}")
            }
            SourceUrl::Http { host, port, .. } => write!(f, "http://{host}:{port}"),
        }
    }
}

impl FromStr for SourceUrl {
    type Err = PredicateError;

    #[track_caller]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceUrl::parse(s)
    }
}

/// `/srv/site/` and `/srv/site` name the same directory; the root keeps its slash.
fn without_trailing_separator(path: &Path) -> PathBuf {
    path.components().collect()
}

/// Spellings a companion record may use for `path`: plain, with a trailing
/// slash, or as a `file://` URL with or without one.
fn directory_forms(path: &Path) -> Vec<String> {
    let plain = path.to_string_lossy().to_string();
    let mut forms = vec![plain.clone()];
    if !plain.ends_with('/') {
        forms.push(format!("{plain}/"));
    }

    for url in [Url::from_file_path(path), Url::from_directory_path(path)]
        .into_iter()
        .flatten()
    {
        let url = url.to_string();
        if !forms.contains(&url) {
            forms.push(url);
        }
    }

    forms
}

fn directory(input: &str, location: ErrorLocation) -> Result<SourceUrl, PredicateError> {
    absolute(input)
        .map(|path| SourceUrl::Directory(without_trailing_separator(&path)))
        .map_err(|e| PredicateError::InvalidSource {
            message: format!("Cannot resolve directory '{input}': {e}"),
            location,
        })
}

fn http(input: &str, location: ErrorLocation) -> Result<SourceUrl, PredicateError> {
    let url = Url::parse(input).map_err(|e| PredicateError::InvalidSource {
        message: format!("'{input}' is not a valid URL: {e}"),
        location,
    })?;

    let port = url
        .port_or_known_default()
        .ok_or_else(|| PredicateError::InvalidSource {
            message: format!("'{input}' has no port"),
            location,
        })?;

    let (host, loopback) = match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            let loopback = domain == LOOPBACK_HOST;
            (domain, loopback)
        }
        Some(Host::Ipv4(ip)) => (ip.to_string(), is_loopback_v4(ip)),
        Some(Host::Ipv6(ip)) => (ip.to_string(), is_loopback_v6(ip)),
        None => {
            return Err(PredicateError::InvalidSource {
                message: format!("'{input}' has no host"),
                location,
            });
        }
    };

    let host = if loopback {
        LOOPBACK_HOST.to_string()
    } else {
        host
    };

    Ok(SourceUrl::Http {
        host,
        port,
        loopback,
    })
}

fn is_loopback_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

fn is_loopback_v6(ip: Ipv6Addr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

/// Builds the predicates used to look tunnels up.
pub struct PredicateCompiler;

impl PredicateCompiler {
    /// Tunnels serving `port`: proxies forwarding to it, or directory tunnels
    /// whose local server listens on it.
    pub fn by_port(port: u16) -> Predicate {
        Predicate::any(vec![
            Predicate::all(vec![
                Predicate::equals(KIND_KEY, TunnelKind::Proxy.as_str()),
                Predicate::equals(PROXY_PORT_KEY, port),
            ]),
            Predicate::all(vec![
                Predicate::equals(KIND_KEY, TunnelKind::Directory.as_str()),
                Predicate::equals(SERVER_PORT_KEY, port),
            ]),
        ])
    }

    #[track_caller]
    pub fn by_source_url(source: &str) -> Result<Predicate, PredicateError> {
        Ok(Self::by_source(&SourceUrl::parse(source)?))
    }

    pub fn by_source(source: &SourceUrl) -> Predicate {
        match source {
            SourceUrl::Directory(path) => Predicate::all(vec![
                Predicate::equals(KIND_KEY, TunnelKind::Directory.as_str()),
                Predicate::any(
                    directory_forms(path)
                        .into_iter()
                        .map(|form| Predicate::equals(DIRECTORY_KEY, form))
                        .collect(),
                ),
            ]),
            SourceUrl::Http {
                port,
                loopback: true,
                ..
            } => Predicate::all(vec![
                Predicate::equals(KIND_KEY, TunnelKind::Proxy.as_str()),
                Predicate::equals(PROXY_PORT_KEY, *port),
            ]),
            SourceUrl::Http { host, port, .. } => Predicate::all(vec![
                Predicate::equals(KIND_KEY, TunnelKind::Proxy.as_str()),
                Predicate::equals(PROXY_PORT_KEY, *port),
                Predicate::equals_ignoring_case(PROXY_HOST_HEADER_KEY, host.clone()),
            ]),
        }
    }
}
