//! Tunnel configuration fields, creation properties and single-field updates.
//!
//! Each field belongs either to every tunnel or to exactly one [`TunnelKind`].
//! Using a field with the wrong kind is rejected before anything is sent to
//! the companion.

use crate::ErrorLocation;
use crate::error::model_error::ModelError;
use crate::tunnel::TunnelKind;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelField {
    Name,
    IsEnabled,
    IsTemporary,
    ProxyPort,
    ShouldRewriteHostHeader,
    ProxyHostHeader,
    Directory,
    DirectoryIndexFile,
    IsBrowsingEnabled,
    IsLiveReloadEnabled,
}

impl TunnelField {
    /// Property name used by the companion's scripting interface.
    pub fn key(&self) -> &'static str {
        match self {
            TunnelField::Name => "name",
            TunnelField::IsEnabled => "isEnabled",
            TunnelField::IsTemporary => "isTemporary",
            TunnelField::ProxyPort => "proxyPort",
            TunnelField::ShouldRewriteHostHeader => "shouldRewriteHostHeader",
            TunnelField::ProxyHostHeader => "proxyHostHeader",
            TunnelField::Directory => "directory",
            TunnelField::DirectoryIndexFile => "directoryIndexFile",
            TunnelField::IsBrowsingEnabled => "isBrowsingEnabled",
            TunnelField::IsLiveReloadEnabled => "isLiveReloadEnabled",
        }
    }

    /// The only kind this field applies to, or `None` for common fields.
    pub fn kind(&self) -> Option<TunnelKind> {
        match self {
            TunnelField::Name | TunnelField::IsEnabled | TunnelField::IsTemporary => None,
            TunnelField::ProxyPort
            | TunnelField::ShouldRewriteHostHeader
            | TunnelField::ProxyHostHeader => Some(TunnelKind::Proxy),
            TunnelField::Directory
            | TunnelField::DirectoryIndexFile
            | TunnelField::IsBrowsingEnabled
            | TunnelField::IsLiveReloadEnabled => Some(TunnelKind::Directory),
        }
    }

    pub fn is_legal_for(&self, kind: TunnelKind) -> bool {
        self.kind().is_none_or(|k| k == kind)
    }

    #[track_caller]
    pub fn check(&self, kind: TunnelKind) -> Result<(), ModelError> {
        if self.is_legal_for(kind) {
            Ok(())
        } else {
            Err(ModelError::InvalidProperty {
                field: *self,
                kind,
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }
}

impl Display for TunnelField {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.key())
    }
}

/// Configuration supplied when creating a tunnel.
///
/// The tunnel kind is inferred from the source URL; every field that is set
/// must be legal for that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelProperties {
    pub name: Option<String>,
    pub is_enabled: Option<bool>,
    pub is_temporary: Option<bool>,
    /// Overrides the port taken from the source URL.
    pub proxy_port: Option<u16>,
    pub should_rewrite_host_header: Option<bool>,
    pub proxy_host_header: Option<String>,
    pub directory_index_file: Option<String>,
    pub is_browsing_enabled: Option<bool>,
    pub is_live_reload_enabled: Option<bool>,
}

impl TunnelProperties {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = Some(enabled);
        self
    }

    pub fn with_temporary(mut self, temporary: bool) -> Self {
        self.is_temporary = Some(temporary);
        self
    }

    pub fn with_proxy_port(mut self, port: u16) -> Self {
        self.proxy_port = Some(port);
        self
    }

    pub fn with_rewrite_host_header(mut self, rewrite: bool) -> Self {
        self.should_rewrite_host_header = Some(rewrite);
        self
    }

    pub fn with_proxy_host_header(mut self, host: impl Into<String>) -> Self {
        self.proxy_host_header = Some(host.into());
        self
    }

    pub fn with_index_file(mut self, file: impl Into<String>) -> Self {
        self.directory_index_file = Some(file.into());
        self
    }

    pub fn with_browsing_enabled(mut self, enabled: bool) -> Self {
        self.is_browsing_enabled = Some(enabled);
        self
    }

    pub fn with_live_reload_enabled(mut self, enabled: bool) -> Self {
        self.is_live_reload_enabled = Some(enabled);
        self
    }

    /// Fields that have been set, in declaration order.
    pub fn fields(&self) -> Vec<TunnelField> {
        [
            (self.name.is_some(), TunnelField::Name),
            (self.is_enabled.is_some(), TunnelField::IsEnabled),
            (self.is_temporary.is_some(), TunnelField::IsTemporary),
            (self.proxy_port.is_some(), TunnelField::ProxyPort),
            (
                self.should_rewrite_host_header.is_some(),
                TunnelField::ShouldRewriteHostHeader,
            ),
            (self.proxy_host_header.is_some(), TunnelField::ProxyHostHeader),
            (
                self.directory_index_file.is_some(),
                TunnelField::DirectoryIndexFile,
            ),
            (self.is_browsing_enabled.is_some(), TunnelField::IsBrowsingEnabled),
            (
                self.is_live_reload_enabled.is_some(),
                TunnelField::IsLiveReloadEnabled,
            ),
        ]
        .into_iter()
        .filter_map(|(set, field)| set.then_some(field))
        .collect()
    }

    /// Reject the first field that does not belong to `kind`.
    #[track_caller]
    pub fn validate_for(&self, kind: TunnelKind) -> Result<(), ModelError> {
        for field in self.fields() {
            field.check(kind)?;
        }

        if self.proxy_port == Some(0) {
            return Err(ModelError::Validation {
                message: String::from("Proxy port must be non-zero"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }
}

/// A single property write against an existing tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelUpdate {
    Name(String),
    Enabled(bool),
    ProxyPort(u16),
    RewriteHostHeader(bool),
    ProxyHostHeader(Option<String>),
    Directory(PathBuf),
    DirectoryIndexFile(Option<String>),
    BrowsingEnabled(bool),
    LiveReloadEnabled(bool),
}

impl TunnelUpdate {
    pub fn field(&self) -> TunnelField {
        match self {
            TunnelUpdate::Name(_) => TunnelField::Name,
            TunnelUpdate::Enabled(_) => TunnelField::IsEnabled,
            TunnelUpdate::ProxyPort(_) => TunnelField::ProxyPort,
            TunnelUpdate::RewriteHostHeader(_) => TunnelField::ShouldRewriteHostHeader,
            TunnelUpdate::ProxyHostHeader(_) => TunnelField::ProxyHostHeader,
            TunnelUpdate::Directory(_) => TunnelField::Directory,
            TunnelUpdate::DirectoryIndexFile(_) => TunnelField::DirectoryIndexFile,
            TunnelUpdate::BrowsingEnabled(_) => TunnelField::IsBrowsingEnabled,
            TunnelUpdate::LiveReloadEnabled(_) => TunnelField::IsLiveReloadEnabled,
        }
    }

    #[track_caller]
    pub fn validate_for(&self, kind: TunnelKind) -> Result<(), ModelError> {
        self.field().check(kind)?;

        match self {
            TunnelUpdate::ProxyPort(0) => Err(ModelError::Validation {
                message: String::from("Proxy port must be non-zero"),
                location: ErrorLocation::from(Location::caller()),
            }),
            TunnelUpdate::Directory(path) if path.as_os_str().is_empty() => {
                Err(ModelError::Validation {
                    message: String::from("Directory cannot be empty"),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
            _ => Ok(()),
        }
    }
}
