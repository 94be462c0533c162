//! Tunnel records as the companion reports them.

use crate::error::registry::RegistryError;
use crate::error::transport::TransportError;

use models::{
    Tunnel, TunnelBuilder, TunnelField, TunnelKind, TunnelProperties, TunnelSource,
    TunnelState, TunnelUpdate,
};

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

/// Tunnel property holding the full record.
pub(crate) const PROPERTIES_PROPERTY: &str = "properties";
const ID_KEY: &str = "id";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TunnelRecord {
    id: String,
    kind: TunnelKind,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_temporary: bool,
    #[serde(default)]
    is_enabled: bool,
    #[serde(default)]
    is_auth_enabled: bool,
    remote_url: Option<String>,
    #[serde(default = "default_state")]
    state: TunnelState,
    conflict_reason: Option<String>,
    proxy_port: Option<u16>,
    #[serde(default)]
    should_rewrite_host_header: bool,
    proxy_host_header: Option<String>,
    directory: Option<String>,
    directory_index_file: Option<String>,
    #[serde(default)]
    is_browsing_enabled: bool,
    #[serde(default)]
    is_live_reload_enabled: bool,
}

fn default_state() -> TunnelState {
    TunnelState::Disconnected
}

/// Directories arrive either as plain paths or as `file://` URLs.
fn directory_path(raw: &str) -> PathBuf {
    Url::parse(raw)
        .ok()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(raw))
}

#[track_caller]
pub(crate) fn decode_tunnel(value: Value) -> Result<Tunnel, RegistryError> {
    let record: TunnelRecord = serde_json::from_value(value).map_err(TransportError::from)?;

    let source = match record.kind {
        TunnelKind::Proxy => TunnelSource::Proxy {
            port: record.proxy_port.ok_or_else(|| {
                TransportError::protocol(format!("Proxy tunnel {} has no port", record.id))
            })?,
            should_rewrite_host_header: record.should_rewrite_host_header,
            proxy_host_header: record.proxy_host_header,
        },
        TunnelKind::Directory => TunnelSource::Directory {
            directory: record.directory.as_deref().map(directory_path).ok_or_else(|| {
                TransportError::protocol(format!("Directory tunnel {} has no directory", record.id))
            })?,
            index_file: record.directory_index_file,
            is_browsing_enabled: record.is_browsing_enabled,
            is_live_reload_enabled: record.is_live_reload_enabled,
        },
    };

    let tunnel = TunnelBuilder::default()
        .with_id(record.id)
        .with_name(record.name)
        .with_temporary(record.is_temporary)
        .with_enabled(record.is_enabled)
        .with_auth_enabled(record.is_auth_enabled)
        .with_remote_url(record.remote_url)
        .with_state(record.state)
        .with_conflict_reason(record.conflict_reason)
        .with_source(source)
        .build()
        .map_err(|e| TransportError::protocol(format!("Malformed tunnel record: {e}")))?;

    Ok(tunnel)
}

/// A tunnel identifier returned by a create or configure operation: either a
/// bare string or an object carrying `id`. `None` when the result is null.
#[track_caller]
pub(crate) fn decode_id(value: Value) -> Result<Option<String>, TransportError> {
    match value {
        Value::Null => Ok(None),
        Value::String(id) if !id.is_empty() => Ok(Some(id)),
        Value::Object(mut map) => match map.remove(ID_KEY) {
            Some(Value::String(id)) if !id.is_empty() => Ok(Some(id)),
            _ => Err(TransportError::protocol("Tunnel reference has no id")),
        },
        other => Err(TransportError::protocol(format!(
            "Unexpected tunnel reference: {other}"
        ))),
    }
}

pub(crate) fn properties_to_remote(properties: &TunnelProperties) -> Map<String, Value> {
    let mut map = Map::new();
    let mut put = |field: TunnelField, value: Value| {
        map.insert(field.key().to_string(), value);
    };

    if let Some(name) = &properties.name {
        put(TunnelField::Name, name.clone().into());
    }
    if let Some(enabled) = properties.is_enabled {
        put(TunnelField::IsEnabled, enabled.into());
    }
    if let Some(temporary) = properties.is_temporary {
        put(TunnelField::IsTemporary, temporary.into());
    }
    if let Some(port) = properties.proxy_port {
        put(TunnelField::ProxyPort, port.into());
    }
    if let Some(rewrite) = properties.should_rewrite_host_header {
        put(TunnelField::ShouldRewriteHostHeader, rewrite.into());
    }
    if let Some(host) = &properties.proxy_host_header {
        put(TunnelField::ProxyHostHeader, host.clone().into());
    }
    if let Some(file) = &properties.directory_index_file {
        put(TunnelField::DirectoryIndexFile, file.clone().into());
    }
    if let Some(browsing) = properties.is_browsing_enabled {
        put(TunnelField::IsBrowsingEnabled, browsing.into());
    }
    if let Some(live_reload) = properties.is_live_reload_enabled {
        put(TunnelField::IsLiveReloadEnabled, live_reload.into());
    }

    map
}

pub(crate) fn update_value(update: &TunnelUpdate) -> Value {
    match update {
        TunnelUpdate::Name(name) => name.clone().into(),
        TunnelUpdate::Enabled(enabled) => (*enabled).into(),
        TunnelUpdate::ProxyPort(port) => (*port).into(),
        TunnelUpdate::RewriteHostHeader(rewrite) => (*rewrite).into(),
        TunnelUpdate::ProxyHostHeader(host) => host.clone().map_or(Value::Null, Value::String),
        TunnelUpdate::Directory(path) => path.to_string_lossy().to_string().into(),
        TunnelUpdate::DirectoryIndexFile(file) => file.clone().map_or(Value::Null, Value::String),
        TunnelUpdate::BrowsingEnabled(browsing) => (*browsing).into(),
        TunnelUpdate::LiveReloadEnabled(live_reload) => (*live_reload).into(),
    }
}
