use crate::cli::{CreateArgs, ListArgs, PASSWORD_ENV};
use crate::error::AppError;
use crate::output::Output;

use common::RedactedSecret;
use emporter_core::{EmporterClient, PredicateCompiler};
use models::{Tunnel, TunnelId, TunnelProperties};

use std::env;

use log::info;

/// Tunnel properties from `create` flags. Kind checks happen in the client.
pub fn properties_from(args: &CreateArgs) -> TunnelProperties {
    let mut properties = TunnelProperties::default();

    if let Some(name) = &args.name {
        properties = properties.with_name(name.clone());
    }
    if args.temporary {
        properties = properties.with_temporary(true);
    }
    if args.disabled {
        properties = properties.with_enabled(false);
    }
    if args.rewrite_host_header {
        properties = properties.with_rewrite_host_header(true);
    }
    if let Some(file) = &args.index_file {
        properties = properties.with_index_file(file.clone());
    }
    if args.browsing {
        properties = properties.with_browsing_enabled(true);
    }
    if args.live_reload {
        properties = properties.with_live_reload_enabled(true);
    }

    properties
}

async fn require_tunnel(client: &EmporterClient, id: &str) -> Result<Tunnel, AppError> {
    client
        .tunnel(&TunnelId::new(id))
        .await
        .map_err(AppError::core)?
        .ok_or_else(|| AppError::not_found(format!("No tunnel with id '{id}'")))
}

pub async fn list(client: &EmporterClient, args: ListArgs, output: Output) -> Result<(), AppError> {
    let predicate = match (args.port, &args.source) {
        (Some(port), _) => Some(PredicateCompiler::by_port(port)),
        (None, Some(source)) => {
            Some(PredicateCompiler::by_source_url(source).map_err(AppError::core)?)
        }
        (None, None) => None,
    };

    let tunnels = client
        .list_tunnels(predicate.as_ref())
        .await
        .map_err(AppError::core)?;

    output.tunnels(&tunnels)
}

pub async fn create(
    client: &EmporterClient,
    args: CreateArgs,
    output: Output,
) -> Result<(), AppError> {
    let properties = properties_from(&args);
    let tunnel = client
        .create_tunnel(&args.source, properties)
        .await
        .map_err(AppError::core)?;

    output.tunnel(&tunnel)
}

pub async fn configure(
    client: &EmporterClient,
    source: &str,
    output: Output,
) -> Result<(), AppError> {
    match client.configure_tunnel(source).await.map_err(AppError::core)? {
        Some(tunnel) => output.tunnel(&tunnel),
        None => output.done("Configuration cancelled"),
    }
}

pub async fn delete(client: &EmporterClient, id: &str, output: Output) -> Result<(), AppError> {
    let tunnel = require_tunnel(client, id).await?;
    client.delete_tunnel(&tunnel).await.map_err(AppError::core)?;
    output.done(&format!("Deleted tunnel {id}"))
}

pub async fn set_enabled(
    client: &EmporterClient,
    id: &str,
    enabled: bool,
    output: Output,
) -> Result<(), AppError> {
    let tunnel = require_tunnel(client, id).await?;
    client
        .set_tunnel_enabled(&tunnel, enabled)
        .await
        .map_err(AppError::core)?;

    let verb = if enabled { "Enabled" } else { "Disabled" };
    output.done(&format!("{verb} tunnel {id}"))
}

pub async fn protect(
    client: &EmporterClient,
    id: &str,
    username: &str,
    output: Output,
) -> Result<(), AppError> {
    let password = env::var(PASSWORD_ENV)
        .map(RedactedSecret::new)
        .map_err(|_| AppError::app(format!("Set {PASSWORD_ENV} to the tunnel password")))?;

    let tunnel = require_tunnel(client, id).await?;
    let applied = client
        .password_protect(&tunnel, username, &password)
        .await
        .map_err(AppError::core)?;

    if applied {
        info!("Password protection enabled for tunnel {id}");
        output.done(&format!("Tunnel {id} is now password protected"))
    } else {
        output.done(&format!("Tunnel {id} was already password protected; unchanged"))
    }
}
