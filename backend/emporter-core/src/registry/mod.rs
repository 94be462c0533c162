//! Tunnel queries and mutations.
//!
//! Every operation goes through the session gate first: the companion is
//! launched on demand when configuration allows it, and consent must already
//! be granted. A companion-side authorization failure drops the cached
//! consent and surfaces as [`RegistryError::Unauthorized`].
//!
//! Tunnels can be removed by the user at any moment, so listings are
//! snapshots: tunnels that vanish between matching and fetching are skipped.

pub(crate) mod wire;

use crate::error::registry::RegistryError;
use crate::error::transport::{RemoteErrorCode, TransportError};
use crate::predicate::{Predicate, PredicateCompiler, SourceUrl};
use crate::registry::wire::{
    PROPERTIES_PROPERTY, decode_id, decode_tunnel, properties_to_remote, update_value,
};
use crate::session::Session;
use crate::transport::{RemoteScriptingChannel, TUNNELS_COLLECTION, Target};

use common::{ErrorLocation, RedactedSecret};
use models::{Tunnel, TunnelId, TunnelProperties, TunnelUpdate};

use std::panic::Location;
use std::sync::Arc;

use futures_util::future::ready;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use log::{debug, info};
use serde_json::Value;

pub const CREATE_TUNNEL_OPERATION: &str = "createTunnel";
pub const CONFIGURE_TUNNEL_OPERATION: &str = "configureTunnel";
pub const EDIT_OPERATION: &str = "edit";
pub const DELETE_OPERATION: &str = "delete";
pub const PASSWORD_PROTECT_OPERATION: &str = "passwordProtect";
const AUTH_ENABLED_PROPERTY: &str = "isAuthEnabled";

pub type TunnelStream = BoxStream<'static, Result<Tunnel, RegistryError>>;

#[derive(Clone)]
pub struct TunnelRegistryClient {
    session: Arc<Session>,
}

impl TunnelRegistryClient {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Tunnels matching `predicate` (all when `None`) in the companion's order.
    ///
    /// The id set is taken once; each tunnel is fetched as the stream is
    /// polled.
    pub async fn list(&self, predicate: Option<&Predicate>) -> Result<TunnelStream, RegistryError> {
        let channel = self.session.channel().await?;
        let refs = self
            .session
            .observe(channel.evaluate_predicate(TUNNELS_COLLECTION, predicate).await)?;

        debug!("Predicate matched {} tunnels", refs.len());

        let session = Arc::clone(&self.session);
        let tunnels = stream::iter(refs)
            .then(move |object| {
                let channel = Arc::clone(&channel);
                let session = Arc::clone(&session);
                async move { fetch(&session, channel.as_ref(), &TunnelId::new(object.id)).await }
            })
            .filter_map(|fetched| ready(fetched.transpose()));

        Ok(tunnels.boxed())
    }

    pub async fn list_all(&self, predicate: Option<&Predicate>) -> Result<Vec<Tunnel>, RegistryError> {
        self.list(predicate).await?.try_collect().await
    }

    pub async fn count(&self, predicate: Option<&Predicate>) -> Result<usize, RegistryError> {
        let channel = self.session.channel().await?;
        let refs = self
            .session
            .observe(channel.evaluate_predicate(TUNNELS_COLLECTION, predicate).await)?;
        Ok(refs.len())
    }

    pub async fn find(&self, id: &TunnelId) -> Result<Option<Tunnel>, RegistryError> {
        let channel = self.session.channel().await?;
        fetch(&self.session, channel.as_ref(), id).await
    }

    pub async fn find_first(&self, predicate: &Predicate) -> Result<Option<Tunnel>, RegistryError> {
        let channel = self.session.channel().await?;
        self.first_match(channel.as_ref(), predicate).await
    }

    /// The tunnel already serving `source`, if any.
    pub async fn find_for_source(&self, source: &str) -> Result<Option<Tunnel>, RegistryError> {
        let predicate = PredicateCompiler::by_source_url(source)?;
        self.find_first(&predicate).await
    }

    /// Create a tunnel for `source`. The kind follows from the source; any
    /// property that does not belong to that kind is rejected before the
    /// companion is contacted.
    pub async fn create(
        &self,
        source: &str,
        properties: TunnelProperties,
    ) -> Result<Tunnel, RegistryError> {
        let source = SourceUrl::parse(source)?;
        properties.validate_for(source.kind())?;

        let channel = self.session.channel().await?;
        let args = vec![
            Value::String(source.to_remote()),
            Value::Object(properties_to_remote(&properties)),
        ];
        let result = self.session.observe(
            channel
                .invoke(&Target::Application, CREATE_TUNNEL_OPERATION, args)
                .await,
        )?;

        let id = decode_id(result)?.ok_or_else(|| {
            TransportError::protocol(format!("Companion returned no tunnel for {source}"))
        })?;
        let id = TunnelId::new(id);

        info!("Created {} tunnel {id} for {source}", source.kind());

        fetch(&self.session, channel.as_ref(), &id)
            .await?
            .ok_or_else(|| RegistryError::NotFound {
                message: format!("Tunnel {id} vanished after creation"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Open the companion's editor for the tunnel serving `source`, or its
    /// interactive creation flow when there is none.
    ///
    /// Returns `None` when the user cancels the creation flow.
    pub async fn configure_or_prompt(&self, source: &str) -> Result<Option<Tunnel>, RegistryError> {
        let source = SourceUrl::parse(source)?;
        let channel = self.session.channel().await?;

        let predicate = PredicateCompiler::by_source(&source);
        if let Some(existing) = self.first_match(channel.as_ref(), &predicate).await? {
            debug!("Editing existing tunnel {} for {source}", existing.id);
            self.session.observe(
                channel
                    .invoke(&Target::tunnel(&existing.id), EDIT_OPERATION, Vec::new())
                    .await,
            )?;
            return Ok(Some(existing));
        }

        let result = self.session.observe(
            channel
                .invoke(
                    &Target::Application,
                    CONFIGURE_TUNNEL_OPERATION,
                    vec![Value::String(source.to_remote())],
                )
                .await,
        )?;

        match decode_id(result)? {
            Some(id) => fetch(&self.session, channel.as_ref(), &TunnelId::new(id)).await,
            None => {
                debug!("Tunnel configuration for {source} was cancelled");
                Ok(None)
            }
        }
    }

    /// Open the companion's editor for `tunnel`.
    pub async fn edit(&self, tunnel: &Tunnel) -> Result<(), RegistryError> {
        let channel = self.session.channel().await?;
        self.session.observe(
            channel
                .invoke(&Target::tunnel(&tunnel.id), EDIT_OPERATION, Vec::new())
                .await,
        )?;
        Ok(())
    }

    pub async fn delete(&self, tunnel: &Tunnel) -> Result<(), RegistryError> {
        let channel = self.session.channel().await?;
        self.session.observe(
            channel
                .invoke(&Target::tunnel(&tunnel.id), DELETE_OPERATION, Vec::new())
                .await,
        )?;

        info!("Deleted tunnel {}", tunnel.id);
        Ok(())
    }

    pub async fn set_enabled(&self, tunnel: &Tunnel, enabled: bool) -> Result<(), RegistryError> {
        self.update(tunnel, TunnelUpdate::Enabled(enabled)).await
    }

    /// Write a single property. Properties of the other kind are rejected
    /// locally.
    pub async fn update(&self, tunnel: &Tunnel, update: TunnelUpdate) -> Result<(), RegistryError> {
        update.validate_for(tunnel.kind())?;

        let channel = self.session.channel().await?;
        let field = update.field();
        self.session.observe(
            channel
                .write_property(&Target::tunnel(&tunnel.id), field.key(), update_value(&update))
                .await,
        )?;

        debug!("Updated {} on tunnel {}", field.key(), tunnel.id);
        Ok(())
    }

    /// Password-protect `tunnel`. Returns `false` without changing anything
    /// when it is already protected.
    pub async fn set_password_protection(
        &self,
        tunnel: &Tunnel,
        username: &str,
        password: &RedactedSecret,
    ) -> Result<bool, RegistryError> {
        if username.is_empty() || password.is_empty() {
            return Err(RegistryError::Validation {
                message: "Username and password must not be empty".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let channel = self.session.channel().await?;
        let target = Target::tunnel(&tunnel.id);

        let protected = self
            .session
            .observe(channel.read_property(&target, AUTH_ENABLED_PROPERTY).await)?;
        if protected.as_bool().unwrap_or(false) {
            debug!("Tunnel {} is already password protected", tunnel.id);
            return Ok(false);
        }

        let args = vec![
            Value::String(username.to_string()),
            Value::String(password.expose().to_string()),
        ];
        let result = self.session.observe(
            channel
                .invoke(&target, PASSWORD_PROTECT_OPERATION, args)
                .await,
        )?;

        Ok(result.as_bool().unwrap_or(true))
    }

    async fn first_match(
        &self,
        channel: &dyn RemoteScriptingChannel,
        predicate: &Predicate,
    ) -> Result<Option<Tunnel>, RegistryError> {
        let refs = self
            .session
            .observe(channel.evaluate_predicate(TUNNELS_COLLECTION, Some(predicate)).await)?;

        // The first match may disappear before it is fetched
        for object in refs {
            if let Some(tunnel) = fetch(&self.session, channel, &TunnelId::new(object.id)).await? {
                return Ok(Some(tunnel));
            }
        }

        Ok(None)
    }
}

/// `None` when the tunnel no longer exists.
async fn fetch(
    session: &Session,
    channel: &dyn RemoteScriptingChannel,
    id: &TunnelId,
) -> Result<Option<Tunnel>, RegistryError> {
    let result = session.observe(
        channel
            .read_property(&Target::tunnel(id), PROPERTIES_PROPERTY)
            .await,
    );

    match result {
        Ok(value) => decode_tunnel(value).map(Some),
        Err(e) if e.remote_code() == Some(RemoteErrorCode::NotFound) => {
            debug!("Tunnel {id} disappeared before it could be read");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
