//! The client facade.

use crate::bridge::{EventSubscription, NotificationBridge};
use crate::config::ClientConfig;
use crate::consent::ConsentGate;
use crate::error::client::ClientError;
use crate::error::consent::ConsentError;
use crate::error::lifecycle::LifecycleError;
use crate::error::registry::RegistryError;
use crate::error::service::ServiceError;
use crate::lifecycle::ProcessLifecycleManager;
use crate::predicate::Predicate;
use crate::registry::{TunnelRegistryClient, TunnelStream};
use crate::service::{ServiceController, ServiceSnapshot};
use crate::session::Session;
use crate::transport::http::HttpScriptingChannel;
use crate::transport::process::SystemProcessDirectory;
use crate::transport::ws::WsNotificationBus;
use crate::transport::{NotificationBus, ProcessDirectory, ProcessHandle, RemoteScriptingChannel};

use common::{ErrorLocation, RedactedSecret};
use models::{
    Application, ConsentState, ServiceState, Tunnel, TunnelId, TunnelProperties, TunnelUpdate,
    Version,
};

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::runtime::Handle;

/// Assembles an [`EmporterClient`] from configuration and transports.
///
/// Transports that are not supplied explicitly are built from the config:
/// the local process table, HTTP scripting and WebSocket notifications.
#[derive(Default)]
pub struct EmporterClientBuilder {
    config: Option<ClientConfig>,
    directory: Option<Arc<dyn ProcessDirectory>>,
    channel: Option<Arc<dyn RemoteScriptingChannel>>,
    bus: Option<Arc<dyn NotificationBus>>,
}

impl EmporterClientBuilder {
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_process_directory(mut self, directory: Arc<dyn ProcessDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_channel(mut self, channel: Arc<dyn RemoteScriptingChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_notification_bus(mut self, bus: Arc<dyn NotificationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Must run inside a Tokio runtime. Attempts the broadcast subscription
    /// before returning; an unreachable bus is retried in the background.
    pub async fn build(self) -> Result<EmporterClient, ClientError> {
        let runtime = Handle::try_current().map_err(|e| ClientError::Runtime {
            message: format!("EmporterClient must be built inside a Tokio runtime: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        let directory = match self.directory {
            Some(directory) => directory,
            None => Arc::new(SystemProcessDirectory::default()),
        };
        let channel = match self.channel {
            Some(channel) => channel,
            None => Arc::new(HttpScriptingChannel::new(&config.transport.scripting_url)?),
        };
        let bus = match self.bus {
            Some(bus) => bus,
            None => Arc::new(WsNotificationBus::new(&config.transport.notification_url)?),
        };

        let lifecycle = Arc::new(ProcessLifecycleManager::new(
            directory,
            Arc::clone(&channel),
            config.companion.bundle_location.clone(),
            config.identity(),
            config.companion.launch_arguments.clone(),
            runtime.clone(),
        ));
        let consent = Arc::new(ConsentGate::new(Arc::clone(&channel), Arc::clone(&lifecycle)));
        let session = Arc::new(Session::new(
            Arc::clone(&lifecycle),
            Arc::clone(&consent),
            channel,
            config.companion.auto_launch,
            config.launch_timeout(),
        ));

        let snapshot = ServiceSnapshot::default();
        let registry = TunnelRegistryClient::new(Arc::clone(&session));
        let service = ServiceController::new(session, registry.clone(), snapshot.clone());

        let bridge = NotificationBridge::start(
            bus,
            Arc::clone(&consent),
            snapshot,
            config.transport.event_buffer,
        )
        .await;

        info!(
            "Emporter client ready (companion at {})",
            config.companion.bundle_location.display()
        );

        Ok(EmporterClient {
            config,
            lifecycle,
            consent,
            registry,
            service,
            bridge,
            runtime,
        })
    }
}

/// Entry point for controlling the companion.
///
/// Tunnel and service operations launch the companion when the config allows
/// it and require consent to already be granted; resolve consent with
/// [`resolve_consent`](Self::resolve_consent) first.
pub struct EmporterClient {
    config: ClientConfig,
    lifecycle: Arc<ProcessLifecycleManager>,
    consent: Arc<ConsentGate>,
    registry: TunnelRegistryClient,
    service: ServiceController,
    bridge: NotificationBridge,
    runtime: Handle,
}

impl EmporterClient {
    pub fn builder() -> EmporterClientBuilder {
        EmporterClientBuilder::default()
    }

    /// Client with the default transports for `config`.
    pub async fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        Self::builder().with_config(config).build().await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &ProcessLifecycleManager {
        &self.lifecycle
    }

    pub fn consent(&self) -> &ConsentGate {
        &self.consent
    }

    pub fn registry(&self) -> &TunnelRegistryClient {
        &self.registry
    }

    pub fn service(&self) -> &ServiceController {
        &self.service
    }

    // ============================================
    // APPLICATION
    // ============================================

    pub fn application(&self) -> Application {
        self.lifecycle.application()
    }

    pub fn is_installed(&self) -> bool {
        self.lifecycle.is_installed()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn version(&self) -> Option<Version> {
        self.lifecycle.version()
    }

    pub fn activate(&self) -> bool {
        self.lifecycle.activate()
    }

    pub async fn launch_in_background(
        &self,
        timeout: Option<Duration>,
    ) -> Result<ProcessHandle, LifecycleError> {
        let timeout = timeout.unwrap_or_else(|| self.config.launch_timeout());
        self.lifecycle.launch_in_background(timeout).await
    }

    /// Must not be called from within an async context.
    pub fn launch_in_background_blocking(
        &self,
        timeout: Option<Duration>,
    ) -> Result<ProcessHandle, LifecycleError> {
        let timeout = timeout.unwrap_or_else(|| self.config.launch_timeout());
        self.lifecycle.launch_in_background_blocking(timeout)
    }

    pub fn quit(&self) -> bool {
        self.lifecycle.quit()
    }

    // ============================================
    // CONSENT
    // ============================================

    pub async fn resolve_consent(&self, allow_prompt: bool) -> Result<ConsentState, ConsentError> {
        self.consent.resolve(allow_prompt).await
    }

    /// Must not be called from within an async context.
    pub fn resolve_consent_blocking(&self, allow_prompt: bool) -> Result<ConsentState, ConsentError> {
        self.runtime.block_on(self.consent.resolve(allow_prompt))
    }

    // ============================================
    // TUNNELS
    // ============================================

    pub async fn tunnels(&self, predicate: Option<&Predicate>) -> Result<TunnelStream, RegistryError> {
        self.registry.list(predicate).await
    }

    pub async fn list_tunnels(
        &self,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Tunnel>, RegistryError> {
        self.registry.list_all(predicate).await
    }

    pub async fn tunnel(&self, id: &TunnelId) -> Result<Option<Tunnel>, RegistryError> {
        self.registry.find(id).await
    }

    pub async fn tunnel_for_source(&self, source: &str) -> Result<Option<Tunnel>, RegistryError> {
        self.registry.find_for_source(source).await
    }

    pub async fn create_tunnel(
        &self,
        source: &str,
        properties: TunnelProperties,
    ) -> Result<Tunnel, RegistryError> {
        self.registry.create(source, properties).await
    }

    pub async fn configure_tunnel(&self, source: &str) -> Result<Option<Tunnel>, RegistryError> {
        self.registry.configure_or_prompt(source).await
    }

    pub async fn edit_tunnel(&self, tunnel: &Tunnel) -> Result<(), RegistryError> {
        self.registry.edit(tunnel).await
    }

    pub async fn delete_tunnel(&self, tunnel: &Tunnel) -> Result<(), RegistryError> {
        self.registry.delete(tunnel).await
    }

    pub async fn update_tunnel(
        &self,
        tunnel: &Tunnel,
        update: TunnelUpdate,
    ) -> Result<(), RegistryError> {
        self.registry.update(tunnel, update).await
    }

    pub async fn set_tunnel_enabled(&self, tunnel: &Tunnel, enabled: bool) -> Result<(), RegistryError> {
        self.registry.set_enabled(tunnel, enabled).await
    }

    pub async fn password_protect(
        &self,
        tunnel: &Tunnel,
        username: &str,
        password: &RedactedSecret,
    ) -> Result<bool, RegistryError> {
        self.registry
            .set_password_protection(tunnel, username, password)
            .await
    }

    // ============================================
    // SERVICE
    // ============================================

    pub async fn service_state(&self) -> Result<ServiceState, ServiceError> {
        self.service.state().await
    }

    pub fn service_snapshot(&self) -> ServiceState {
        self.service.snapshot()
    }

    pub async fn resume_service(&self) -> Result<(), ServiceError> {
        self.service.resume().await
    }

    pub async fn suspend_service(&self) -> Result<(), ServiceError> {
        self.service.suspend().await
    }

    // ============================================
    // EVENTS
    // ============================================

    pub fn subscribe(&self) -> EventSubscription {
        debug!("New event subscriber");
        self.bridge.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.bridge.is_listening()
    }
}
