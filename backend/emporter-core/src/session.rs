use crate::consent::ConsentGate;
use crate::error::session::SessionError;
use crate::error::transport::TransportError;
use crate::lifecycle::ProcessLifecycleManager;
use crate::transport::RemoteScriptingChannel;

use std::sync::Arc;
use std::time::Duration;

/// Gate in front of every remote tunnel or service operation: the companion
/// must be running (launched on demand when allowed) and consent granted.
pub(crate) struct Session {
    lifecycle: Arc<ProcessLifecycleManager>,
    consent: Arc<ConsentGate>,
    channel: Arc<dyn RemoteScriptingChannel>,
    auto_launch: bool,
    launch_timeout: Duration,
}

impl Session {
    pub(crate) fn new(
        lifecycle: Arc<ProcessLifecycleManager>,
        consent: Arc<ConsentGate>,
        channel: Arc<dyn RemoteScriptingChannel>,
        auto_launch: bool,
        launch_timeout: Duration,
    ) -> Self {
        Self {
            lifecycle,
            consent,
            channel,
            auto_launch,
            launch_timeout,
        }
    }

    pub(crate) async fn channel(&self) -> Result<Arc<dyn RemoteScriptingChannel>, SessionError> {
        self.lifecycle
            .ensure_running(self.auto_launch, self.launch_timeout)
            .await?;
        self.consent.require_granted().await?;

        Ok(Arc::clone(&self.channel))
    }

    /// Pass a remote result through, dropping cached consent when the
    /// companion refused it as unauthorized.
    pub(crate) fn observe<T>(&self, result: Result<T, TransportError>) -> Result<T, TransportError> {
        if let Err(TransportError::PermissionDenied { .. }) = &result {
            self.consent.revoke();
        }
        result
    }
}
