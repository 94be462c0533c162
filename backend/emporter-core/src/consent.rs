//! Authorization to script the companion.
//!
//! The platform decides whether this host may control the companion and may
//! need to ask the user. [`ConsentGate`] probes silently first, prompts only
//! when asked to, and caches settled answers for the lifetime of the
//! companion process that gave them.

use crate::error::consent::ConsentError;
use crate::flight::SingleFlight;
use crate::lifecycle::ProcessLifecycleManager;
use crate::transport::{PermissionStatus, RemoteScriptingChannel};

use common::ErrorLocation;
use models::ConsentState;

use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use tokio::task::JoinError;

type ProbeOutcome = Result<ConsentState, ConsentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CachedConsent {
    pid: u32,
    state: ConsentState,
}

type ConsentCache = Arc<Mutex<Option<CachedConsent>>>;

fn lock(cache: &ConsentCache) -> MutexGuard<'_, Option<CachedConsent>> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ConsentGate {
    channel: Arc<dyn RemoteScriptingChannel>,
    lifecycle: Arc<ProcessLifecycleManager>,
    cache: ConsentCache,
    probes: SingleFlight<ProbeOutcome>,
    prompts: SingleFlight<ProbeOutcome>,
}

impl ConsentGate {
    pub fn new(
        channel: Arc<dyn RemoteScriptingChannel>,
        lifecycle: Arc<ProcessLifecycleManager>,
    ) -> Self {
        Self {
            channel,
            lifecycle,
            cache: Arc::new(Mutex::new(None)),
            probes: SingleFlight::new(),
            prompts: SingleFlight::new(),
        }
    }

    /// Current consent for the running companion.
    ///
    /// Returns [`ConsentState::Unknown`] without probing when the companion
    /// is not running. With `allow_prompt`, a silent `Required` escalates to
    /// one interactive prompt shared by every concurrent caller. A denial is
    /// never re-prompted for the same process instance.
    pub async fn resolve(&self, allow_prompt: bool) -> ProbeOutcome {
        let Some(process) = self.lifecycle.running_process() else {
            debug!("Consent unknown: companion is not running");
            return Ok(ConsentState::Unknown);
        };

        if let Some(state) = self.cached_for(process.pid) {
            return Ok(state);
        }

        let state = self.probe(process.pid, false).await?;
        if state != ConsentState::Required || !allow_prompt {
            return Ok(state);
        }

        // A prompt may have settled while the silent check was in flight
        if let Some(state) = self.cached_for(process.pid) {
            return Ok(state);
        }

        info!("Requesting consent to control the companion");
        self.probe(process.pid, true).await
    }

    /// Succeeds only when consent is granted, without prompting.
    pub async fn require_granted(&self) -> Result<(), ConsentError> {
        match self.resolve(false).await? {
            ConsentState::Granted => Ok(()),
            ConsentState::Denied => Err(ConsentError::Denied {
                message: "The user denied control of the companion".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            ConsentState::Required | ConsentState::Unknown => Err(ConsentError::Required {
                message: "Consent to control the companion has not been given".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Last settled answer, whichever process gave it.
    pub fn cached(&self) -> ConsentState {
        let cached = *lock(&self.cache);
        cached.map(|cached| cached.state).unwrap_or_default()
    }

    /// Forget the cached answer so the next call probes again.
    pub fn invalidate(&self) {
        *lock(&self.cache) = None;
    }

    /// The companion refused an operation as unauthorized.
    pub fn revoke(&self) {
        let mut cache = lock(&self.cache);
        if let Some(cached) = cache.take() {
            warn!(
                "Companion (PID: {}) refused an operation; discarding cached consent {:?}",
                cached.pid, cached.state
            );
        }
    }

    /// The companion instance `pid` is gone. `None` forgets any instance.
    pub fn forget_instance(&self, pid: Option<u32>) {
        let mut cache = lock(&self.cache);
        let stale = match (cache.as_ref(), pid) {
            (Some(cached), Some(pid)) => cached.pid == pid,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if stale {
            debug!("Forgetting consent for terminated companion instance");
            *cache = None;
        }
    }

    /// A companion instance `pid` started; answers from any other instance no
    /// longer apply. `None` forgets every instance.
    pub fn forget_other_instances(&self, pid: Option<u32>) {
        let mut cache = lock(&self.cache);
        let stale = match (cache.as_ref(), pid) {
            (Some(cached), Some(pid)) => cached.pid != pid,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if stale {
            debug!("Forgetting consent given by a previous companion instance");
            *cache = None;
        }
    }

    fn cached_for(&self, pid: u32) -> Option<ConsentState> {
        let cached = *lock(&self.cache);
        cached
            .filter(|cached| cached.pid == pid)
            .map(|cached| cached.state)
    }

    async fn probe(&self, pid: u32, prompt: bool) -> ProbeOutcome {
        let flights = if prompt { &self.prompts } else { &self.probes };
        let channel = Arc::clone(&self.channel);
        let cache = Arc::clone(&self.cache);

        flights
            .run(
                move || async move {
                    let settled = *lock(&cache);
                    if let Some(settled) = settled.filter(|cached| cached.pid == pid) {
                        return Ok(settled.state);
                    }

                    let status = channel.determine_permission(prompt).await?;
                    let state = match status {
                        PermissionStatus::Granted => ConsentState::Granted,
                        PermissionStatus::Denied => ConsentState::Denied,
                        PermissionStatus::WouldRequireConsent => ConsentState::Required,
                    };

                    if state.is_settled() {
                        debug!("Consent settled as {state:?} for PID {pid}");
                        *lock(&cache) = Some(CachedConsent { pid, state });
                    }

                    Ok(state)
                },
                probe_aborted,
            )
            .await
    }
}

fn probe_aborted(error: JoinError) -> ProbeOutcome {
    Err(ConsentError::Required {
        message: format!("Authorization probe aborted: {error}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
