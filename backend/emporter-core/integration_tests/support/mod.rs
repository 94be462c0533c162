//! In-memory stand-in for the companion process.
//!
//! Implements all three transport seams over one shared state so scenarios
//! can launch, consent, mutate tunnels and observe broadcasts without a real
//! companion.

use emporter_core::bridge::event::{
    PROCESS_LAUNCHED, PROCESS_TERMINATED, SERVICE_STATE_CHANGED, TUNNEL_ADDED,
    TUNNEL_CONFIGURATION_CHANGED, TUNNEL_REMOVED,
};
use emporter_core::error::{RemoteErrorCode, TransportError};
use emporter_core::transport::{
    AppIdentity, BundleMetadata, LaunchOptions, NotificationBus, ObjectRef, PermissionStatus,
    ProcessDirectory, ProcessHandle, RawEvent, RemoteScriptingChannel, RemoteValue,
    TUNNELS_COLLECTION, Target,
};
use emporter_core::{ClientConfig, EmporterClient, Predicate};

use std::io::Error as IoError;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{BoxStream, unfold};
use serde_json::{Map, Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Sender, channel};
use tokio::time::sleep;
use url::Url;

pub const FIRST_PID: u32 = 5000;

/// What the platform answers when asked for permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Silent probes report that a prompt is needed; a prompt yields `answer`.
    Undetermined { answer: bool },
}

#[derive(Debug)]
struct State {
    installed: bool,
    running: Option<u32>,
    next_pid: u32,
    ready_at: Option<Instant>,
    ready_delay: Duration,
    never_ready: bool,
    fail_launch: bool,
    launch_delay: Duration,
    permission: Permission,
    prompt_delay: Duration,
    silent_check_delay: Duration,
    tunnels: Vec<Map<String, Value>>,
    next_tunnel: u32,
    service: &'static str,
    configure_answer: bool,
}

pub struct FakeCompanion {
    state: Mutex<State>,
    events: Sender<RawEvent>,
    launches: AtomicUsize,
    prompts: AtomicUsize,
    prompt_requests: AtomicUsize,
    edits: AtomicUsize,
}

impl FakeCompanion {
    pub fn new() -> Arc<Self> {
        let (events, _) = channel(256);

        Arc::new(Self {
            state: Mutex::new(State {
                installed: true,
                running: None,
                next_pid: FIRST_PID,
                ready_at: None,
                ready_delay: Duration::from_millis(20),
                never_ready: false,
                fail_launch: false,
                launch_delay: Duration::from_millis(10),
                permission: Permission::Granted,
                prompt_delay: Duration::from_millis(20),
                silent_check_delay: Duration::ZERO,
                tunnels: Vec::new(),
                next_tunnel: 1,
                service: "suspended",
                configure_answer: true,
            }),
            events,
            launches: AtomicUsize::new(0),
            prompts: AtomicUsize::new(0),
            prompt_requests: AtomicUsize::new(0),
            edits: AtomicUsize::new(0),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // ---- scenario setup ----

    pub fn set_installed(&self, installed: bool) {
        self.state().installed = installed;
    }

    pub fn set_permission(&self, permission: Permission) {
        self.state().permission = permission;
    }

    /// How long a silent check of undetermined permission takes to answer.
    pub fn set_silent_check_delay(&self, delay: Duration) {
        self.state().silent_check_delay = delay;
    }

    pub fn set_ready_delay(&self, delay: Duration) {
        self.state().ready_delay = delay;
    }

    pub fn set_never_ready(&self) {
        self.state().never_ready = true;
    }

    /// How long spawning takes before the process exists.
    pub fn set_launch_delay(&self, delay: Duration) {
        self.state().launch_delay = delay;
    }

    pub fn set_fail_launch(&self) {
        self.state().fail_launch = true;
    }

    pub fn set_configure_answer(&self, accept: bool) {
        self.state().configure_answer = accept;
    }

    /// Mark the companion as already running and ready.
    pub fn start(&self) -> u32 {
        let mut state = self.state();
        let pid = state.next_pid;
        state.next_pid += 1;
        state.running = Some(pid);
        state.ready_at = Some(Instant::now());
        pid
    }

    /// The companion exits on its own.
    pub fn crash(&self) {
        let pid = self.state().running.take();
        if let Some(pid) = pid {
            self.emit(RawEvent::new(PROCESS_TERMINATED).with("pid", pid));
        }
    }

    pub fn insert_tunnel(&self, record: Value) -> String {
        let mut state = self.state();
        let Value::Object(mut record) = record else {
            panic!("tunnel record must be an object");
        };
        let id = format!("t-{}", state.next_tunnel);
        state.next_tunnel += 1;
        record.insert("id".to_string(), json!(id));
        state.tunnels.push(record);
        id
    }

    pub fn emit(&self, event: RawEvent) {
        let _ = self.events.send(event);
    }

    // ---- observations ----

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Permission requests that were allowed to prompt, whatever the answer.
    pub fn prompt_requests(&self) -> usize {
        self.prompt_requests.load(Ordering::SeqCst)
    }

    pub fn edits(&self) -> usize {
        self.edits.load(Ordering::SeqCst)
    }

    pub fn running_pid(&self) -> Option<u32> {
        self.state().running
    }

    pub fn tunnel_count(&self) -> usize {
        self.state().tunnels.len()
    }

    pub fn tunnel_record(&self, id: &str) -> Option<Map<String, Value>> {
        self.state()
            .tunnels
            .iter()
            .find(|t| t.get("id") == Some(&json!(id)))
            .cloned()
    }

    // ---- internals ----

    fn check_ready(&self) -> Result<(), TransportError> {
        let state = self.state();
        let ready = state.running.is_some()
            && !state.never_ready
            && state.ready_at.is_some_and(|at| Instant::now() >= at);

        if ready {
            Ok(())
        } else {
            Err(TransportError::unavailable("companion is not accepting commands"))
        }
    }

    fn check_authorized(&self) -> Result<(), TransportError> {
        self.check_ready()?;
        match self.state().permission {
            Permission::Granted => Ok(()),
            _ => Err(TransportError::permission_denied("not authorized")),
        }
    }

    fn tunnel_index(state: &State, id: &str) -> Result<usize, TransportError> {
        state
            .tunnels
            .iter()
            .position(|t| t.get("id") == Some(&json!(id)))
            .ok_or_else(|| TransportError::remote(RemoteErrorCode::NotFound, format!("no tunnel {id}")))
    }

    fn create(&self, source: &str, properties: Map<String, Value>) -> Result<String, TransportError> {
        let mut record = match Url::parse(source) {
            Ok(url) if url.scheme() == "http" => {
                let port = url.port_or_known_default().unwrap_or(80);
                let mut record = Map::new();
                record.insert("kind".to_string(), json!("proxy"));
                record.insert("proxyPort".to_string(), json!(port));
                if url.host_str() != Some("localhost") {
                    record.insert("proxyHostHeader".to_string(), json!(url.host_str()));
                }
                record
            }
            _ => {
                let mut record = Map::new();
                record.insert("kind".to_string(), json!("directory"));
                record.insert("directory".to_string(), json!(source));
                record.insert("serverPort".to_string(), json!(0));
                record
            }
        };

        let mut state = self.state();
        let duplicate = state.tunnels.iter().any(|t| {
            t.get("kind") == record.get("kind")
                && t.get("proxyPort") == record.get("proxyPort")
                && t.get("directory") == record.get("directory")
        });
        if duplicate {
            return Err(TransportError::remote(
                RemoteErrorCode::DuplicateSource,
                format!("{source} already has a tunnel"),
            ));
        }

        let id = format!("t-{}", state.next_tunnel);
        state.next_tunnel += 1;
        record.insert("id".to_string(), json!(id));
        record.insert("name".to_string(), json!(source));
        record.insert("isEnabled".to_string(), json!(true));
        record.insert("state".to_string(), json!("disconnected"));
        record.extend(properties);
        state.tunnels.push(record);
        drop(state);

        self.emit(RawEvent::new(TUNNEL_ADDED).with("tunnelId", id.clone()));
        Ok(id)
    }

    fn set_service(&self, service: &'static str) {
        let mut state = self.state();
        state.service = service;
        let tunnel_state = if service == "connected" { "connected" } else { "disconnected" };
        for tunnel in state.tunnels.iter_mut() {
            tunnel.insert("state".to_string(), json!(tunnel_state));
        }
        drop(state);

        self.emit(RawEvent::new(SERVICE_STATE_CHANGED).with("state", service));
    }
}

#[async_trait]
impl ProcessDirectory for FakeCompanion {
    fn is_installed(&self, _bundle_location: &Path) -> bool {
        self.state().installed
    }

    fn find_running(&self, _identity: &AppIdentity) -> Option<ProcessHandle> {
        self.state().running.map(|pid| ProcessHandle {
            pid,
            name: "emporter".to_string(),
        })
    }

    async fn launch(
        &self,
        _bundle_location: &Path,
        _args: &[String],
        options: LaunchOptions,
    ) -> Result<ProcessHandle, IoError> {
        assert!(!options.activate, "launches must happen in the background");
        self.launches.fetch_add(1, Ordering::SeqCst);

        // Widen the window in which concurrent callers could race
        let delay = self.state().launch_delay;
        sleep(delay).await;

        let pid = {
            let mut state = self.state();
            if state.fail_launch {
                return Err(IoError::other("executable is damaged"));
            }
            let pid = state.next_pid;
            state.next_pid += 1;
            state.running = Some(pid);
            state.ready_at = Some(Instant::now() + state.ready_delay);
            pid
        };

        self.emit(RawEvent::new(PROCESS_LAUNCHED).with("pid", pid));
        Ok(ProcessHandle {
            pid,
            name: "emporter".to_string(),
        })
    }

    fn activate(&self, handle: &ProcessHandle) -> bool {
        self.state().running == Some(handle.pid)
    }

    fn terminate(&self, handle: &ProcessHandle) -> bool {
        let mut state = self.state();
        if state.running != Some(handle.pid) {
            return false;
        }
        state.running = None;
        drop(state);

        self.emit(RawEvent::new(PROCESS_TERMINATED).with("pid", handle.pid));
        true
    }

    fn bundle_metadata(&self, _bundle_location: &Path) -> Option<BundleMetadata> {
        self.state().installed.then(|| BundleMetadata {
            short_version: "0.4.1".to_string(),
            build_number: "412".to_string(),
            api_version: "1.0.0".to_string(),
        })
    }
}

#[async_trait]
impl RemoteScriptingChannel for FakeCompanion {
    async fn invoke(
        &self,
        target: &Target,
        operation: &str,
        args: Vec<RemoteValue>,
    ) -> Result<RemoteValue, TransportError> {
        self.check_authorized()?;

        match (target, operation) {
            (Target::Application, "createTunnel") => {
                let source = args.first().and_then(Value::as_str).unwrap_or_default();
                let properties = match args.get(1) {
                    Some(Value::Object(map)) => map.clone(),
                    _ => Map::new(),
                };
                Ok(json!(self.create(source, properties)?))
            }
            (Target::Application, "configureTunnel") => {
                if !self.state().configure_answer {
                    return Ok(Value::Null);
                }
                let source = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(json!({ "id": self.create(source, Map::new())? }))
            }
            (Target::Application, "resumeService") => {
                if self.state().tunnels.is_empty() {
                    return Err(TransportError::remote(RemoteErrorCode::NoTunnels, "no tunnels"));
                }
                self.set_service("connected");
                Ok(Value::Null)
            }
            (Target::Application, "suspendService") => {
                self.set_service("suspended");
                Ok(Value::Null)
            }
            (Target::Object { id, .. }, "delete") => {
                let mut state = self.state();
                let index = Self::tunnel_index(&state, id)?;
                state.tunnels.remove(index);
                drop(state);
                self.emit(RawEvent::new(TUNNEL_REMOVED).with("tunnelId", id.clone()));
                Ok(Value::Null)
            }
            (Target::Object { id, .. }, "edit") => {
                Self::tunnel_index(&self.state(), id)?;
                self.edits.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
            (Target::Object { id, .. }, "passwordProtect") => {
                let mut state = self.state();
                let index = Self::tunnel_index(&state, id)?;
                let tunnel = &mut state.tunnels[index];
                tunnel.insert("isAuthEnabled".to_string(), json!(true));
                tunnel.insert("username".to_string(), args[0].clone());
                tunnel.insert("password".to_string(), args[1].clone());
                Ok(json!(true))
            }
            _ => Err(TransportError::remote(
                RemoteErrorCode::InvalidArgument,
                format!("unknown operation {operation}"),
            )),
        }
    }

    async fn read_property(
        &self,
        target: &Target,
        property: &str,
    ) -> Result<RemoteValue, TransportError> {
        if matches!(target, Target::Application) && property == "apiVersion" {
            self.check_ready()?;
            return Ok(json!("1.0.0"));
        }

        self.check_authorized()?;
        let state = self.state();

        match target {
            Target::Application => match property {
                "serviceState" => Ok(json!(state.service)),
                "conflictReason" | "nextReconnect" => Ok(Value::Null),
                _ => Err(TransportError::remote(RemoteErrorCode::InvalidArgument, property)),
            },
            Target::Object { id, .. } => {
                let record = &state.tunnels[Self::tunnel_index(&state, id)?];
                match property {
                    "properties" => Ok(Value::Object(record.clone())),
                    other => Ok(record.get(other).cloned().unwrap_or(Value::Null)),
                }
            }
        }
    }

    async fn write_property(
        &self,
        target: &Target,
        property: &str,
        value: RemoteValue,
    ) -> Result<(), TransportError> {
        self.check_authorized()?;

        let Target::Object { id, .. } = target else {
            return Err(TransportError::remote(RemoteErrorCode::InvalidArgument, property));
        };

        let mut state = self.state();
        let index = Self::tunnel_index(&state, id)?;
        state.tunnels[index].insert(property.to_string(), value);
        drop(state);

        self.emit(RawEvent::new(TUNNEL_CONFIGURATION_CHANGED).with("tunnelId", id.clone()));
        Ok(())
    }

    async fn evaluate_predicate(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<ObjectRef>, TransportError> {
        self.check_authorized()?;
        assert_eq!(collection, TUNNELS_COLLECTION);

        Ok(self
            .state()
            .tunnels
            .iter()
            .filter(|t| predicate.is_none_or(|p| p.evaluate(t)))
            .filter_map(|t| t.get("id").and_then(Value::as_str))
            .map(|id| ObjectRef {
                collection: TUNNELS_COLLECTION.to_string(),
                id: id.to_string(),
            })
            .collect())
    }

    async fn determine_permission(
        &self,
        allow_prompt: bool,
    ) -> Result<PermissionStatus, TransportError> {
        self.check_ready()?;
        if allow_prompt {
            self.prompt_requests.fetch_add(1, Ordering::SeqCst);
        }

        let (permission, delay, silent_check_delay) = {
            let state = self.state();
            (state.permission, state.prompt_delay, state.silent_check_delay)
        };

        match permission {
            Permission::Granted => Ok(PermissionStatus::Granted),
            Permission::Denied => Ok(PermissionStatus::Denied),
            Permission::Undetermined { .. } if !allow_prompt => {
                sleep(silent_check_delay).await;
                Ok(PermissionStatus::WouldRequireConsent)
            }
            Permission::Undetermined { answer } => {
                self.prompts.fetch_add(1, Ordering::SeqCst);
                sleep(delay).await;

                let decided = if answer { Permission::Granted } else { Permission::Denied };
                self.set_permission(decided);
                Ok(if answer {
                    PermissionStatus::Granted
                } else {
                    PermissionStatus::Denied
                })
            }
        }
    }
}

#[async_trait]
impl NotificationBus for FakeCompanion {
    async fn subscribe(
        &self,
        _kinds: &[&str],
    ) -> Result<BoxStream<'static, RawEvent>, TransportError> {
        let receiver = self.events.subscribe();

        let stream = unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }
}

pub fn test_config(auto_launch: bool) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.companion.auto_launch = auto_launch;
    config.companion.launch_timeout_secs = 2;
    config
}

pub async fn client_with(fake: &Arc<FakeCompanion>, config: ClientConfig) -> EmporterClient {
    EmporterClient::builder()
        .with_config(config)
        .with_process_directory(Arc::clone(fake) as Arc<dyn ProcessDirectory>)
        .with_channel(Arc::clone(fake) as Arc<dyn RemoteScriptingChannel>)
        .with_notification_bus(Arc::clone(fake) as Arc<dyn NotificationBus>)
        .build()
        .await
        .expect("client builds against the fake companion")
}

pub async fn client(fake: &Arc<FakeCompanion>) -> EmporterClient {
    client_with(fake, test_config(true)).await
}
