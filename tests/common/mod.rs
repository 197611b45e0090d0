#![allow(dead_code)]

use async_trait::async_trait;
use gameserver_supervisor::config::{ProtocolConfig, SupervisorConfig};
use gameserver_supervisor::error::{BackendError, ProtocolError};
use gameserver_supervisor::notify::{LifecycleEvent, Notification, NotificationSink};
use gameserver_supervisor::server::ProcessBackend;
use gameserver_supervisor::transport::{Connector, ProtocolClient, ProtocolEndpoint};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What one connect attempt does
#[derive(Debug, Clone)]
pub enum ConnectStep {
    Accept,
    Refuse(ProtocolError),
    Hang,
}

/// What one command exchange does
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(ProtocolError),
    Hang,
}

pub fn players(count: u32) -> Reply {
    Reply::Text(format!(
        "There are {} of a max of 20 players online: ",
        count
    ))
}

#[derive(Default)]
struct Script {
    connects: VecDeque<ConnectStep>,
    replies: VecDeque<Reply>,
    fallback: Option<Reply>,
    connect_attempts: usize,
    disconnects: usize,
    commands: Vec<String>,
}

/// Connector whose connections follow a script.
///
/// Connect attempts accept unless scripted otherwise. Replies are consumed
/// in order across all connections; once the queue is empty the fallback
/// reply is used, or the exchange fails.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(reply: Reply) -> Self {
        let connector = Self::new();
        connector.script.lock().unwrap().fallback = Some(reply);
        connector
    }

    pub fn push_connect(&self, step: ConnectStep) {
        self.script.lock().unwrap().connects.push_back(step);
    }

    pub fn push_reply(&self, reply: Reply) {
        self.script.lock().unwrap().replies.push_back(reply);
    }

    pub fn set_fallback(&self, reply: Reply) {
        self.script.lock().unwrap().fallback = Some(reply);
    }

    pub fn connect_attempts(&self) -> usize {
        self.script.lock().unwrap().connect_attempts
    }

    pub fn disconnects(&self) -> usize {
        self.script.lock().unwrap().disconnects
    }

    pub fn commands(&self) -> Vec<String> {
        self.script.lock().unwrap().commands.clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        _endpoint: &ProtocolEndpoint,
    ) -> Result<Box<dyn ProtocolClient>, ProtocolError> {
        let step = {
            let mut script = self.script.lock().unwrap();
            script.connect_attempts += 1;
            script.connects.pop_front().unwrap_or(ConnectStep::Accept)
        };

        match step {
            ConnectStep::Accept => Ok(Box::new(ScriptedClient {
                script: Arc::clone(&self.script),
            })),
            ConnectStep::Refuse(e) => Err(e),
            ConnectStep::Hang => std::future::pending().await,
        }
    }
}

struct ScriptedClient {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl ProtocolClient for ScriptedClient {
    async fn send(&mut self, command: &str) -> Result<String, ProtocolError> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.commands.push(command.to_string());
            let fallback = script.fallback.clone();
            script.replies.pop_front().or(fallback)
        };

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(ProtocolError::Transport("no scripted reply".to_string())),
        }
    }

    async fn disconnect(&mut self) -> Result<(), ProtocolError> {
        self.script.lock().unwrap().disconnects += 1;
        Ok(())
    }
}

/// Process backend that keeps its own running flag
#[derive(Default)]
pub struct FakeBackend {
    running: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    status_calls: AtomicUsize,
    start_error: Mutex<Option<String>>,
    stop_error: Mutex<Option<String>>,
    start_is_noop: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn running() -> Arc<Self> {
        let backend = Self::default();
        backend.running.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn fail_start(&self, reason: &str) {
        *self.start_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_stop(&self, reason: &str) {
        *self.stop_error.lock().unwrap() = Some(reason.to_string());
    }

    pub fn heal_stop(&self) {
        *self.stop_error.lock().unwrap() = None;
    }

    /// Start calls succeed but the process never comes up
    pub fn start_without_running(&self) {
        self.start_is_noop.store(true, Ordering::SeqCst);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessBackend for FakeBackend {
    async fn start(&self) -> Result<(), BackendError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.start_error.lock().unwrap().clone() {
            return Err(BackendError::Start(reason));
        }
        if !self.start_is_noop.load(Ordering::SeqCst) {
            self.running.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.stop_error.lock().unwrap().clone() {
            return Err(BackendError::Stop(reason));
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_running(&self) -> Result<bool, BackendError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.running.load(Ordering::SeqCst))
    }
}

/// Sink that remembers every event it was given
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &Notification) {
        self.events.lock().unwrap().push(notification.event.clone());
    }
}

pub fn protocol_config() -> ProtocolConfig {
    ProtocolConfig {
        password: "secret".to_string(),
        connect_retries: 3,
        retry_backoff: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(5),
        ..ProtocolConfig::default()
    }
}

/// Ticks at 8s, 18s, 28s... after a start issued at t=0 (start confirmed at 3s,
/// 5s warm-up, 10s interval).
pub fn supervisor_config(shutdown_delay: Duration) -> SupervisorConfig {
    SupervisorConfig {
        server_name: "Minecraft".to_string(),
        service_name: "minecraft".to_string(),
        poll_interval: Duration::from_secs(10),
        shutdown_delay,
        confirmation_window: Duration::from_secs(3),
        warmup_delay: Duration::from_secs(5),
        backend_timeout: Duration::from_secs(30),
        probe_failure_alert_threshold: 3,
        protocol: protocol_config(),
        ..SupervisorConfig::default()
    }
}
