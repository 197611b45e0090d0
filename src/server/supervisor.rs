use crate::config::{SupervisorConfig, validate_config};
use crate::error::{BackendError, Error, Result};
use crate::notify::{LifecycleEvent, Notification, NotificationSink};
use crate::probe::OccupancyProber;
use crate::server::lifecycle::{LifecycleLog, Transition, TransitionCause};
use crate::server::{IdleTimer, Occupancy, PollResult, PollTicker, ProcessBackend, ServerState};
use crate::transport::Connector;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;

/// Requests queued before senders wait
const REQUEST_BUFFER: usize = 32;

/// Answer to an inbound lifecycle command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    /// The command came from an origin that may not issue it
    Rejected {
        /// The only origin allowed to issue commands
        allowed_origin: String,
    },
    /// Start requested while the server is already running
    AlreadyRunning,
    /// Start or stop requested while a start is in progress
    AlreadyStarting,
    /// The server is between states; try again shortly
    Busy(ServerState),
    /// The server was started and confirmed running
    Started,
    /// The server could not be started
    FailedToStart(String),
    /// The server was stopped
    Stopped,
    /// Stop requested while the server is not running
    NotRunning,
    /// The stop call failed; the server is still running
    FailedToStop(String),
}

impl CommandReply {
    /// Short identifier for the reply
    pub fn kind(&self) -> &'static str {
        match self {
            CommandReply::Rejected { .. } => "rejected",
            CommandReply::AlreadyRunning => "already_running",
            CommandReply::AlreadyStarting => "already_starting",
            CommandReply::Busy(_) => "busy",
            CommandReply::Started => "started",
            CommandReply::FailedToStart(_) => "failed_to_start",
            CommandReply::Stopped => "stopped",
            CommandReply::NotRunning => "not_running",
            CommandReply::FailedToStop(_) => "failed_to_stop",
        }
    }

    /// Whether the command changed (or confirmed) server state as asked
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            CommandReply::AlreadyRunning | CommandReply::Started | CommandReply::Stopped
        )
    }
}

impl fmt::Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandReply::Rejected { allowed_origin } => {
                write!(f, "This command can only be used in {}", allowed_origin)
            }
            CommandReply::AlreadyRunning => f.write_str("Server is already running!"),
            CommandReply::AlreadyStarting => f.write_str("Server is already starting."),
            CommandReply::Busy(state) => write!(f, "Server is {}, try again shortly.", state),
            CommandReply::Started => f.write_str("Server started successfully!"),
            CommandReply::FailedToStart(reason) => write!(f, "Failed to start server: {}", reason),
            CommandReply::Stopped => f.write_str("Server stopped."),
            CommandReply::NotRunning => f.write_str("Server is not running."),
            CommandReply::FailedToStop(reason) => write!(f, "Failed to stop server: {}", reason),
        }
    }
}

/// Point-in-time view of the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Display name of the server
    pub server: String,
    /// Current state
    pub state: ServerState,
    /// Occupancy seen by the last successful probe of this run
    pub last_occupancy: Option<u32>,
    /// Whether the idle shutdown countdown is running
    pub idle_countdown_armed: bool,
    /// Probes in a row that could not determine occupancy
    pub consecutive_probe_failures: u32,
}

enum Request {
    Start {
        origin: String,
        reply: oneshot::Sender<CommandReply>,
    },
    Stop {
        origin: String,
        reply: oneshot::Sender<CommandReply>,
    },
    StartFinished {
        outcome: std::result::Result<(), String>,
    },
    Tick {
        run: u64,
    },
    IdleExpired {
        cycle: u64,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Await a backend call, giving up after `bound`
async fn bounded<T>(
    bound: Duration,
    operation: &'static str,
    call: impl Future<Output = std::result::Result<T, BackendError>>,
) -> std::result::Result<T, BackendError> {
    match time::timeout(bound, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            operation,
            after: bound,
        }),
    }
}

/// Start the server and check it is running once the confirmation window
/// has passed.
async fn start_and_confirm(
    backend: &dyn ProcessBackend,
    bound: Duration,
    window: Duration,
) -> std::result::Result<(), String> {
    bounded(bound, "start", backend.start())
        .await
        .map_err(|e| e.to_string())?;

    time::sleep(window).await;

    match bounded(bound, "status check", backend.is_running()).await {
        Ok(true) => Ok(()),
        Ok(false) => Err("server was not running after the confirmation window".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Owns all lifecycle state. Runs as a single task; every timer, ticker and
/// background call reports back through the request channel, so transitions
/// are evaluated one at a time.
struct SupervisorTask {
    config: SupervisorConfig,
    backend: Arc<dyn ProcessBackend>,
    prober: OccupancyProber,
    sink: Arc<dyn NotificationSink>,
    history: Arc<LifecycleLog>,
    idle_timer: IdleTimer,
    ticker: PollTicker,
    requests: mpsc::WeakSender<Request>,
    status: watch::Sender<StatusSnapshot>,

    state: ServerState,
    /// Identifies the current Running period; ticks from older periods are ignored
    run: u64,
    /// Countdown cycle the supervisor considers live
    idle_cycle: Option<u64>,
    next_idle_cycle: u64,
    last_occupancy: Option<u32>,
    probe_failures: u32,
    probe_alerted: bool,
    /// Set after a failed idle stop; cleared once someone is online again
    auto_stop_suspended: bool,
    /// Start-and-confirm call in flight while Starting
    start_task: Option<JoinHandle<()>>,
    /// Caller waiting on the start in flight
    start_reply: Option<oneshot::Sender<CommandReply>>,
}

impl SupervisorTask {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        self.reconcile().await;

        while let Some(request) = requests.recv().await {
            match request {
                Request::Start { origin, reply } => self.handle_start(&origin, reply),
                Request::Stop { origin, reply } => {
                    let answer = self.handle_stop(&origin).await;
                    let _ = reply.send(answer);
                }
                Request::StartFinished { outcome } => {
                    let answer = self.finish_start(outcome).await;
                    if let Some(reply) = self.start_reply.take() {
                        let _ = reply.send(answer);
                    }
                }
                Request::Tick { run } => self.handle_tick(run).await,
                Request::IdleExpired { cycle } => self.handle_idle_expired(cycle).await,
                Request::Shutdown { done } => {
                    self.wind_down().await;
                    let _ = done.send(());
                    return;
                }
            }
            self.publish();
        }

        self.wind_down().await;
    }

    /// Adopt a server that is already up when the supervisor starts
    async fn reconcile(&mut self) {
        match bounded(
            self.config.backend_timeout,
            "status check",
            self.backend.is_running(),
        )
        .await
        {
            Ok(true) => {
                self.transition(ServerState::Running, TransitionCause::FoundRunning, None);
                self.notify(LifecycleEvent::MonitoringResumed);
                self.begin_polling();
            }
            Ok(false) => tracing::debug!("Server not running at startup"),
            Err(e) => {
                tracing::warn!(error = %e, "Could not determine server status at startup")
            }
        }
        self.publish();
    }

    fn handle_start(&mut self, origin: &str, reply: oneshot::Sender<CommandReply>) {
        if let Some(rejection) = self.authorize(origin) {
            let _ = reply.send(rejection);
            return;
        }

        match self.state {
            ServerState::Running => {
                self.notify(LifecycleEvent::AlreadyRunning);
                let _ = reply.send(CommandReply::AlreadyRunning);
            }
            ServerState::Starting => {
                let _ = reply.send(CommandReply::AlreadyStarting);
            }
            ServerState::StoppingIdle | ServerState::StoppingManual => {
                let _ = reply.send(CommandReply::Busy(self.state));
            }
            ServerState::Stopped => {
                let Some(requests) = self.requests.upgrade() else {
                    tracing::debug!("No handles left, ignoring start request");
                    return;
                };

                self.transition(ServerState::Starting, TransitionCause::StartRequested, None);
                self.notify(LifecycleEvent::Starting);

                let backend = Arc::clone(&self.backend);
                let bound = self.config.backend_timeout;
                let window = self.config.confirmation_window;

                self.start_reply = Some(reply);
                self.start_task = Some(tokio::spawn(async move {
                    let outcome = start_and_confirm(backend.as_ref(), bound, window).await;
                    if requests
                        .send(Request::StartFinished { outcome })
                        .await
                        .is_err()
                    {
                        tracing::debug!("Supervisor gone before start completed");
                    }
                }));
            }
        }
    }

    async fn finish_start(&mut self, outcome: std::result::Result<(), String>) -> CommandReply {
        self.start_task = None;
        if self.state != ServerState::Starting {
            tracing::warn!(state = %self.state, "Start completed outside Starting state");
        }

        match outcome {
            Ok(()) => {
                self.transition(ServerState::Running, TransitionCause::StartConfirmed, None);
                self.notify(LifecycleEvent::Started);
                self.begin_polling();
                CommandReply::Started
            }
            Err(reason) => {
                tracing::error!(reason = %reason, "Server failed to start");
                self.enter_stopped(TransitionCause::StartFailed, Some(reason.clone()))
                    .await;
                self.notify(LifecycleEvent::FailedToStart {
                    reason: reason.clone(),
                });
                CommandReply::FailedToStart(reason)
            }
        }
    }

    async fn handle_stop(&mut self, origin: &str) -> CommandReply {
        if let Some(rejection) = self.authorize(origin) {
            return rejection;
        }

        match self.state {
            ServerState::Stopped => CommandReply::NotRunning,
            ServerState::Starting => CommandReply::AlreadyStarting,
            ServerState::StoppingIdle | ServerState::StoppingManual => {
                CommandReply::Busy(self.state)
            }
            ServerState::Running => {
                self.cancel_idle_countdown();
                self.transition(
                    ServerState::StoppingManual,
                    TransitionCause::StopRequested,
                    None,
                );

                match bounded(self.config.backend_timeout, "stop", self.backend.stop()).await {
                    Ok(()) => {
                        self.enter_stopped(TransitionCause::StopCompleted, None).await;
                        self.notify(LifecycleEvent::StoppedManually);
                        CommandReply::Stopped
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        tracing::error!(error = %e, "Stop command failed");
                        self.transition(
                            ServerState::Running,
                            TransitionCause::StopFailed,
                            Some(reason.clone()),
                        );
                        self.notify(LifecycleEvent::StopFailed {
                            reason: reason.clone(),
                        });
                        CommandReply::FailedToStop(reason)
                    }
                }
            }
        }
    }

    async fn handle_tick(&mut self, run: u64) {
        if run != self.run || self.state != ServerState::Running {
            tracing::trace!(run, current = self.run, "Ignoring stale tick");
            return;
        }

        tracing::debug!("Checking server status and player count");
        if let Some(poll) = self.poll().await {
            self.evaluate(poll).await;
        }
    }

    /// Sample process status and occupancy. `None` when the status itself is
    /// unknown, in which case nothing may change.
    async fn poll(&self) -> Option<PollResult> {
        let running = match bounded(
            self.config.backend_timeout,
            "status check",
            self.backend.is_running(),
        )
        .await
        {
            Ok(running) => running,
            Err(e) => {
                tracing::warn!(error = %e, "Status check failed, skipping tick");
                return None;
            }
        };

        if !running {
            return Some(PollResult {
                running,
                occupancy: Occupancy::Unknown,
            });
        }

        let occupancy = match self.prober.probe().await {
            Ok(count) => Occupancy::Known(count),
            Err(_) => Occupancy::Unknown,
        };

        Some(PollResult { running, occupancy })
    }

    async fn evaluate(&mut self, poll: PollResult) {
        if !poll.running {
            tracing::warn!("Server is no longer running, stopping player monitoring");
            self.enter_stopped(TransitionCause::ProcessGone, None).await;
            self.notify(LifecycleEvent::StoppedExternally);
            return;
        }

        match poll.occupancy {
            Occupancy::Known(count) => self.observe_occupancy(count),
            Occupancy::Unknown => self.observe_probe_failure(),
        }
    }

    fn observe_occupancy(&mut self, count: u32) {
        self.last_occupancy = Some(count);
        self.probe_failures = 0;
        if self.probe_alerted {
            self.probe_alerted = false;
            self.notify(LifecycleEvent::ProbeRecovered);
        }

        if count > 0 {
            tracing::info!(occupancy = count, "Players online");
            self.auto_stop_suspended = false;
            if self.idle_cycle.is_some() {
                self.cancel_idle_countdown();
                tracing::info!("Shutdown cancelled, players are online");
                self.notify(LifecycleEvent::IdleCountdownCancelled);
            }
            return;
        }

        tracing::info!("No players online");
        if self.auto_stop_suspended {
            tracing::debug!("Idle shutdown suspended after a failed stop");
        } else if self.idle_cycle.is_some() {
            tracing::trace!("Idle countdown already running");
        } else {
            self.arm_idle_countdown();
        }
    }

    fn observe_probe_failure(&mut self) {
        self.probe_failures = self.probe_failures.saturating_add(1);
        tracing::warn!(
            consecutive_failures = self.probe_failures,
            "Could not get player count, assuming server is still needed"
        );

        let threshold = self.config.probe_failure_alert_threshold;
        if threshold > 0 && self.probe_failures >= threshold && !self.probe_alerted {
            self.probe_alerted = true;
            self.notify(LifecycleEvent::ProbeDegraded {
                consecutive_failures: self.probe_failures,
            });
        }
    }

    fn arm_idle_countdown(&mut self) {
        let cycle = self.next_idle_cycle;
        self.next_idle_cycle += 1;

        let delay = self.config.shutdown_delay;
        let requests = self.requests.clone();
        let armed = self.idle_timer.arm(delay, move || {
            if let Some(requests) = requests.upgrade() {
                tokio::spawn(async move {
                    let _ = requests.send(Request::IdleExpired { cycle }).await;
                });
            }
        });

        if armed {
            tracing::info!(?delay, cycle, "Starting idle shutdown countdown");
            self.idle_cycle = Some(cycle);
            self.notify(LifecycleEvent::IdleCountdownArmed { delay });
        } else {
            tracing::warn!("Idle timer was armed without a live countdown cycle");
        }
    }

    fn cancel_idle_countdown(&mut self) {
        self.idle_cycle = None;
        self.idle_timer.cancel();
    }

    async fn handle_idle_expired(&mut self, cycle: u64) {
        if self.state != ServerState::Running || self.idle_cycle != Some(cycle) {
            tracing::debug!(cycle, "Ignoring expiry of a cancelled countdown");
            return;
        }
        self.idle_cycle = None;

        tracing::info!("Shutting down server due to inactivity");
        self.transition(ServerState::StoppingIdle, TransitionCause::IdleTimeout, None);

        match bounded(self.config.backend_timeout, "stop", self.backend.stop()).await {
            Ok(()) => {
                self.enter_stopped(TransitionCause::StopCompleted, None).await;
                self.notify(LifecycleEvent::StoppedIdle);
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(error = %e, "Idle shutdown failed, server left running");
                self.auto_stop_suspended = true;
                self.transition(
                    ServerState::Running,
                    TransitionCause::StopFailed,
                    Some(reason.clone()),
                );
                self.notify(LifecycleEvent::StopFailed { reason });
            }
        }
    }

    fn authorize(&self, origin: &str) -> Option<CommandReply> {
        if self.config.command.allows(origin) {
            return None;
        }
        tracing::warn!(origin = %origin, "Rejected command from unauthorized origin");
        Some(CommandReply::Rejected {
            allowed_origin: self.config.command.channel_id.clone().unwrap_or_default(),
        })
    }

    fn begin_polling(&mut self) {
        self.run += 1;
        let run = self.run;
        self.last_occupancy = None;
        self.probe_failures = 0;
        self.probe_alerted = false;
        self.auto_stop_suspended = false;

        let requests = self.requests.clone();
        self.ticker.start(
            self.config.warmup_delay,
            self.config.poll_interval,
            move || {
                let requests = requests.clone();
                async move {
                    match requests.upgrade() {
                        Some(requests) => requests.send(Request::Tick { run }).await.is_ok(),
                        None => false,
                    }
                }
            },
        );
        tracing::info!(run, "Starting player monitoring");
    }

    /// Leave whatever state we are in for Stopped, releasing the countdown,
    /// the ticker and the protocol session.
    async fn enter_stopped(&mut self, cause: TransitionCause, details: Option<String>) {
        self.cancel_idle_countdown();
        self.ticker.stop();
        self.prober.reset().await;
        self.last_occupancy = None;
        self.probe_failures = 0;
        self.probe_alerted = false;
        self.auto_stop_suspended = false;
        self.transition(ServerState::Stopped, cause, details);
    }

    async fn wind_down(&mut self) {
        if let Some(task) = self.start_task.take() {
            task.abort();
            tracing::warn!("Abandoning start that was still being confirmed");
        }
        if self.state == ServerState::Starting {
            let reason = "supervisor shut down before the start was confirmed".to_string();
            self.transition(
                ServerState::Stopped,
                TransitionCause::SupervisorShutdown,
                Some(reason.clone()),
            );
            self.notify(LifecycleEvent::FailedToStart {
                reason: reason.clone(),
            });
            if let Some(reply) = self.start_reply.take() {
                let _ = reply.send(CommandReply::FailedToStart(reason));
            }
        }

        self.cancel_idle_countdown();
        self.ticker.stop();
        self.prober.reset().await;
        tracing::info!(state = %self.state, "Supervisor stopped");
    }

    fn transition(&mut self, to: ServerState, cause: TransitionCause, details: Option<String>) {
        let from = self.state;
        self.state = to;
        tracing::info!(%from, %to, ?cause, "Server state changed");

        if let Err(e) = self.history.record(from, to, cause, details) {
            tracing::warn!(error = %e, "Failed to record transition");
        }
        self.publish();
    }

    fn notify(&self, event: LifecycleEvent) {
        self.sink
            .notify(&Notification::new(self.config.server_name.clone(), event));
    }

    fn publish(&self) {
        self.status.send_replace(StatusSnapshot {
            server: self.config.server_name.clone(),
            state: self.state,
            last_occupancy: self.last_occupancy,
            idle_countdown_armed: self.idle_cycle.is_some(),
            consecutive_probe_failures: self.probe_failures,
        });
    }
}

/// Handle to a running lifecycle supervisor.
///
/// Cloning the handle is cheap; every clone talks to the same supervisor.
/// The supervisor task ends when [`shutdown`](Self::shutdown) is called or
/// the last handle is dropped. Neither touches the managed server.
///
/// # Example
///
/// ```no_run
/// use gameserver_supervisor::config::SupervisorConfig;
/// use gameserver_supervisor::notify::TracingSink;
/// use gameserver_supervisor::server::{ProcessBackend, ServerSupervisor};
/// use gameserver_supervisor::transport::Connector;
/// use std::sync::Arc;
///
/// # async fn example(backend: Arc<dyn ProcessBackend>, connector: Arc<dyn Connector>) -> gameserver_supervisor::Result<()> {
/// let config = SupervisorConfig::from_file("supervisor.json")?;
/// let supervisor = ServerSupervisor::spawn(config, backend, connector, Arc::new(TracingSink))?;
///
/// let reply = supervisor.request_start("ops-channel").await?;
/// println!("{}", reply);
///
/// supervisor.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServerSupervisor {
    /// Requests to the supervisor task
    requests: mpsc::Sender<Request>,
    /// Latest published status
    status: watch::Receiver<StatusSnapshot>,
    /// Transition history
    history: Arc<LifecycleLog>,
}

impl ServerSupervisor {
    /// Validate `config` and start supervising.
    ///
    /// The supervisor first asks the backend whether the server is already
    /// running and, if so, starts monitoring it right away.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if the configuration does not validate.
    #[tracing::instrument(skip_all, fields(service = %config.service_name))]
    pub fn spawn(
        config: SupervisorConfig,
        backend: Arc<dyn ProcessBackend>,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        validate_config(&config)?;

        let prober = OccupancyProber::new(connector, &config.protocol)?;
        let (requests, receiver) = mpsc::channel(REQUEST_BUFFER);
        let history = Arc::new(LifecycleLog::new());

        let initial = StatusSnapshot {
            server: config.server_name.clone(),
            state: ServerState::Stopped,
            last_occupancy: None,
            idle_countdown_armed: false,
            consecutive_probe_failures: 0,
        };
        let (status_tx, status_rx) = watch::channel(initial);

        let task = SupervisorTask {
            config,
            backend,
            prober,
            sink,
            history: Arc::clone(&history),
            idle_timer: IdleTimer::new(),
            ticker: PollTicker::new(),
            requests: requests.downgrade(),
            status: status_tx,
            state: ServerState::Stopped,
            run: 0,
            idle_cycle: None,
            next_idle_cycle: 0,
            last_occupancy: None,
            probe_failures: 0,
            probe_alerted: false,
            auto_stop_suspended: false,
            start_task: None,
            start_reply: None,
        };

        tokio::spawn(task.run(receiver));
        tracing::info!("Supervisor started");

        Ok(Self {
            requests,
            status: status_rx,
            history,
        })
    }

    /// Ask for the server to be started on behalf of `origin`.
    ///
    /// Resolves once the outcome is known: immediately for rejections and
    /// no-ops, after the confirmation window for an actual start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] if the supervisor has shut down.
    #[tracing::instrument(skip(self))]
    pub async fn request_start(&self, origin: &str) -> Result<CommandReply> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(Request::Start {
                origin: origin.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::NotRunning)?;
        answer.await.map_err(|_| Error::NotRunning)
    }

    /// Ask for the server to be stopped on behalf of `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] if the supervisor has shut down.
    #[tracing::instrument(skip(self))]
    pub async fn request_stop(&self, origin: &str) -> Result<CommandReply> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(Request::Stop {
                origin: origin.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::NotRunning)?;
        answer.await.map_err(|_| Error::NotRunning)
    }

    /// Current server state
    pub fn state(&self) -> ServerState {
        self.status.borrow().state
    }

    /// Current status snapshot
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Receiver that observes every published status change
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Recorded state transitions, newest first
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<Transition>> {
        self.history.recent(limit)
    }

    /// Stop supervising: cancel the countdown, stop polling, and close the
    /// protocol session. The managed server keeps its current state, except
    /// that a start still awaiting confirmation is abandoned: its caller gets
    /// [`CommandReply::FailedToStart`] and the state returns to Stopped.
    ///
    /// # Errors
    ///
    /// Never fails today; an already stopped supervisor is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        let (done, finished) = oneshot::channel();
        if self.requests.send(Request::Shutdown { done }).await.is_err() {
            tracing::debug!("Supervisor already stopped");
            return Ok(());
        }
        let _ = finished.await;
        Ok(())
    }
}
