/// Lifecycle supervision of the managed game server.
///
/// This module decides when the server runs. It starts the server on
/// request, polls it while it is up, stops it once it has been empty for the
/// configured delay, and notices when it goes away on its own.
/// All public components are instrumented with `tracing` spans.
///
/// # Components
///
/// * `supervisor` - The lifecycle state machine and its handle
/// * `lifecycle` - History of state transitions
/// * `monitor` - Recurring poll driver
/// * `idle_timer` - The idle shutdown countdown
/// * `backend` - Seam to the process controller
///
/// # Examples
///
/// Supervising a server:
///
/// ```no_run
/// use gameserver_supervisor::config::SupervisorConfig;
/// use gameserver_supervisor::notify::TracingSink;
/// use gameserver_supervisor::server::{ProcessBackend, ServerState, ServerSupervisor};
/// use gameserver_supervisor::transport::Connector;
/// use std::sync::Arc;
///
/// # async fn example(backend: Arc<dyn ProcessBackend>, connector: Arc<dyn Connector>) -> gameserver_supervisor::Result<()> {
/// let config = SupervisorConfig::from_env()?;
/// let supervisor = ServerSupervisor::spawn(config, backend, connector, Arc::new(TracingSink))?;
///
/// if supervisor.state() == ServerState::Stopped {
///     supervisor.request_start("ops-channel").await?;
/// }
/// # Ok(())
/// # }
/// ```
///
/// Reading the transition history:
///
/// ```no_run
/// use gameserver_supervisor::server::{LifecycleLog, ServerState, TransitionCause};
///
/// let log = LifecycleLog::new();
/// log.record(
///     ServerState::Stopped,
///     ServerState::Starting,
///     TransitionCause::StartRequested,
///     None,
/// ).unwrap();
///
/// for transition in log.recent(Some(10)).unwrap() {
///     println!("{} -> {} ({:?})", transition.from, transition.to, transition.cause);
/// }
/// ```
pub mod lifecycle;
pub mod monitor;
mod backend;
mod idle_timer;
mod state;
mod supervisor;

pub use backend::ProcessBackend;
pub use idle_timer::IdleTimer;
pub use lifecycle::{LifecycleLog, Transition, TransitionCause};
pub use monitor::PollTicker;
pub use state::{Occupancy, PollResult, ServerState};
pub use supervisor::{CommandReply, ServerSupervisor, StatusSnapshot};
