use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Something that happened to the supervised server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A start request was accepted and the start call issued
    Starting,
    /// The server was started and confirmed running
    Started,
    /// The server could not be started
    FailedToStart {
        /// Why
        reason: String,
    },
    /// A start request arrived while the server was already up
    AlreadyRunning,
    /// The supervisor found the server already running when it came up
    MonitoringResumed,
    /// The server went away without the supervisor stopping it
    StoppedExternally,
    /// The idle countdown ran out and the server was stopped
    StoppedIdle,
    /// The server was stopped by command
    StoppedManually,
    /// A stop call failed; the server is still running
    StopFailed {
        /// Why
        reason: String,
    },
    /// Nobody is online; the idle countdown started
    IdleCountdownArmed {
        /// Time until shutdown
        #[serde(with = "crate::config::duration_ms")]
        delay: Duration,
    },
    /// Someone came back online; the idle countdown was cancelled
    IdleCountdownCancelled,
    /// Several probes in a row could not determine occupancy
    ProbeDegraded {
        /// Length of the failure streak
        consecutive_failures: u32,
    },
    /// Occupancy could be determined again after a degraded streak
    ProbeRecovered,
}

impl LifecycleEvent {
    /// Short identifier, used as the SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::Starting => "starting",
            LifecycleEvent::Started => "started",
            LifecycleEvent::FailedToStart { .. } => "failed_to_start",
            LifecycleEvent::AlreadyRunning => "already_running",
            LifecycleEvent::MonitoringResumed => "monitoring_resumed",
            LifecycleEvent::StoppedExternally => "stopped_externally",
            LifecycleEvent::StoppedIdle => "stopped_idle",
            LifecycleEvent::StoppedManually => "stopped_manually",
            LifecycleEvent::StopFailed { .. } => "stop_failed",
            LifecycleEvent::IdleCountdownArmed { .. } => "idle_countdown_armed",
            LifecycleEvent::IdleCountdownCancelled => "idle_countdown_cancelled",
            LifecycleEvent::ProbeDegraded { .. } => "probe_degraded",
            LifecycleEvent::ProbeRecovered => "probe_recovered",
        }
    }
}

/// A lifecycle event addressed to humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id, also used as the SSE event id
    pub id: Uuid,
    /// Display name of the server
    pub server: String,
    /// What happened
    pub event: LifecycleEvent,
    /// When it happened
    pub at: SystemTime,
}

impl Notification {
    /// Create a notification stamped with the current time
    pub fn new(server: impl Into<String>, event: LifecycleEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            server: server.into(),
            event,
            at: SystemTime::now(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let server = &self.server;
        match &self.event {
            LifecycleEvent::Starting => write!(f, "Sending start request to {} server...", server),
            LifecycleEvent::Started => write!(f, "{} server started successfully!", server),
            LifecycleEvent::FailedToStart { reason } => {
                write!(f, "Failed to start {} server: {}", server, reason)
            }
            LifecycleEvent::AlreadyRunning => write!(f, "{} server is already running!", server),
            LifecycleEvent::MonitoringResumed => {
                write!(f, "{} server is running, monitoring players.", server)
            }
            LifecycleEvent::StoppedExternally => write!(
                f,
                "{} server stopped (crashed or manually stopped by admin).",
                server
            ),
            LifecycleEvent::StoppedIdle => {
                write!(f, "{} server stopped due to inactivity.", server)
            }
            LifecycleEvent::StoppedManually => write!(f, "{} server stopped by command.", server),
            LifecycleEvent::StopFailed { reason } => {
                write!(f, "Failed to stop {} server: {}", server, reason)
            }
            LifecycleEvent::IdleCountdownArmed { delay } => write!(
                f,
                "No players online on {}, shutting down in {}s unless someone joins.",
                server,
                delay.as_secs()
            ),
            LifecycleEvent::IdleCountdownCancelled => {
                write!(f, "Players are back on {}, shutdown cancelled.", server)
            }
            LifecycleEvent::ProbeDegraded {
                consecutive_failures,
            } => write!(
                f,
                "Could not read the player count of {} for {} checks in a row; assuming it is still needed.",
                server, consecutive_failures
            ),
            LifecycleEvent::ProbeRecovered => {
                write!(f, "Player count of {} is readable again.", server)
            }
        }
    }
}
