use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the supervised server, as seen by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// Not running
    Stopped,
    /// Start issued, waiting for confirmation
    Starting,
    /// Running and being polled
    Running,
    /// Stopping because the idle countdown ran out
    StoppingIdle,
    /// Stopping because a stop command was issued
    StoppingManual,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::StoppingIdle => "stopping (idle)",
            ServerState::StoppingManual => "stopping (manual)",
        };
        f.write_str(name)
    }
}

/// Player count as far as the supervisor knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    /// The probe returned a count
    Known(u32),
    /// The probe failed
    Unknown,
}

/// Outcome of one poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollResult {
    /// Whether the backend reported the process running
    pub running: bool,
    /// Probed occupancy; `Unknown` when not running or the probe failed
    pub occupancy: Occupancy,
}
