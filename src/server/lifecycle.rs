use crate::error::{Error, Result};
use crate::server::ServerState;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

/// Maximum number of transitions kept in the log
pub const MAX_TRANSITIONS: usize = 1000;

/// Why a transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    /// Start command accepted
    StartRequested,
    /// Backend confirmed the server running after a start
    StartConfirmed,
    /// Start call failed or the server was not running afterwards
    StartFailed,
    /// Server found running when the supervisor came up
    FoundRunning,
    /// Poll found the process gone
    ProcessGone,
    /// Idle countdown ran out
    IdleTimeout,
    /// Stop command accepted
    StopRequested,
    /// Stop call succeeded
    StopCompleted,
    /// Stop call failed
    StopFailed,
    /// Supervisor shut down while a start was being confirmed
    SupervisorShutdown,
}

/// One recorded state change
#[derive(Debug, Clone)]
pub struct Transition {
    /// State before
    pub from: ServerState,
    /// State after
    pub to: ServerState,
    /// Why
    pub cause: TransitionCause,
    /// When
    pub timestamp: SystemTime,
    /// Extra context, e.g. the backend error
    pub details: Option<String>,
}

/// Bounded history of state transitions
pub struct LifecycleLog {
    /// Recorded transitions, oldest first
    entries: Mutex<VecDeque<Transition>>,
}

impl LifecycleLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a transition
    pub fn record(
        &self,
        from: ServerState,
        to: ServerState,
        cause: TransitionCause,
        details: Option<String>,
    ) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::Other("Failed to lock lifecycle log".to_string()))?;

        entries.push_back(Transition {
            from,
            to,
            cause,
            timestamp: SystemTime::now(),
            details,
        });

        // Limit history
        while entries.len() > MAX_TRANSITIONS {
            entries.pop_front();
        }

        Ok(())
    }

    /// Recent transitions, newest first
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<Transition>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::Other("Failed to lock lifecycle log".to_string()))?;

        let take = limit.unwrap_or(entries.len());
        Ok(entries.iter().rev().take(take).cloned().collect())
    }

    /// Forget all recorded transitions
    pub fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| Error::Other("Failed to lock lifecycle log".to_string()))?
            .clear();
        Ok(())
    }
}

impl Default for LifecycleLog {
    fn default() -> Self {
        Self::new()
    }
}
