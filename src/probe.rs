/// Occupancy probing over the query protocol.
///
/// The [`OccupancyProber`] turns one protocol exchange into a player count.
/// It connects lazily, issues the configured query command, and extracts the
/// count from the free-text reply. Every failure is flattened into
/// [`ProbeError::Unavailable`] and drops the session, so the next probe
/// starts from a fresh connection.
use crate::config::ProtocolConfig;
use crate::error::{Error, ProbeError, ProtocolError, Result};
use crate::transport::{Connector, SessionManager};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Extract the occupancy count from a query response.
///
/// The count is the first capture group of `pattern`. A response in which
/// the pattern does not occur counts as zero occupancy: servers phrase an
/// empty list differently, and only a populated list carries the marker.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedResponse`] when the marker is present
/// but the captured text is not a count.
///
/// # Examples
///
/// ```
/// use gameserver_supervisor::probe::parse_occupancy;
/// use regex::Regex;
///
/// let pattern = Regex::new(r"There are (\d+) of a max").unwrap();
/// let reply = "There are 2 of a max of 20 players online: alex, steve";
/// assert_eq!(parse_occupancy(&pattern, reply).unwrap(), 2);
/// assert_eq!(parse_occupancy(&pattern, "No one is online").unwrap(), 0);
/// ```
pub fn parse_occupancy(pattern: &Regex, response: &str) -> std::result::Result<u32, ProtocolError> {
    let Some(captures) = pattern.captures(response) else {
        return Ok(0);
    };

    let raw = captures
        .get(1)
        .map(|m| m.as_str())
        .ok_or_else(|| ProtocolError::MalformedResponse(response.to_string()))?;

    raw.parse::<u32>()
        .map_err(|e| ProtocolError::MalformedResponse(format!("bad count {:?}: {}", raw, e)))
}

/// Issues the occupancy query once per call.
///
/// Calls are serialized: the protocol has no request ids, so two probes
/// must never share the session at the same time.
pub struct OccupancyProber {
    /// Session used for queries
    sessions: SessionManager,
    /// Query command, e.g. `list`
    query_command: String,
    /// Count extraction pattern
    pattern: Regex,
    /// Attempts per lazy connect
    connect_retries: u32,
    /// Delay between connect attempts
    retry_backoff: Duration,
    /// Serializes probes
    probe_lock: Mutex<()>,
}

impl OccupancyProber {
    /// Create a prober with its own session manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if the occupancy pattern does not
    /// compile.
    pub fn new(connector: Arc<dyn Connector>, config: &ProtocolConfig) -> Result<Self> {
        let pattern = Regex::new(&config.occupancy_pattern).map_err(|e| {
            Error::ConfigInvalid(format!("occupancy pattern does not compile: {}", e))
        })?;

        Ok(Self {
            sessions: SessionManager::new(connector, config),
            query_command: config.query_command.clone(),
            pattern,
            connect_retries: config.connect_retries,
            retry_backoff: config.retry_backoff,
            probe_lock: Mutex::new(()),
        })
    }

    /// The session manager used by this prober
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Query the current occupancy.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Unavailable`] on any connect, transport or parse
    /// failure. The session has been torn down by the time it returns.
    #[tracing::instrument(skip(self))]
    pub async fn probe(&self) -> std::result::Result<u32, ProbeError> {
        let _serial = self.probe_lock.lock().await;

        match self.query().await {
            Ok(count) => {
                tracing::debug!(occupancy = count, "Occupancy probed");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.sessions.endpoint(),
                    error = %e,
                    "Occupancy probe failed, resetting session"
                );
                self.sessions.teardown().await;
                Err(e)
            }
        }
    }

    async fn query(&self) -> std::result::Result<u32, ProbeError> {
        if !self.sessions.is_connected().await {
            self.sessions
                .connect(self.connect_retries, self.retry_backoff)
                .await?;
        }

        let response = self.sessions.send(&self.query_command).await?;
        tracing::trace!(response = %response, "Query response");

        Ok(parse_occupancy(&self.pattern, &response)?)
    }

    /// Drop the probe session, if any
    pub async fn reset(&self) {
        self.sessions.teardown().await;
    }
}
