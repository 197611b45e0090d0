use super::{Connector, ProtocolClient, ProtocolEndpoint};
use crate::config::ProtocolConfig;
use crate::error::{ConnectError, ProtocolError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use uuid::Uuid;

/// Public description of an established session.
///
/// The connection itself never leaves the [`SessionManager`]; callers only
/// get to see which session they are talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    /// Unique id of this session instance
    pub id: Uuid,
    /// When authentication was acknowledged
    pub established_at: Instant,
}

struct Session {
    info: SessionInfo,
    client: Box<dyn ProtocolClient>,
}

/// Owns the single logical connection to the occupancy-query endpoint.
///
/// At most one request is outstanding at any time. A `send` issued while
/// another call holds the session fails fast with [`ProtocolError::Busy`]
/// instead of queueing behind it, and a request that times out takes its
/// session down with it, so a late response can never be read as the answer
/// to a later command.
///
/// # Example
///
/// ```no_run
/// use gameserver_supervisor::config::ProtocolConfig;
/// use gameserver_supervisor::transport::{Connector, SessionManager};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example(connector: Arc<dyn Connector>) {
/// let config = ProtocolConfig { password: "secret".to_string(), ..ProtocolConfig::default() };
/// let sessions = SessionManager::new(connector, &config);
///
/// if sessions.connect(3, Duration::from_secs(5)).await.is_ok() {
///     let reply = sessions.send("list").await;
///     println!("{:?}", reply);
/// }
/// sessions.teardown().await;
/// # }
/// ```
pub struct SessionManager {
    /// Factory for new connections
    connector: Arc<dyn Connector>,
    /// Where to connect
    endpoint: ProtocolEndpoint,
    /// Bound on one authentication attempt
    connect_timeout: Duration,
    /// Bound on one command exchange
    command_timeout: Duration,
    /// The live session, if any
    session: Mutex<Option<Session>>,
}

impl SessionManager {
    /// Create a manager with no session; connections are made on demand.
    pub fn new(connector: Arc<dyn Connector>, config: &ProtocolConfig) -> Self {
        Self {
            connector,
            endpoint: ProtocolEndpoint::from_config(config),
            connect_timeout: config.connect_timeout,
            command_timeout: config.command_timeout,
            session: Mutex::new(None),
        }
    }

    /// The endpoint this manager connects to
    pub fn endpoint(&self) -> &ProtocolEndpoint {
        &self.endpoint
    }

    /// Whether a session is currently established
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Information about the current session, if one is established
    pub async fn session_info(&self) -> Option<SessionInfo> {
        self.session.lock().await.as_ref().map(|s| s.info)
    }

    /// Establish a session, trying up to `retries` times.
    ///
    /// Attempts are separated by a fixed `backoff`. Each attempt is bounded by
    /// the configured connect timeout; an attempt that neither acknowledges
    /// nor fails within it is dropped, which cancels it, before the next one
    /// begins. An already established session is returned as-is.
    ///
    /// The session slot stays locked until this returns, so concurrent
    /// [`send`](Self::send) calls fail with [`ProtocolError::Busy`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::ExhaustedRetries`] when no attempt succeeds.
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn connect(&self, retries: u32, backoff: Duration) -> Result<SessionInfo, ConnectError> {
        let mut slot = self.session.lock().await;
        if let Some(existing) = slot.as_ref() {
            tracing::debug!(session_id = %existing.info.id, "Session already established");
            return Ok(existing.info);
        }

        let attempts = retries.max(1);
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=attempts {
            tracing::debug!(attempt, attempts, "Authenticating with protocol endpoint");

            match time::timeout(self.connect_timeout, self.connector.connect(&self.endpoint)).await {
                Ok(Ok(client)) => {
                    let info = SessionInfo {
                        id: Uuid::new_v4(),
                        established_at: Instant::now(),
                    };
                    tracing::info!(session_id = %info.id, attempt, "Protocol session established");
                    *slot = Some(Session { info, client });
                    return Ok(info);
                }
                Ok(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "Connect attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    let e = ConnectError::Timeout(self.connect_timeout);
                    tracing::warn!(attempt, error = %e, "Connect attempt timed out and was cancelled");
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                time::sleep(backoff).await;
            }
        }

        tracing::error!(attempts, last_error = %last_error, "Giving up on protocol session");
        Err(ConnectError::ExhaustedRetries {
            attempts,
            last_error,
        })
    }

    /// Send one command on the established session and wait for its response.
    ///
    /// Never connects. Resolves with exactly one outcome: the response, the
    /// error the peer reported, or a timeout after the configured command
    /// timeout.
    ///
    /// # Errors
    ///
    /// * [`ProtocolError::NotConnected`] if no session exists
    /// * [`ProtocolError::Busy`] if another call currently holds the session;
    ///   [`connect`](Self::connect) holds it through every attempt and
    ///   backoff, so a send issued while a connect is in progress is `Busy`
    ///   even though no session exists yet
    /// * [`ProtocolError::Timeout`] if no response arrived in time; the
    ///   session is torn down before returning
    /// * whatever the client reported for the exchange
    #[tracing::instrument(skip(self))]
    pub async fn send(&self, command: &str) -> Result<String, ProtocolError> {
        let mut slot = self.session.try_lock().map_err(|_| ProtocolError::Busy)?;
        let session = slot.as_mut().ok_or(ProtocolError::NotConnected)?;

        match time::timeout(self.command_timeout, session.client.send(command)).await {
            Ok(result) => result,
            Err(_) => {
                // The response may still arrive later; this connection can no
                // longer tell whose answer it is.
                tracing::warn!(
                    session_id = %session.info.id,
                    timeout = ?self.command_timeout,
                    "Command timed out, discarding session"
                );
                if let Some(stale) = slot.take() {
                    self.close(stale).await;
                }
                Err(ProtocolError::Timeout(self.command_timeout))
            }
        }
    }

    /// Drop the current session, if any.
    ///
    /// Idempotent. Disconnect failures are logged and swallowed; the session
    /// slot is always empty afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn teardown(&self) {
        let taken = self.session.lock().await.take();
        match taken {
            Some(session) => self.close(session).await,
            None => tracing::trace!("No session to tear down"),
        }
    }

    async fn close(&self, mut session: Session) {
        let id = session.info.id;
        match time::timeout(self.command_timeout, session.client.disconnect()).await {
            Ok(Ok(())) => tracing::debug!(session_id = %id, "Protocol session closed"),
            Ok(Err(e)) => {
                tracing::debug!(session_id = %id, error = %e, "Ignoring disconnect error")
            }
            Err(_) => tracing::debug!(session_id = %id, "Disconnect timed out, dropping session"),
        }
    }
}
