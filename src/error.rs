/// Error handling module for the game server supervisor.
///
/// This module defines the error types used throughout the library. The
/// crate-wide [`Error`] wraps the narrower taxonomies each layer works with:
///
/// * [`ConnectError`] - establishing a protocol session failed
/// * [`ProtocolError`] - a single request/response exchange failed
/// * [`ProbeError`] - an occupancy probe could not produce a count
/// * [`BackendError`] - the process control backend reported a failure
///
/// Protocol-layer errors never reach the supervisor's state machine: the
/// occupancy prober absorbs them and reports an unknown occupancy instead.
///
/// # Example
///
/// ```
/// use gameserver_supervisor::error::{BackendError, Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::Backend(BackendError::Start(msg))) => println!("Start failed: {}", msg),
///         Err(Error::Unauthorized(origin)) => println!("Rejected origin {}", origin),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the supervisor library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse configuration from a file, string or the environment.
    ///
    /// This error occurs when:
    /// - The configuration file cannot be read
    /// - The JSON or YAML is malformed
    /// - An environment variable holds a value of the wrong type
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains invalid values.
    ///
    /// This error occurs when:
    /// - A duration that drives a timer is zero
    /// - The protocol credential or service name is empty
    /// - The occupancy pattern does not compile or has no capture group
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The process control backend failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A protocol session could not be established.
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    /// A protocol exchange failed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An occupancy probe failed.
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// A command arrived from an origin that is not allowed to issue it.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The supervisor task has shut down and no longer accepts requests.
    #[error("Supervisor is not running")]
    NotRunning,

    /// Error talking to the supervisor task or a front end client.
    #[error("Communication error: {0}")]
    Communication(String),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

/// Failure to establish a protocol session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Every attempt failed or timed out.
    #[error("gave up after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        /// Number of attempts made
        attempts: u32,
        /// Description of the final attempt's failure
        last_error: String,
    },

    /// A single attempt got neither an acknowledgment nor an error in time.
    #[error("no authentication acknowledgment within {0:?}")]
    Timeout(Duration),
}

/// Failure of a single request/response exchange on a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No session is established.
    #[error("not connected")]
    NotConnected,

    /// A previous request on the session has not completed yet.
    #[error("a request is already in flight")]
    Busy,

    /// The peer answered with something that could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The underlying connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The peer refused the credential.
    #[error("authentication rejected")]
    AuthenticationRejected,

    /// The peer did not answer in time.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Failure of an occupancy probe.
///
/// Carries only a description: the supervisor never branches on the
/// protocol error that caused it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Occupancy could not be determined.
    #[error("occupancy unavailable: {0}")]
    Unavailable(String),
}

impl From<ConnectError> for ProbeError {
    fn from(e: ConnectError) -> Self {
        ProbeError::Unavailable(e.to_string())
    }
}

impl From<ProtocolError> for ProbeError {
    fn from(e: ProtocolError) -> Self {
        ProbeError::Unavailable(e.to_string())
    }
}

/// Failure reported by (or on behalf of) the process control backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Starting the server failed.
    #[error("start failed: {0}")]
    Start(String),

    /// Stopping the server failed.
    #[error("stop failed: {0}")]
    Stop(String),

    /// Querying the server status failed.
    #[error("status check failed: {0}")]
    Status(String),

    /// The backend did not return within its allotted window.
    #[error("{operation} did not complete within {after:?}")]
    Timeout {
        /// Which backend call timed out
        operation: &'static str,
        /// The enforced bound
        after: Duration,
    },
}

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;
