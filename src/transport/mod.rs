//! Transport layer for the occupancy-query protocol.
//!
//! The wire encoding lives behind two traits so the session logic can be
//! exercised without a network:
//!
//! * [`Connector`] opens and authenticates one connection per call.
//! * [`ProtocolClient`] exchanges strictly request/response text commands on
//!   an authenticated connection.
//!
//! [`SessionManager`] owns at most one live client and layers retry,
//! per-attempt timeouts, and a single in-flight request slot on top.
use crate::config::ProtocolConfig;
use crate::error::ProtocolError;
use async_trait::async_trait;
use std::fmt;

mod session;

pub use session::{SessionInfo, SessionManager};

/// Address and credential of the protocol endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ProtocolEndpoint {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Shared secret sent during authentication
    pub password: String,
}

impl ProtocolEndpoint {
    /// Extract the endpoint from protocol settings
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            password: config.password.clone(),
        }
    }
}

// The password stays out of logs.
impl fmt::Debug for ProtocolEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for ProtocolEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// An authenticated connection to the protocol endpoint.
///
/// Implementations only ever see one outstanding `send` at a time; the
/// session manager guarantees it.
#[async_trait]
pub trait ProtocolClient: Send {
    /// Send one command and wait for its response text.
    async fn send(&mut self, command: &str) -> Result<String, ProtocolError>;

    /// Close the connection.
    async fn disconnect(&mut self) -> Result<(), ProtocolError>;
}

/// Opens authenticated connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Make one connection attempt: connect, authenticate, and resolve with
    /// the acknowledged client or the error the endpoint reported.
    async fn connect(
        &self,
        endpoint: &ProtocolEndpoint,
    ) -> Result<Box<dyn ProtocolClient>, ProtocolError>;
}
