use crate::error::BackendError;
use async_trait::async_trait;

/// Start/stop/status control over the managed server process.
///
/// The supervisor treats every error as "unknown or failed", never as
/// "definitely stopped", and bounds every call with its backend timeout.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use gameserver_supervisor::error::BackendError;
/// use gameserver_supervisor::server::ProcessBackend;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// /// A backend that only flips a flag.
/// struct FlagBackend(AtomicBool);
///
/// #[async_trait]
/// impl ProcessBackend for FlagBackend {
///     async fn start(&self) -> Result<(), BackendError> {
///         self.0.store(true, Ordering::SeqCst);
///         Ok(())
///     }
///
///     async fn stop(&self) -> Result<(), BackendError> {
///         self.0.store(false, Ordering::SeqCst);
///         Ok(())
///     }
///
///     async fn is_running(&self) -> Result<bool, BackendError> {
///         Ok(self.0.load(Ordering::SeqCst))
///     }
/// }
/// ```
#[async_trait]
pub trait ProcessBackend: Send + Sync {
    /// Ask for the server to be started
    async fn start(&self) -> Result<(), BackendError>;

    /// Ask for the server to be stopped
    async fn stop(&self) -> Result<(), BackendError>;

    /// Report whether the server process is running
    async fn is_running(&self) -> Result<bool, BackendError>;
}
