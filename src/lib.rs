/*!
 # Game Server Supervisor

 A Rust library that keeps a remotely-managed game server running only while
 someone is using it.

 ## Overview

 The supervisor provides functionality to:
 - Start the server on request and confirm it came up
 - Poll the server's occupancy over its query protocol while it runs
 - Stop the server once it has been empty for a configured delay
 - Notice when the server goes away on its own
 - Report every lifecycle change through a notification sink
 - Optionally accept commands and stream events over HTTP

 Process control and the protocol's wire encoding are supplied by the
 caller through the [`ProcessBackend`](server::ProcessBackend) and
 [`Connector`](transport::Connector) traits.

 ## Basic Usage

 ```no_run
 use gameserver_supervisor::notify::{BroadcastSink, FanoutSink, TracingSink};
 use gameserver_supervisor::server::{ProcessBackend, ServerSupervisor};
 use gameserver_supervisor::transport::Connector;
 use gameserver_supervisor::{Result, SupervisorConfig};
 use std::sync::Arc;

 async fn run(backend: Arc<dyn ProcessBackend>, connector: Arc<dyn Connector>) -> Result<()> {
     gameserver_supervisor::init_tracing();

     let config = SupervisorConfig::from_file("supervisor.yaml")?;

     let events = BroadcastSink::new(64);
     let sink = FanoutSink::new()
         .with(Arc::new(TracingSink))
         .with(Arc::new(events.clone()));

     let supervisor = ServerSupervisor::spawn(config, backend, connector, Arc::new(sink))?;

     let reply = supervisor.request_start("ops-channel").await?;
     println!("{}", reply);

     let mut rx = events.subscribe();
     while let Ok(notification) = rx.recv().await {
         println!("{}", notification);
     }

     supervisor.shutdown().await
 }
 ```

 ## Features

 - **Idle Shutdown**: Debounced stop after the server has been empty for a while
 - **Session Management**: One protocol session with retry, timeouts and teardown
 - **Configuration**: JSON, YAML or environment variables
 - **Error Handling**: Typed errors per layer
 - **Async Support**: Full async/await support on Tokio
 - **HTTP Front End**: Start, stop, status and SSE events with bearer authentication and CORS
*/

pub mod config;
pub mod error;
pub mod frontend;
pub mod notify;
pub mod probe;
pub mod server;
pub mod transport;

pub use config::SupervisorConfig;
pub use error::{Error, Result};
pub use frontend::{FrontEnd, FrontEndHandle};
pub use server::{CommandReply, ServerState, ServerSupervisor, StatusSnapshot};

use tracing_subscriber::{EnvFilter, fmt};

/// Install a formatting subscriber filtered by `RUST_LOG`, defaulting to
/// `info`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
