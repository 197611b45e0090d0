//! HTTP command front end built on Actix Web.
//!
//! Exposes the supervisor's commands to remote callers:
//! - `POST /start`, `POST /stop`: the calling channel goes in the
//!   `X-Channel-Id` header; a channel that may not issue commands gets 403
//! - `GET /status`: the current [`StatusSnapshot`](crate::server::StatusSnapshot)
//! - `GET /events`: lifecycle notifications as Server-Sent Events
//!
//! When `http.token` is configured every request must carry it as a bearer
//! token.

pub mod actix_error;
pub mod auth;
pub mod handlers;
pub mod types;

pub use self::types::{CommandResponse, EventMessage};

use crate::config::{DEFAULT_WORKERS, HttpConfig};
use crate::error::{Error, Result};
use crate::frontend::auth::Authentication;
use crate::notify::BroadcastSink;
use crate::server::ServerSupervisor;

use actix_cors::Cors;
use actix_web::{
    App, HttpServer,
    dev::ServerHandle,
    middleware,
    web::{self, Data},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Register the front end routes on an Actix service config.
///
/// The app must provide `Data<ServerSupervisor>` and `Data<BroadcastSink>`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/start", web::post().to(handlers::start_server))
        .route("/stop", web::post().to(handlers::stop_server))
        .route("/status", web::get().to(handlers::server_status))
        .route("/events", web::get().to(handlers::event_stream));
}

/// Handle for controlling a running front end
#[derive(Clone)]
pub struct FrontEndHandle {
    /// Actix server control
    server: ServerHandle,
    /// Server task
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// Bound addresses
    addrs: Vec<SocketAddr>,
}

impl FrontEndHandle {
    /// Addresses the front end is listening on
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Stop accepting connections and wait for the server to finish
    pub async fn shutdown(&self) -> Result<()> {
        self.server.stop(true).await;

        let mut task = self.task.lock().await;
        if let Some(h) = task.take() {
            match tokio::time::timeout(Duration::from_secs(5), h).await {
                Ok(Err(e)) => tracing::warn!("Error while joining front end task: {}", e),
                Ok(Ok(())) => {}
                Err(_) => tracing::warn!("Timeout waiting for front end task to finish"),
            }
        }

        tracing::info!("HTTP front end shut down");
        Ok(())
    }
}

/// The HTTP front end
pub struct FrontEnd;

impl FrontEnd {
    /// Bind and start serving.
    ///
    /// `events` should be the same sink (or a member of the fan-out) the
    /// supervisor notifies, so `/events` sees its notifications.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if the address cannot be bound.
    #[tracing::instrument(skip_all, fields(address = %config.address, port = config.port))]
    pub fn start(
        supervisor: ServerSupervisor,
        events: BroadcastSink,
        config: HttpConfig,
    ) -> Result<FrontEndHandle> {
        let addr = format!("{}:{}", config.address, config.port);
        let workers = config.workers.unwrap_or(DEFAULT_WORKERS);
        let config = Arc::new(config);

        let supervisor = Data::new(supervisor);
        let events = Data::new(events);

        let server = HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(middleware::Logger::default())
                .wrap(cors)
                .wrap(Authentication::new(config.clone()))
                .app_data(supervisor.clone())
                .app_data(events.clone())
                .configure(routes)
        })
        .workers(workers)
        .bind(&addr)
        .map_err(|e| Error::Other(format!("Failed to bind {}: {}", addr, e)))?;

        let addrs = server.addrs();
        let server = server.run();
        let handle = server.handle();

        let task = tokio::spawn(async move {
            if let Err(e) = server.await {
                tracing::error!(error = %e, "HTTP front end error");
            }
        });

        tracing::info!(workers, addrs = ?addrs, "HTTP front end started");

        Ok(FrontEndHandle {
            server: handle,
            task: Arc::new(Mutex::new(Some(task))),
            addrs,
        })
    }
}
