//! HTTP request handlers for the front end.
//!
//! - `POST /start` and `POST /stop` forward a lifecycle command
//! - `GET /status` returns the current status snapshot
//! - `GET /events` streams lifecycle notifications as Server-Sent Events

use crate::frontend::actix_error::ApiError;
use crate::frontend::types::{CommandResponse, EventMessage};
use crate::notify::BroadcastSink;
use crate::server::{CommandReply, ServerSupervisor};

use actix_web::{HttpRequest, HttpResponse, Responder, web::Data};
use tokio::sync::broadcast::error::RecvError;

/// Header naming the channel a command originates from
pub const ORIGIN_HEADER: &str = "X-Channel-Id";

fn command_origin(req: &HttpRequest) -> Result<String, ApiError> {
    match req.headers().get(ORIGIN_HEADER) {
        Some(value) => value
            .to_str()
            .map(str::to_string)
            .map_err(|_| ApiError::InvalidRequest(format!("{} is not valid text", ORIGIN_HEADER))),
        None => Ok(String::new()),
    }
}

fn reply_response(reply: &CommandReply) -> HttpResponse {
    let body = CommandResponse::from(reply);
    match reply {
        CommandReply::Rejected { .. } => HttpResponse::Forbidden().json(body),
        _ => HttpResponse::Ok().json(body),
    }
}

/// Start the server on behalf of the calling channel
pub async fn start_server(
    supervisor: Data<ServerSupervisor>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let origin = command_origin(&req)?;
    tracing::info!(origin = %origin, "Start command received");

    let reply = supervisor.request_start(&origin).await?;
    Ok(reply_response(&reply))
}

/// Stop the server on behalf of the calling channel
pub async fn stop_server(
    supervisor: Data<ServerSupervisor>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let origin = command_origin(&req)?;
    tracing::info!(origin = %origin, "Stop command received");

    let reply = supervisor.request_stop(&origin).await?;
    Ok(reply_response(&reply))
}

/// Current status snapshot
pub async fn server_status(supervisor: Data<ServerSupervisor>) -> impl Responder {
    HttpResponse::Ok().json(supervisor.status())
}

/// Stream lifecycle notifications to the client
pub async fn event_stream(events: Data<BroadcastSink>, req: HttpRequest) -> impl Responder {
    let mut receiver = events.subscribe();
    tracing::debug!(
        path = %req.path(),
        subscribers = events.subscriber_count(),
        "Client subscribed to lifecycle events"
    );

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(notification) => {
                    let message = EventMessage::from_notification(&notification);
                    tracing::debug!(event_type = %message.event, "Sending SSE event to client");
                    yield Ok::<_, actix_web::Error>(message.to_bytes());
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber fell behind, notifications skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    HttpResponse::Ok()
        .append_header(("Content-Type", "text/event-stream"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Connection", "keep-alive"))
        .streaming(stream)
}
