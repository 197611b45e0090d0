mod common;

use actix_web::body::MessageBody;
use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use common::{FakeBackend, RecordingSink, ScriptedConnector, players, supervisor_config};
use futures::future::poll_fn;
use gameserver_supervisor::config::{HttpConfig, SupervisorConfig};
use gameserver_supervisor::frontend::auth::Authentication;
use gameserver_supervisor::frontend::{self, CommandResponse, FrontEnd};
use gameserver_supervisor::notify::{BroadcastSink, LifecycleEvent, Notification, NotificationSink};
use gameserver_supervisor::server::{ServerState, ServerSupervisor};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn quick_config() -> SupervisorConfig {
    let mut config = supervisor_config(Duration::from_secs(600));
    config.confirmation_window = Duration::from_millis(10);
    config.command.channel_id = Some("ops".to_string());
    config
}

fn spawn_supervisor(backend: Arc<FakeBackend>) -> ServerSupervisor {
    ServerSupervisor::spawn(
        quick_config(),
        backend,
        Arc::new(ScriptedConnector::with_fallback(players(1))),
        RecordingSink::new(),
    )
    .unwrap()
}

#[actix_web::test]
async fn test_status_reports_snapshot() {
    let supervisor = spawn_supervisor(FakeBackend::new());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(supervisor.clone()))
            .app_data(web::Data::new(BroadcastSink::new(8)))
            .configure(frontend::routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["server"], "Minecraft");
    assert_eq!(body["state"], "stopped");
    assert_eq!(body["idle_countdown_armed"], false);
}

#[actix_web::test]
async fn test_start_from_allowed_channel() {
    let backend = FakeBackend::new();
    let supervisor = spawn_supervisor(backend.clone());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(supervisor.clone()))
            .app_data(web::Data::new(BroadcastSink::new(8)))
            .configure(frontend::routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/start")
        .insert_header(("X-Channel-Id", "ops"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: CommandResponse = test::read_body_json(resp).await;
    assert_eq!(body.reply, "started");
    assert_eq!(supervisor.state(), ServerState::Running);
    assert_eq!(backend.start_calls(), 1);

    supervisor.shutdown().await.unwrap();
}

#[actix_web::test]
async fn test_command_from_other_channel_is_forbidden() {
    let backend = FakeBackend::new();
    let supervisor = spawn_supervisor(backend.clone());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(supervisor.clone()))
            .app_data(web::Data::new(BroadcastSink::new(8)))
            .configure(frontend::routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/start")
        .insert_header(("X-Channel-Id", "general"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body: CommandResponse = test::read_body_json(resp).await;
    assert_eq!(body.reply, "rejected");
    assert!(body.message.contains("ops"));

    // Missing header is no better
    let req = test::TestRequest::post().uri("/stop").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    assert_eq!(backend.start_calls(), 0);
    assert_eq!(supervisor.state(), ServerState::Stopped);
}

#[actix_web::test]
async fn test_stop_when_not_running() {
    let supervisor = spawn_supervisor(FakeBackend::new());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(supervisor.clone()))
            .app_data(web::Data::new(BroadcastSink::new(8)))
            .configure(frontend::routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/stop")
        .insert_header(("X-Channel-Id", "ops"))
        .to_request();
    let body: CommandResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body.reply, "not_running");
    assert_eq!(body.message, "Server is not running.");
}

#[actix_web::test]
async fn test_bearer_token_is_required_when_configured() {
    let supervisor = spawn_supervisor(FakeBackend::new());
    let http = Arc::new(HttpConfig {
        token: Some("letmein".to_string()),
        ..HttpConfig::default()
    });
    let app = test::init_service(
        App::new()
            .wrap(Authentication::new(http))
            .app_data(web::Data::new(supervisor.clone()))
            .app_data(web::Data::new(BroadcastSink::new(8)))
            .configure(frontend::routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/status").to_request();
    let err = test::try_call_service(&app, req)
        .await
        .err()
        .expect("request without token should be refused");
    assert_eq!(
        err.as_response_error().status_code(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::get()
        .uri("/status")
        .insert_header(("Authorization", "Bearer letmein"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_events_stream_lifecycle_notifications() {
    let supervisor = spawn_supervisor(FakeBackend::new());
    let events = BroadcastSink::new(8);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(supervisor.clone()))
            .app_data(web::Data::new(events.clone()))
            .configure(frontend::routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/events").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(events.subscriber_count(), 1);

    events.notify(&Notification::new(
        "Minecraft".to_string(),
        LifecycleEvent::StoppedIdle,
    ));

    let body = resp.into_body();
    let mut body = std::pin::pin!(body);
    let chunk = tokio::time::timeout(
        Duration::from_secs(5),
        poll_fn(|cx| body.as_mut().poll_next(cx)),
    )
    .await
    .unwrap()
    .unwrap()
    .unwrap();

    let text = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(text.contains("event: stopped_idle\n"));
    assert!(text.contains("data: "));
    assert!(text.ends_with("\n\n"));

    supervisor.shutdown().await.unwrap();
}

#[actix_web::test]
async fn test_front_end_serves_until_shut_down() {
    let supervisor = spawn_supervisor(FakeBackend::new());
    let config = HttpConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        workers: Some(1),
        token: None,
    };

    let handle = FrontEnd::start(supervisor.clone(), BroadcastSink::new(8), config).unwrap();
    let addr = handle.local_addrs()[0];
    assert_ne!(addr.port(), 0);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /status HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .unwrap()
        .unwrap();
    let response = String::from_utf8_lossy(&raw);
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""state":"stopped""#));

    handle.shutdown().await.unwrap();
    // A second shutdown finds nothing left to join
    handle.shutdown().await.unwrap();

    supervisor.shutdown().await.unwrap();
}
