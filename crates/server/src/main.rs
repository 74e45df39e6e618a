mod connection;
mod error;
mod handler;
mod metrics;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;

use connection::Connection;
use error::SessionError;
use handler::SessionHandler;
use metrics::{HealthResponse, Metrics};

#[derive(Parser)]
#[command(name = "orbit-server")]
#[command(about = "Authoritative orbit game server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Repeatable. Empty means unrestricted (current documented default).
    #[arg(long = "allowed-origin")]
    allowed_origin: Vec<String>,
}

struct AppState {
    metrics: Arc<Metrics>,
    started_at: Instant,
    allowed_origins: Vec<String>,
    next_connection_id: AtomicU64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.allowed_origin.is_empty() {
        log::info!("no --allowed-origin configured; accepting connections from any origin");
    } else {
        log::info!("restricting connections to origins: {:?}", args.allowed_origin);
    }

    let state = Arc::new(AppState {
        metrics: Arc::new(Metrics::default()),
        started_at: Instant::now(),
        allowed_origins: args.allowed_origin,
        next_connection_id: AtomicU64::new(1),
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(health_handler))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("orbit server listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    log::info!("shutdown signal received");
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse::build(&state.metrics, state.started_at))
}

fn origin_allowed(state: &AppState, headers: &HeaderMap) -> bool {
    if state.allowed_origins.is_empty() {
        return true;
    }
    let Some(origin) = headers.get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    state.allowed_origins.iter().any(|allowed| allowed == origin)
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if !origin_allowed(&state, &headers) {
        let origin = headers
            .get(axum::http::header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<missing>");
        log::warn!("rejecting connection from disallowed origin {origin}");
        return StatusCode::FORBIDDEN.into_response();
    }

    let conn_id = state.next_connection_id.fetch_add(1, Ordering::SeqCst);
    ws.write_buffer_size(orbit::WRITE_BUFFER)
        .on_upgrade(move |socket| handle_socket(socket, state, conn_id))
        .into_response()
}

/// Drives one connection end to end: splits the socket, runs the
/// session's tick/broadcast tasks, and pumps inbound text frames into the
/// handler until the peer disconnects or the read deadline expires (C7, C8).
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, conn_id: u64) {
    let (conn, mut reader, writer_handle) = Connection::spawn(socket);
    let handler = Arc::new(SessionHandler::new(conn.clone(), state.metrics.clone()));

    log::info!("conn[{conn_id}] connected");

    let (tick_driver, broadcaster) = handler.start();

    let watchdog = {
        let conn = conn.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            loop {
                interval.tick().await;
                if conn.is_closed() {
                    break;
                }
                if conn.is_read_deadline_expired() {
                    log::warn!("conn[{conn_id}] read deadline expired; closing");
                    handler.stop();
                    break;
                }
            }
        })
    };

    if let Err(err) = run_connection(&conn, &mut reader, &handler).await {
        log::warn!("conn[{conn_id}] {err}");
    }

    handler.stop();
    tick_driver.abort();
    broadcaster.abort();
    watchdog.abort();
    let _ = writer_handle.writer_task.await;
    log::info!(
        "conn[{conn_id}] closed, active={}",
        state.metrics.snapshot().active_connections
    );
}

/// Reads frames until the peer disconnects or sends something the reader
/// rejects outright (a non-text frame). Per-message validation failures are
/// handled inside `handle_text` itself and never reach this `Result`.
async fn run_connection(
    conn: &Connection,
    reader: &mut connection::ConnectionReader,
    handler: &Arc<SessionHandler>,
) -> Result<(), SessionError> {
    loop {
        match reader.read_message(conn).await {
            Some(Ok(text)) => handler.handle_text(&text).await,
            Some(Err(err)) => return Err(err.into()),
            None => return Ok(()),
        }
    }
}
