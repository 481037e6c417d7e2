use std::path::PathBuf;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::builder::BoolishValueParser;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use ghosthunt_server::config::GameSettings;
use ghosthunt_server::constants::{MAZE_HEIGHT, MAZE_WIDTH, OUTBOUND_QUEUE_CAPACITY};
use ghosthunt_server::engine::GameEngine;
use ghosthunt_server::hub::{Hub, HubHandle};
use ghosthunt_server::server_protocol::parse_client_message;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    #[arg(long, env = "GHOSTHUNT_WIDTH", default_value_t = MAZE_WIDTH)]
    width: i32,
    #[arg(long, env = "GHOSTHUNT_HEIGHT", default_value_t = MAZE_HEIGHT)]
    height: i32,
    /// Drop client-reported outcomes; only heading intents reach the simulation.
    #[arg(
        long,
        env = "GHOSTHUNT_AUTHORITATIVE",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    authoritative: bool,
    /// Fixed seed for maze generation and ghost decisions.
    #[arg(long)]
    seed: Option<u32>,
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

#[derive(Clone)]
struct AppState {
    hub: HubHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = GameSettings::with_dimensions(cli.width, cli.height)
        .context("invalid maze dimensions")?;
    settings.trust_client_reports = !cli.authoritative;

    let seed = cli.seed.unwrap_or_else(rand::random);
    let engine = GameEngine::new(settings, seed).context("failed to generate the first maze")?;
    info!(
        seed,
        width = cli.width,
        height = cli.height,
        authoritative = cli.authoritative,
        "game engine ready"
    );
    let hub = Hub::new(engine, rand::random()).spawn();

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .with_state(AppState { hub });

    let app = if let Some(static_dir) = resolve_static_dir(cli.static_dir) {
        let index_file = static_dir.join("index.html");
        info!(root = %static_dir.display(), "serving static files");
        app.fallback_service(ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)))
    } else {
        warn!("static file root not found; serving the websocket endpoint only");
        app
    };

    let bind_addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!(port = cli.port, "listening");
    axum::serve(listener, app)
        .await
        .context("server runtime failed")?;
    Ok(())
}

fn resolve_static_dir(configured: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.join("index.html").is_file() {
            return Some(path);
        }
        warn!(path = %path.display(), "configured static dir has no index.html");
    }
    [PathBuf::from("static"), PathBuf::from("dist/client")]
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let players = state.hub.player_count().await;
    Json(json!({ "ok": true, "players": players }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);
    let Some(player_id) = state.hub.connect(tx).await else {
        warn!("hub unavailable; closing socket");
        return;
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // The writer ends when the hub drops this client, e.g. on a full queue.
    loop {
        tokio::select! {
            received = ws_receiver.next() => {
                let Some(Ok(message)) = received else {
                    break;
                };
                match message {
                    Message::Text(raw) => forward_frame(&state.hub, &player_id, raw.as_str()).await,
                    Message::Binary(raw) => match std::str::from_utf8(&raw) {
                        Ok(text) => forward_frame(&state.hub, &player_id, text).await,
                        Err(_) => debug!(player = %player_id, "dropping non-utf8 frame"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = &mut writer => break,
        }
    }

    state.hub.disconnect(player_id).await;
    if !writer.is_finished() {
        let _ = writer.await;
    }
}

async fn forward_frame(hub: &HubHandle, player_id: &str, raw: &str) {
    match parse_client_message(raw) {
        Some(message) => hub.send(player_id.to_string(), message).await,
        None => debug!(player = %player_id, "dropping invalid frame"),
    }
}
