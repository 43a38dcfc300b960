mod action;
mod app;
mod app_state;
mod component;
mod components;
mod core;
mod engine;
mod http;
mod mpv;
mod navigation;
mod player;
mod session;
mod theme;
mod widgets;

use std::sync::Arc;
use std::time::Duration;

use livetv_proto::loader::PlaylistLoader;
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = livetv_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("livetv.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("livetv log: {}", log_path.display());

    tracing::info!("livetv starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = livetv_proto::config::Config::load().unwrap_or_default();

    // ── Broadcast channel (PlayerCore → TUI) ─────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<core::BroadcastMessage>(1024);

    // ── CoreEvent channel (TUI/HTTP → PlayerCore) ────────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<core::CoreEvent>(1024);

    // ── Signals (sink/engine → PlayerCore) ───────────────────────────────────
    let (signal_tx, signal_rx) = mpsc::unbounded_channel::<player::Signal>();

    // ── Remote actions (HTTP → App) ──────────────────────────────────────────
    let (action_tx, action_rx) = mpsc::channel::<action::Action>(64);

    // ── Build PlayerCore ─────────────────────────────────────────────────────
    let sink = mpv::MpvSink::new(
        signal_tx.clone(),
        config.player.native_hls,
        config.player.volume,
    );
    let factory = engine::FfmpegEngineFactory::new(
        livetv_proto::platform::find_ffmpeg_binary(),
        config.engine.clone(),
        signal_tx,
    );
    let store = Arc::new(core::StateStore::default());
    let player_core = core::PlayerCore::new(
        player::SessionDriver::new(sink, factory),
        store.clone(),
        broadcast_tx,
        event_tx.clone(),
        config.player.volume,
    );

    // ── Spawn PlayerCore event loop ──────────────────────────────────────────
    let core_task = tokio::spawn(async move {
        if let Err(e) = player_core.run(event_rx, signal_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    // ── HTTP server ──────────────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            store.clone(),
            event_tx.clone(),
            action_tx,
        );
    } else {
        drop(action_tx);
    }

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let loader = PlaylistLoader::with_timeout(
        config.playlist.sources.clone(),
        Duration::from_secs(config.playlist.timeout_secs),
    )?;
    let app = app::App::new(loader, event_tx.clone(), store, config.player.volume);
    let result = app.run(broadcast_rx, action_rx).await;

    // Tear the session down even when the UI failed.
    let _ = event_tx.send(core::CoreEvent::Shutdown).await;
    let _ = core_task.await;
    tracing::info!("livetv stopped");

    result
}
