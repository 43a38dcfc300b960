//! ffmpeg streaming engine and its local relay.
//!
//! Each engine runs one ffmpeg process that remuxes an HLS manifest to
//! MPEG-TS on stdout.  A pump task fans the output out over a broadcast
//! channel; the relay serves it at `/relay/:token` so the sink can open it
//! like any other URL.  The last `back_buffer_secs` of output are kept and
//! replayed to a subscriber that connects after the stream started.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use livetv_proto::config::EngineConfig;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::player::{Engine, EngineFactory, Signal, SignalTx};
use crate::session::Event;

pub const RELAY_HOST: &str = "127.0.0.1";
const RELAY_BROADCAST_CAPACITY: usize = 1024;
const READ_CHUNK: usize = 64 * 1024;
/// Hard cap on the trailing buffer regardless of its time window.
const BACK_BUFFER_MAX_BYTES: usize = 64 * 1024 * 1024;

// ── trailing buffer ───────────────────────────────────────────────────────────

/// Time-bounded window of recent output chunks.
#[derive(Debug)]
pub struct BackBuffer {
    window: Duration,
    chunks: VecDeque<(Instant, Bytes)>,
    bytes: usize,
}

impl BackBuffer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            chunks: VecDeque::new(),
            bytes: 0,
        }
    }

    pub fn push(&mut self, now: Instant, chunk: Bytes) {
        if self.window.is_zero() {
            return;
        }
        self.bytes += chunk.len();
        self.chunks.push_back((now, chunk));
        self.trim(now);
    }

    fn trim(&mut self, now: Instant) {
        while let Some((at, chunk)) = self.chunks.front() {
            let expired = now.saturating_duration_since(*at) > self.window;
            if !expired && self.bytes <= BACK_BUFFER_MAX_BYTES {
                break;
            }
            self.bytes -= chunk.len();
            self.chunks.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<Bytes> {
        self.chunks.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn len_bytes(&self) -> usize {
        self.bytes
    }
}

// ── relay ─────────────────────────────────────────────────────────────────────

pub struct Feed {
    tx: broadcast::Sender<Bytes>,
    backlog: Mutex<BackBuffer>,
}

impl Feed {
    fn new(window: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(RELAY_BROADCAST_CAPACITY);
        Self {
            tx,
            backlog: Mutex::new(BackBuffer::new(window)),
        }
    }

    /// Record and fan out one chunk.  Backlog and broadcast are updated under
    /// the same lock so a new subscriber sees every chunk exactly once.
    pub async fn publish(&self, chunk: Bytes) {
        let mut backlog = self.backlog.lock().await;
        backlog.push(Instant::now(), chunk.clone());
        let _ = self.tx.send(chunk);
    }

    async fn subscribe(&self) -> (Vec<Bytes>, broadcast::Receiver<Bytes>) {
        let backlog = self.backlog.lock().await;
        (backlog.snapshot(), self.tx.subscribe())
    }
}

#[derive(Clone, Default)]
pub struct RelayState {
    feeds: Arc<Mutex<HashMap<u64, Arc<Feed>>>>,
}

impl RelayState {
    pub async fn register(&self, token: u64, window: Duration) -> Arc<Feed> {
        let feed = Arc::new(Feed::new(window));
        self.feeds.lock().await.insert(token, feed.clone());
        feed
    }

    pub async fn unregister(&self, token: u64) {
        self.feeds.lock().await.remove(&token);
    }

    async fn get(&self, token: u64) -> Option<Arc<Feed>> {
        self.feeds.lock().await.get(&token).cloned()
    }
}

async fn stream_relay(Path(token): Path<u64>, State(state): State<RelayState>) -> Response {
    let Some(feed) = state.get(token).await else {
        debug!("relay: no feed for token={}", token);
        return StatusCode::NOT_FOUND.into_response();
    };
    let (backlog, rx) = feed.subscribe().await;
    info!(
        "relay: subscriber for token={}, replaying {} chunks",
        token,
        backlog.len()
    );
    drop(feed);

    let replay = futures_util::stream::iter(backlog.into_iter().map(Ok::<Bytes, std::io::Error>));
    let live = futures_util::stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(chunk) => return Some((Ok::<Bytes, std::io::Error>(chunk), rx)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("relay: subscriber token={} lagged by {} chunks", token, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("relay: feed token={} closed", token);
                    return None;
                }
            }
        }
    });

    (
        [(header::CONTENT_TYPE, "video/mp2t")],
        Body::from_stream(futures_util::StreamExt::chain(replay, live)),
    )
        .into_response()
}

pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/relay/:token", get(stream_relay))
        .with_state(state)
}

/// Bind the relay and serve it in the background.
pub async fn start_relay(state: RelayState, port: u16) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind((RELAY_HOST, port)).await?;
    let addr = listener.local_addr()?;
    info!("Engine relay listening on http://{}", addr);
    let app = relay_router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Engine relay error: {}", e);
        }
    });
    Ok(addr)
}

// ── ffmpeg ────────────────────────────────────────────────────────────────────

pub fn ffmpeg_args(manifest_url: &str, config: &EngineConfig) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    // ffmpeg waits forever on a stalled host unless told otherwise (µs).
    if config.io_timeout_secs > 0 {
        args.push("-rw_timeout".to_string());
        args.push((config.io_timeout_secs * 1_000_000).to_string());
    }
    if config.low_latency {
        args.extend(
            ["-fflags", "nobuffer", "-flags", "low_delay"]
                .iter()
                .map(|s| s.to_string()),
        );
    }
    args.extend(
        [
            "-i",
            manifest_url,
            "-map",
            "0:v?",
            "-map",
            "0:a?",
            "-c",
            "copy",
            "-f",
            "mpegts",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

/// Run ffmpeg until it exits, publishing its stdout into `feed`.  Returns
/// the reason the stream stopped.
async fn pump(
    ffmpeg: PathBuf,
    args: Vec<String>,
    token: u64,
    feed: Arc<Feed>,
    signal_tx: SignalTx,
) -> anyhow::Result<String> {
    let mut child = tokio::process::Command::new(ffmpeg)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("ffmpeg stdout not captured"))?;
    let stderr = child.stderr.take();
    let last_error = tokio::spawn(async move {
        let mut last = String::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("ffmpeg[{}]: {}", token, line);
                last = line;
            }
        }
        last
    });

    let mut buf = vec![0u8; READ_CHUNK];
    let mut total: u64 = 0;
    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if total == 0 {
            info!("engine[{}]: manifest parsed, first output chunk", token);
            let _ = signal_tx.send(Signal::Session(Event::ManifestParsed { token }));
        }
        total += n as u64;
        feed.publish(Bytes::copy_from_slice(&buf[..n])).await;
    }

    let status = child.wait().await?;
    let detail = last_error.await.unwrap_or_default();
    info!(
        "engine[{}]: ffmpeg exited {} after {} bytes",
        token, status, total
    );
    Ok(if !status.success() {
        if detail.is_empty() {
            format!("ffmpeg exited: {}", status)
        } else {
            detail
        }
    } else {
        "stream ended".to_string()
    })
}

pub struct FfmpegEngine {
    token: u64,
    output_url: String,
    task: Option<tokio::task::JoinHandle<()>>,
    relay: RelayState,
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn output_url(&self) -> &str {
        &self.output_url
    }

    async fn dispose(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // The aborted task drops the child, which kills ffmpeg.
            let _ = task.await;
        }
        self.relay.unregister(self.token).await;
        debug!("engine[{}]: disposed", self.token);
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct FfmpegEngineFactory {
    ffmpeg: Option<PathBuf>,
    config: EngineConfig,
    signal_tx: SignalTx,
    relay: RelayState,
    relay_addr: Option<SocketAddr>,
}

impl FfmpegEngineFactory {
    pub fn new(ffmpeg: Option<PathBuf>, config: EngineConfig, signal_tx: SignalTx) -> Self {
        match &ffmpeg {
            Some(p) => info!("Engine: using ffmpeg at {}", p.display()),
            None => info!("Engine: ffmpeg not found, engine playback unavailable"),
        }
        Self {
            ffmpeg,
            config,
            signal_tx,
            relay: RelayState::default(),
            relay_addr: None,
        }
    }

    async fn relay_addr(&mut self) -> anyhow::Result<SocketAddr> {
        if let Some(addr) = self.relay_addr {
            return Ok(addr);
        }
        let addr = start_relay(self.relay.clone(), self.config.relay_port).await?;
        self.relay_addr = Some(addr);
        Ok(addr)
    }
}

#[async_trait]
impl EngineFactory for FfmpegEngineFactory {
    type Engine = FfmpegEngine;

    fn available(&self) -> bool {
        self.ffmpeg.is_some()
    }

    async fn create(&mut self, token: u64, manifest_url: &str) -> anyhow::Result<FfmpegEngine> {
        let ffmpeg = self
            .ffmpeg
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ffmpeg not available"))?;
        let addr = self.relay_addr().await?;

        let window = Duration::from_secs(self.config.back_buffer_secs);
        let feed = self.relay.register(token, window).await;
        let args = ffmpeg_args(manifest_url, &self.config);
        let signal_tx = self.signal_tx.clone();

        let task = tokio::spawn(async move {
            let reason = match pump(ffmpeg, args, token, feed, signal_tx.clone()).await {
                Ok(reason) => reason,
                Err(e) => e.to_string(),
            };
            let _ = signal_tx.send(Signal::Session(Event::Fatal { token, reason }));
        });

        Ok(FfmpegEngine {
            token,
            output_url: format!("http://{}/relay/{}", addr, token),
            task: Some(task),
            relay: self.relay.clone(),
        })
    }
}
