/// mpv IPC driver and the video sink built on it.
///
/// Architecture:
///
/// ```text
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← receives MpvRequest via mpsc, serialises → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event / property-change   → event_tx channel
///
///   MpvSink (PlaybackSink)
///         └── forward_events ← mpv events → Signal (token-tagged)
/// ```
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use async_trait::async_trait;
use livetv_proto::protocol::MpvHealth;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

use crate::player::{PlaybackSink, Signal, SignalTx};
use crate::session::Event;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// observe_property ids.
pub const OBS_FULLSCREEN: u64 = 1;
pub const OBS_PAUSE: u64 = 2;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.event_name()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    pub fn playlist_entry_id(&self) -> Option<u64> {
        self.raw.get("playlist_entry_id")?.as_u64()
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Returns the playlist entry id of the new file when mpv reports it
    /// (0.38 and later).
    pub async fn load(&self, url: &str) -> anyhow::Result<Option<u64>> {
        debug!("mpv: loadfile {}", url);
        let reply = self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(loaded_entry_id(&reply))
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_volume(&self, vol: f32) -> anyhow::Result<()> {
        let vol_pct = (vol * 100.0).clamp(0.0, 100.0);
        self.send(json!(["set_property", "volume", vol_pct])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn set_fullscreen(&self, on: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "fullscreen", on])).await?;
        Ok(())
    }

    /// Must be called after every fresh connection.
    pub async fn observe_properties(&self) {
        for (id, name) in [(OBS_FULLSCREEN, "fullscreen"), (OBS_PAUSE, "pause")] {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

fn loaded_entry_id(reply: &Value) -> Option<u64> {
    reply.get("data")?.get("playlist_entry_id")?.as_u64()
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    pub socket_name: String,
    process: Option<tokio::process::Child>,
    pub last_volume: f32,
}

impl MpvDriver {
    pub fn new(volume: f32) -> Self {
        Self {
            socket_name: livetv_proto::platform::mpv_socket_name(),
            process: None,
            last_volume: volume,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                match status.code() {
                    Some(code) => warn!("mpv process exited with code: {}", code),
                    None => warn!("mpv process terminated by signal"),
                }
                false
            }
            Err(e) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn command(&self) -> anyhow::Result<tokio::process::Command> {
        let mpv_binary = livetv_proto::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let vol_arg = format!(
            "--volume={}",
            (self.last_volume * 100.0).clamp(0.0, 100.0).round() as i64
        );

        let stderr_path = livetv_proto::platform::data_dir().join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        info!("mpv: logging stderr to {:?}", stderr_path);

        let mut cmd = tokio::process::Command::new(&mpv_binary);
        cmd.arg("--idle=yes")
            .arg("--force-window=yes")
            .arg("--keep-open=no")
            .arg("--title=livetv")
            .arg(livetv_proto::platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(vol_arg)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true);
        Ok(cmd)
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        info!("mpv: spawning new process");
        let child = self.command()?.spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        info!("mpv: spawning new process");
        let child = self.command()?.spawn()?;
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

async fn fail_all(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else {
                    debug!("mpv reader: event {}", trimmed);
                    if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, &format!("mpv IPC read error: {}", e)).await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!(
            "mpv writer: send req={} payload={}",
            req.req_id,
            req.payload.trim()
        );
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── event → signal translation ───────────────────────────────────────────────

/// Maps mpv playlist entries to the attachment token that loaded them.
///
/// mpv announces a new entry with `start-file` before `file-loaded`; the
/// entry's `end-file` may arrive after a newer load was issued, so every
/// signal is tagged with the token of the entry it belongs to.
#[derive(Debug, Default)]
pub struct EntryTracker {
    entries: HashMap<u64, u64>,
    current_entry: Option<u64>,
}

impl EntryTracker {
    /// Bind `entry` to the token of the load that created it.  Wins over
    /// whatever a late `start-file` guessed.
    pub fn register(&mut self, entry: u64, token: u64) {
        self.entries.insert(entry, token);
    }

    /// Translate one mpv event.  `latest_token` is the token of the most
    /// recent `load`.
    pub fn translate(&mut self, evt: &MpvEvent, latest_token: u64) -> Option<Signal> {
        if let Some((id, data)) = evt.as_property_change() {
            return match id {
                OBS_FULLSCREEN => data.as_bool().map(Signal::Fullscreen),
                _ => None,
            };
        }

        match evt.event_name()? {
            "start-file" => {
                if let Some(entry) = evt.playlist_entry_id() {
                    self.entries.entry(entry).or_insert(latest_token);
                    self.current_entry = Some(entry);
                }
                None
            }
            "file-loaded" => {
                let token = self
                    .current_entry
                    .and_then(|e| self.entries.get(&e).copied())
                    .unwrap_or(latest_token);
                Some(Signal::Session(Event::SinkReady { token }))
            }
            "end-file" => {
                let token = match evt.playlist_entry_id() {
                    Some(entry) => self.entries.remove(&entry).unwrap_or(latest_token),
                    None => latest_token,
                };
                let reason = evt.raw.get("reason").and_then(|v| v.as_str())?;
                info!("mpv: end-file reason={} token={}", reason, token);
                match reason {
                    "error" => {
                        let detail = evt
                            .raw
                            .get("file_error")
                            .and_then(|v| v.as_str())
                            .unwrap_or("playback error");
                        Some(Signal::Session(Event::Fatal {
                            token,
                            reason: detail.to_string(),
                        }))
                    }
                    // A live channel never ends on its own.
                    "eof" => Some(Signal::Session(Event::Fatal {
                        token,
                        reason: "stream ended".to_string(),
                    })),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

type SharedTracker = Arc<StdMutex<EntryTracker>>;

fn lock_tracker(tracker: &SharedTracker) -> MutexGuard<'_, EntryTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn forward_events(
    mut rx: mpsc::Receiver<MpvEvent>,
    signal_tx: SignalTx,
    latest_token: Arc<AtomicU64>,
    tracker: SharedTracker,
) {
    while let Some(evt) = rx.recv().await {
        let token = latest_token.load(Ordering::Acquire);
        let signal = lock_tracker(&tracker).translate(&evt, token);
        if let Some(signal) = signal {
            if signal_tx.send(signal).is_err() {
                break;
            }
        }
    }
    // Reader gone: the IPC connection (and usually the process) died.
    let _ = signal_tx.send(Signal::Health(MpvHealth::Dead));
}

// ── sink ──────────────────────────────────────────────────────────────────────

/// Video sink backed by one mpv window.  mpv demuxes HLS itself, so native
/// playback is available unless disabled in the config.
pub struct MpvSink {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    signal_tx: SignalTx,
    native_hls: bool,
    latest_token: Arc<AtomicU64>,
    /// Entry → token map shared with the event forwarder of the current
    /// mpv process.
    tracker: SharedTracker,
    health: MpvHealth,
}

impl MpvSink {
    pub fn new(signal_tx: SignalTx, native_hls: bool, volume: f32) -> Self {
        Self {
            driver: MpvDriver::new(volume),
            handle: None,
            signal_tx,
            native_hls,
            latest_token: Arc::new(AtomicU64::new(0)),
            tracker: SharedTracker::default(),
            health: MpvHealth::Absent,
        }
    }

    fn set_health(&mut self, health: MpvHealth) {
        if self.health != health {
            info!("MpvSink: mpv health {:?} → {:?}", self.health, health);
            self.health = health.clone();
            let _ = self.signal_tx.send(Signal::Health(health));
        }
    }

    fn drop_dead_handle(&mut self) {
        if self.handle.is_some() && !self.driver.process_alive() {
            warn!("MpvSink: mpv process died, dropping handle");
            self.handle = None;
            self.set_health(MpvHealth::Dead);
        }
    }

    async fn ensure_handle(&mut self) -> anyhow::Result<MpvHandle> {
        self.drop_dead_handle();
        if let Some(h) = &self.handle {
            return Ok(h.clone());
        }

        let (event_tx, event_rx) = mpsc::channel::<MpvEvent>(64);
        self.set_health(MpvHealth::Starting);
        let handle = match self.driver.spawn_and_connect(event_tx).await {
            Ok(h) => h,
            Err(e) => {
                self.set_health(MpvHealth::Dead);
                return Err(e);
            }
        };
        // Entry ids restart with every mpv process.
        self.tracker = SharedTracker::default();
        tokio::spawn(forward_events(
            event_rx,
            self.signal_tx.clone(),
            self.latest_token.clone(),
            self.tracker.clone(),
        ));
        handle.observe_properties().await;
        self.set_health(MpvHealth::Running);
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

#[async_trait]
impl PlaybackSink for MpvSink {
    fn native_hls(&self) -> bool {
        self.native_hls
    }

    async fn load(&mut self, token: u64, url: &str) -> anyhow::Result<()> {
        let handle = self.ensure_handle().await?;
        self.latest_token.store(token, Ordering::Release);
        // Held paused until the session asks for playback.
        handle.set_pause(true).await?;
        if let Some(entry) = handle.load(url).await? {
            lock_tracker(&self.tracker).register(entry, token);
        }
        Ok(())
    }

    async fn clear(&mut self) -> anyhow::Result<()> {
        match &self.handle {
            Some(h) => h.stop().await,
            None => Ok(()),
        }
    }

    async fn start(&mut self, _token: u64) -> anyhow::Result<()> {
        let handle = self
            .handle
            .clone()
            .ok_or_else(|| anyhow::anyhow!("mpv not running"))?;
        handle.set_pause(false).await
    }

    async fn set_fullscreen(&mut self, on: bool) -> anyhow::Result<()> {
        match &self.handle {
            Some(h) => h.set_fullscreen(on).await,
            None => anyhow::bail!("mpv not running"),
        }
    }

    async fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        self.driver.last_volume = volume;
        match &self.handle {
            Some(h) => h.set_volume(volume).await,
            None => Ok(()),
        }
    }

    fn check_alive(&mut self) {
        self.drop_dead_handle();
    }

    async fn shutdown(&mut self) {
        info!("MpvSink: shutting down mpv");
        if let Some(handle) = self.handle.take() {
            let _ = handle.send(json!(["quit"])).await;
        }
        self.driver.kill().await;
        #[cfg(unix)]
        {
            let _ = tokio::fs::remove_file(&self.driver.socket_name).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn property_change_parsing() {
        let e = ev(json!({"event":"property-change","id":1,"name":"fullscreen","data":true}));
        let (id, data) = e.as_property_change().unwrap();
        assert_eq!(id, OBS_FULLSCREEN);
        assert_eq!(data, &Value::Bool(true));
        assert!(ev(json!({"event":"idle"})).as_property_change().is_none());
    }

    #[test]
    fn file_loaded_reports_ready_for_its_entry() {
        let mut t = EntryTracker::default();
        assert!(t
            .translate(&ev(json!({"event":"start-file","playlist_entry_id":4})), 7)
            .is_none());
        assert_eq!(
            t.translate(&ev(json!({"event":"file-loaded"})), 7),
            Some(Signal::Session(Event::SinkReady { token: 7 }))
        );
    }

    #[test]
    fn late_end_file_keeps_old_token() {
        let mut t = EntryTracker::default();
        t.translate(&ev(json!({"event":"start-file","playlist_entry_id":1})), 1);
        // A newer load was issued; the old entry then fails.
        let sig = t.translate(
            &ev(json!({
                "event":"end-file","reason":"error",
                "playlist_entry_id":1,"file_error":"loading failed"
            })),
            2,
        );
        assert_eq!(
            sig,
            Some(Signal::Session(Event::Fatal {
                token: 1,
                reason: "loading failed".into()
            }))
        );
    }

    #[test]
    fn registered_entry_survives_late_start_file() {
        let mut t = EntryTracker::default();
        // loadfile for token 1 replied with entry 1 ...
        t.register(1, 1);
        // ... and its start-file is only processed after token 2 was issued.
        t.translate(&ev(json!({"event":"start-file","playlist_entry_id":1})), 2);
        let sig = t.translate(
            &ev(json!({"event":"end-file","reason":"error","playlist_entry_id":1})),
            2,
        );
        assert_eq!(
            sig,
            Some(Signal::Session(Event::Fatal {
                token: 1,
                reason: "playback error".into()
            }))
        );
    }

    #[test]
    fn loadfile_reply_carries_entry_id() {
        let reply = json!({"data":{"playlist_entry_id":5},"error":"success","request_id":3});
        assert_eq!(loaded_entry_id(&reply), Some(5));
        assert_eq!(
            loaded_entry_id(&json!({"data":null,"error":"success"})),
            None
        );
    }

    #[test]
    fn stop_is_not_fatal() {
        let mut t = EntryTracker::default();
        let sig = t.translate(
            &ev(json!({"event":"end-file","reason":"stop","playlist_entry_id":3})),
            3,
        );
        assert!(sig.is_none());
    }

    #[test]
    fn fullscreen_property_becomes_signal() {
        let mut t = EntryTracker::default();
        let sig = t.translate(
            &ev(json!({"event":"property-change","id":1,"name":"fullscreen","data":false})),
            0,
        );
        assert_eq!(sig, Some(Signal::Fullscreen(false)));
    }
}
