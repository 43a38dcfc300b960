/// PlayerCore: single-owner event loop for playback state.
///
/// Runs embedded in the TUI process.  The App and the HTTP API send
/// `CoreEvent`s; the sink and the engine send `Signal`s.  PlayerCore owns the
/// `SessionDriver` (and through it the sink and the engine) exclusively; no
/// other task touches them.
///
/// After every event that changes the published `PlayerState`, the core
/// writes it to the shared `StateStore` and broadcasts
/// `BroadcastMessage::StateUpdated` to all listeners.
use std::sync::Arc;

use livetv_proto::protocol::{Channel, Command, MpvHealth, PlayerState};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::navigation::FullscreenControl;
use crate::player::{EngineFactory, Notice, PlaybackSink, SessionDriver, Signal, SignalRx};
use crate::session::{Event, Mode, Phase};

#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// Fresh snapshot of the player state.
    StateUpdated(PlayerState),
}

/// All inputs into the PlayerCore loop besides sink/engine signals.
#[derive(Debug)]
pub enum CoreEvent {
    /// A command from the TUI or HTTP API.
    ClientCommand(Command),
    /// Heartbeat: check sink liveness.
    HeartbeatTick,
    Shutdown,
}

/// Shared read-side of the app: the player snapshot plus the loaded channel
/// list.  Written by PlayerCore (player) and the App (channels).
#[derive(Default)]
pub struct StateStore {
    player: RwLock<PlayerState>,
    channels: RwLock<Vec<Channel>>,
}

impl StateStore {
    pub async fn player(&self) -> PlayerState {
        self.player.read().await.clone()
    }

    pub async fn channels(&self) -> Vec<Channel> {
        self.channels.read().await.clone()
    }

    pub async fn set_channels(&self, channels: Vec<Channel>) {
        *self.channels.write().await = channels;
    }

    async fn set_player(&self, state: PlayerState) {
        *self.player.write().await = state;
    }
}

pub struct PlayerCore<S: PlaybackSink, F: EngineFactory> {
    driver: SessionDriver<S, F>,
    store: Arc<StateStore>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    event_tx: mpsc::Sender<CoreEvent>,
    state: PlayerState,
}

impl<S: PlaybackSink, F: EngineFactory> PlayerCore<S, F> {
    pub fn new(
        driver: SessionDriver<S, F>,
        store: Arc<StateStore>,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<CoreEvent>,
        volume: f32,
    ) -> Self {
        Self {
            driver,
            store,
            broadcast_tx,
            event_tx,
            state: PlayerState {
                volume,
                ..PlayerState::default()
            },
        }
    }

    /// Run until `Shutdown` or until every sender is gone.  Always tears the
    /// session down on the way out.
    pub async fn run(
        mut self,
        mut event_rx: mpsc::Receiver<CoreEvent>,
        mut signal_rx: SignalRx,
    ) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");

        let heartbeat_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                if heartbeat_tx.send(CoreEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        self.publish().await;

        loop {
            tokio::select! {
                evt = event_rx.recv() => match evt {
                    None => {
                        info!("PlayerCore: event channel closed, shutting down");
                        break;
                    }
                    Some(CoreEvent::Shutdown) => {
                        info!("PlayerCore: shutdown requested");
                        break;
                    }
                    Some(CoreEvent::ClientCommand(cmd)) => {
                        info!("PlayerCore: command {:?}", cmd);
                        if let Err(e) = self.handle_command(cmd).await {
                            error!("PlayerCore: command error: {}", e);
                        }
                    }
                    Some(CoreEvent::HeartbeatTick) => {
                        self.driver.sink_mut().check_alive();
                    }
                },
                Some(signal) = signal_rx.recv() => {
                    self.handle_signal(signal).await;
                }
            }
        }

        self.driver.shutdown().await;
        self.sync_from_session(Vec::new());
        self.publish().await;
        Ok(())
    }

    async fn handle_command(&mut self, cmd: Command) -> anyhow::Result<()> {
        match cmd {
            Command::Select { channel } => {
                info!("PlayerCore: select '{}' ({})", channel.name, channel.url);
                self.state.autoplay_blocked = None;
                let notices = self.driver.handle(Event::Select(channel)).await;
                self.sync_from_session(notices);
            }
            Command::Retry => {
                let notices = self.driver.handle(Event::Retry).await;
                self.sync_from_session(notices);
            }
            Command::Stop => {
                let notices = self.driver.handle(Event::Deselect).await;
                self.state.autoplay_blocked = None;
                self.sync_from_session(notices);
            }
            Command::SetFullscreen { on } => {
                self.driver.sink_mut().set_fullscreen(on).await?;
                // mpv confirms through the fullscreen property; this is the
                // optimistic value until then.
                self.state.fullscreen = on;
            }
            Command::Volume { value } => {
                let value = value.clamp(0.0, 1.0);
                self.driver.sink_mut().set_volume(value).await?;
                self.state.volume = value;
            }
        }
        self.publish().await;
        Ok(())
    }

    async fn handle_signal(&mut self, signal: Signal) {
        debug!("PlayerCore: signal {:?}", signal);
        match signal {
            Signal::Session(event) => {
                let notices = self.driver.handle(event).await;
                self.sync_from_session(notices);
            }
            Signal::Fullscreen(on) => {
                if self.state.fullscreen == on {
                    return;
                }
                self.state.fullscreen = on;
            }
            Signal::Health(health) => {
                if self.state.mpv_health == health {
                    return;
                }
                let died = health == MpvHealth::Dead;
                self.state.mpv_health = health;
                if died {
                    self.fail_current("player window closed").await;
                }
            }
        }
        self.publish().await;
    }

    /// Fail whatever is attached, as if the sink had reported a fatal error.
    async fn fail_current(&mut self, reason: &str) {
        let phase = &self.driver.state().phase;
        if !matches!(phase, Phase::Attaching(_) | Phase::Playing(_)) {
            return;
        }
        let Some(token) = phase.token() else {
            return;
        };
        warn!("PlayerCore: {} while attached, failing session", reason);
        let notices = self
            .driver
            .handle(Event::Fatal {
                token,
                reason: reason.to_string(),
            })
            .await;
        self.sync_from_session(notices);
    }

    fn sync_from_session(&mut self, notices: Vec<Notice>) {
        let phase = &self.driver.state().phase;
        self.state.channel = phase.channel().cloned();
        self.state.status = phase.status();
        self.state.error = phase.error().map(str::to_string);
        self.state.via_engine = match phase {
            Phase::Attaching(a) | Phase::Playing(a) => a.mode == Mode::Engine,
            Phase::Failed { mode, .. } => *mode == Some(Mode::Engine),
            Phase::Idle => false,
        };
        for notice in notices {
            if let Notice::AutoplayBlocked(reason) = notice {
                self.state.autoplay_blocked = Some(reason);
            }
        }
    }

    async fn publish(&mut self) {
        self.state.rev += 1;
        self.store.set_player(self.state.clone()).await;
        let _ = self
            .broadcast_tx
            .send(BroadcastMessage::StateUpdated(self.state.clone()));
    }
}

/// Fullscreen control that routes requests through the core to the sink.
pub struct CoreFullscreen<'a> {
    pub current: bool,
    pub event_tx: &'a mpsc::Sender<CoreEvent>,
}

impl FullscreenControl for CoreFullscreen<'_> {
    fn is_fullscreen(&self) -> bool {
        self.current
    }

    fn request_fullscreen(&mut self, on: bool) {
        let cmd = Command::SetFullscreen { on };
        if let Err(e) = self.event_tx.try_send(CoreEvent::ClientCommand(cmd)) {
            warn!("fullscreen request dropped: {}", e);
        }
    }
}
