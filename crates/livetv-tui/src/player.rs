//! SessionDriver: runs `session::transition` effects against a real sink and
//! streaming engine.
//!
//! The driver is the only owner of the sink and of the engine instance.
//! Effects of one transition run strictly in order and each one is awaited,
//! so the previous engine is fully disposed before the next one is built.
//!
//! Sinks and engines report back asynchronously through `Signal`s that the
//! player core feeds into `SessionDriver::handle`.

use std::collections::VecDeque;

use async_trait::async_trait;
use livetv_proto::protocol::MpvHealth;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::session::{self, Caps, Effect, Event, SessionState};

/// Unsolicited reports from the sink or the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Token-tagged lifecycle event for the session machine.
    Session(Event),
    /// The sink changed its fullscreen state.
    Fullscreen(bool),
    Health(MpvHealth),
}

pub type SignalTx = mpsc::UnboundedSender<Signal>;
pub type SignalRx = mpsc::UnboundedReceiver<Signal>;

#[async_trait]
pub trait PlaybackSink: Send {
    /// The sink plays adaptive manifests without an engine.
    fn native_hls(&self) -> bool;

    /// Open `url`.  Readiness is reported later as `Event::SinkReady`.
    async fn load(&mut self, token: u64, url: &str) -> anyhow::Result<()>;

    /// Drop whatever is loaded.
    async fn clear(&mut self) -> anyhow::Result<()>;

    /// Begin playback.  An error means playback start was refused.
    async fn start(&mut self, token: u64) -> anyhow::Result<()>;

    async fn set_fullscreen(&mut self, on: bool) -> anyhow::Result<()>;

    async fn set_volume(&mut self, volume: f32) -> anyhow::Result<()>;

    /// Release the sink process.  Called once on shutdown.
    async fn shutdown(&mut self);

    /// Heartbeat liveness check.  Reports through `Signal::Health`.
    fn check_alive(&mut self) {}
}

/// One live engine instance bound to a manifest.
#[async_trait]
pub trait Engine: Send {
    /// Where the sink should read the engine's output from.
    fn output_url(&self) -> &str;

    /// Stop the engine and release everything it holds.
    async fn dispose(&mut self);
}

#[async_trait]
pub trait EngineFactory: Send {
    type Engine: Engine;

    fn available(&self) -> bool;

    /// Start an engine on `manifest_url`.  `Event::ManifestParsed` follows
    /// once the engine has something to play.
    async fn create(&mut self, token: u64, manifest_url: &str) -> anyhow::Result<Self::Engine>;
}

/// Reports surfaced to the player core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Fatal(String),
    AutoplayBlocked(String),
}

pub struct SessionDriver<S: PlaybackSink, F: EngineFactory> {
    sink: S,
    factory: F,
    engine: Option<F::Engine>,
    state: SessionState,
    caps: Caps,
}

impl<S: PlaybackSink, F: EngineFactory> SessionDriver<S, F> {
    pub fn new(sink: S, factory: F) -> Self {
        let caps = Caps {
            native_hls: sink.native_hls(),
            engine_available: factory.available(),
        };
        info!("SessionDriver: caps {:?}", caps);
        Self {
            sink,
            factory,
            engine: None,
            state: SessionState::default(),
            caps,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Feed one event through the machine and run the resulting effects.
    /// Failures of individual effects come back in as events.
    pub async fn handle(&mut self, event: Event) -> Vec<Notice> {
        let mut queue = VecDeque::from([event]);
        let mut notices = Vec::new();

        while let Some(event) = queue.pop_front() {
            debug!("SessionDriver: event {:?}", event);
            let state = std::mem::take(&mut self.state);
            let (next, effects) = session::transition(state, event, self.caps);
            self.state = next;

            for effect in effects {
                if let Some(feedback) = self.run(effect, &mut notices).await {
                    queue.push_back(feedback);
                }
            }
        }
        notices
    }

    /// Tear down the attachment and dispose any engine, whatever the state.
    pub async fn shutdown(&mut self) {
        self.handle(Event::Deselect).await;
        if let Some(mut engine) = self.engine.take() {
            engine.dispose().await;
        }
        self.sink.shutdown().await;
    }

    async fn run(&mut self, effect: Effect, notices: &mut Vec<Notice>) -> Option<Event> {
        match effect {
            Effect::DisposeEngine => {
                if let Some(mut engine) = self.engine.take() {
                    debug!("SessionDriver: disposing engine {}", engine.output_url());
                    engine.dispose().await;
                }
                None
            }

            Effect::ClearSink => {
                if let Err(e) = self.sink.clear().await {
                    warn!("SessionDriver: clearing sink failed: {}", e);
                }
                None
            }

            Effect::LoadNative { token, url } => {
                info!("SessionDriver: native load token={} url={}", token, url);
                match self.sink.load(token, &url).await {
                    Ok(()) => None,
                    Err(e) => Some(Event::Fatal {
                        token,
                        reason: e.to_string(),
                    }),
                }
            }

            Effect::CreateEngine { token, url } => {
                if let Some(mut stale) = self.engine.take() {
                    warn!("SessionDriver: engine still alive at create, disposing");
                    stale.dispose().await;
                }
                info!("SessionDriver: engine load token={} url={}", token, url);
                let engine = match self.factory.create(token, &url).await {
                    Ok(engine) => engine,
                    Err(e) => {
                        return Some(Event::Fatal {
                            token,
                            reason: e.to_string(),
                        })
                    }
                };
                let output = engine.output_url().to_string();
                self.engine = Some(engine);
                match self.sink.load(token, &output).await {
                    Ok(()) => None,
                    Err(e) => Some(Event::Fatal {
                        token,
                        reason: e.to_string(),
                    }),
                }
            }

            Effect::StartPlayback { token } => match self.sink.start(token).await {
                Ok(()) => None,
                Err(e) => Some(Event::AutoplayBlocked {
                    token,
                    reason: e.to_string(),
                }),
            },

            Effect::ReportFatal { reason } => {
                warn!("SessionDriver: {}", reason);
                notices.push(Notice::Fatal(reason));
                None
            }

            Effect::ReportAutoplayBlocked { reason } => {
                info!("SessionDriver: {}", reason);
                notices.push(Notice::AutoplayBlocked(reason));
                None
            }
        }
    }
}
