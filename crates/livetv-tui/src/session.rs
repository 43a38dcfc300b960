//! Stream session lifecycle as a pure transition function.
//!
//! `transition` never touches the sink or the engine.  It returns the next
//! state and the effects the driver has to run, in order.  Teardown effects
//! always come before the effects that build the next attachment.

use livetv_proto::error::SessionError;
use livetv_proto::protocol::{Channel, PlaybackStatus};

/// What the playback path can do.  Fixed for the lifetime of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    /// The sink plays adaptive manifests by itself.
    pub native_hls: bool,
    /// A streaming engine can be created.
    pub engine_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Native,
    Engine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub channel: Channel,
    pub token: u64,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Attaching(Attachment),
    Playing(Attachment),
    /// `mode` is `None` when nothing could be attached at all.
    Failed {
        channel: Channel,
        token: u64,
        mode: Option<Mode>,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub phase: Phase,
    /// Last token handed out.  Tokens start at 1 and only grow.
    pub last_token: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Select(Channel),
    SinkReady { token: u64 },
    ManifestParsed { token: u64 },
    Fatal { token: u64, reason: String },
    AutoplayBlocked { token: u64, reason: String },
    Retry,
    Deselect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    DisposeEngine,
    ClearSink,
    LoadNative { token: u64, url: String },
    CreateEngine { token: u64, url: String },
    StartPlayback { token: u64 },
    ReportFatal { reason: String },
    ReportAutoplayBlocked { reason: String },
}

impl Phase {
    pub fn status(&self) -> PlaybackStatus {
        match self {
            Phase::Idle => PlaybackStatus::Idle,
            Phase::Attaching(_) => PlaybackStatus::Attaching,
            Phase::Playing(_) => PlaybackStatus::Playing,
            Phase::Failed { .. } => PlaybackStatus::Failed,
        }
    }

    pub fn channel(&self) -> Option<&Channel> {
        match self {
            Phase::Idle => None,
            Phase::Attaching(a) | Phase::Playing(a) => Some(&a.channel),
            Phase::Failed { channel, .. } => Some(channel),
        }
    }

    /// Token of whatever currently owns the sink.
    pub fn token(&self) -> Option<u64> {
        match self {
            Phase::Idle => None,
            Phase::Attaching(a) | Phase::Playing(a) => Some(a.token),
            Phase::Failed { token, .. } => Some(*token),
        }
    }

    fn mode(&self) -> Option<Mode> {
        match self {
            Phase::Idle => None,
            Phase::Attaching(a) | Phase::Playing(a) => Some(a.mode),
            Phase::Failed { mode, .. } => *mode,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Attaching(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Phase::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Release whatever the phase holds.  Engine first, then the sink.
fn teardown(phase: &Phase) -> Vec<Effect> {
    match phase.mode() {
        None => Vec::new(),
        Some(Mode::Native) => vec![Effect::ClearSink],
        Some(Mode::Engine) => vec![Effect::DisposeEngine, Effect::ClearSink],
    }
}

fn attach(channel: Channel, token: u64, caps: Caps, effects: &mut Vec<Effect>) -> Phase {
    let url = channel.url.clone();
    if caps.native_hls {
        effects.push(Effect::LoadNative { token, url });
        Phase::Attaching(Attachment {
            channel,
            token,
            mode: Mode::Native,
        })
    } else if caps.engine_available {
        effects.push(Effect::CreateEngine { token, url });
        Phase::Attaching(Attachment {
            channel,
            token,
            mode: Mode::Engine,
        })
    } else {
        let reason = SessionError::NoPlaybackPath.to_string();
        effects.push(Effect::ReportFatal {
            reason: reason.clone(),
        });
        Phase::Failed {
            channel,
            token,
            mode: None,
            reason,
        }
    }
}

fn reattach(state: SessionState, channel: Channel, caps: Caps) -> (SessionState, Vec<Effect>) {
    let mut effects = teardown(&state.phase);
    let token = state.last_token + 1;
    let phase = attach(channel, token, caps, &mut effects);
    (
        SessionState {
            phase,
            last_token: token,
        },
        effects,
    )
}

fn is_current(state: &SessionState, token: u64) -> bool {
    state.phase.token() == Some(token)
}

pub fn transition(state: SessionState, event: Event, caps: Caps) -> (SessionState, Vec<Effect>) {
    match event {
        Event::Select(channel) => reattach(state, channel, caps),

        Event::Retry => match &state.phase {
            Phase::Failed { channel, .. } => {
                let channel = channel.clone();
                reattach(state, channel, caps)
            }
            _ => (state, Vec::new()),
        },

        Event::Deselect => {
            let effects = teardown(&state.phase);
            (
                SessionState {
                    phase: Phase::Idle,
                    last_token: state.last_token,
                },
                effects,
            )
        }

        Event::SinkReady { token } | Event::ManifestParsed { token }
            if !is_current(&state, token) =>
        {
            (state, Vec::new())
        }

        Event::SinkReady { token } => ready(state, token, Mode::Native),
        Event::ManifestParsed { token } => ready(state, token, Mode::Engine),

        Event::Fatal { token, reason } => {
            if !is_current(&state, token) {
                return (state, Vec::new());
            }
            match state.phase {
                Phase::Attaching(a) | Phase::Playing(a) => {
                    let reason = SessionError::StreamFatal(reason).to_string();
                    let effects = vec![Effect::ReportFatal {
                        reason: reason.clone(),
                    }];
                    (
                        SessionState {
                            phase: Phase::Failed {
                                channel: a.channel,
                                token: a.token,
                                mode: Some(a.mode),
                                reason,
                            },
                            last_token: state.last_token,
                        },
                        effects,
                    )
                }
                phase => (
                    SessionState {
                        phase,
                        last_token: state.last_token,
                    },
                    Vec::new(),
                ),
            }
        }

        Event::AutoplayBlocked { token, reason } => {
            if !is_current(&state, token) {
                return (state, Vec::new());
            }
            let reason = SessionError::AutoplayBlocked(reason).to_string();
            (state, vec![Effect::ReportAutoplayBlocked { reason }])
        }
    }
}

/// Ready signal: only the signal that matches the attachment's mode counts.
fn ready(state: SessionState, token: u64, signal: Mode) -> (SessionState, Vec<Effect>) {
    match state.phase {
        Phase::Attaching(a) if a.mode == signal => (
            SessionState {
                phase: Phase::Playing(a),
                last_token: state.last_token,
            },
            vec![Effect::StartPlayback { token }],
        ),
        phase => (
            SessionState {
                phase,
                last_token: state.last_token,
            },
            Vec::new(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE: Caps = Caps {
        native_hls: true,
        engine_available: true,
    };
    const ENGINE: Caps = Caps {
        native_hls: false,
        engine_available: true,
    };
    const NOTHING: Caps = Caps {
        native_hls: false,
        engine_available: false,
    };

    fn ch(id: usize) -> Channel {
        Channel {
            id,
            name: format!("ch{}", id),
            group: "General".into(),
            url: format!("http://tv/{}.m3u8", id),
            logo: String::new(),
        }
    }

    fn run(state: SessionState, events: Vec<Event>, caps: Caps) -> (SessionState, Vec<Effect>) {
        let mut all = Vec::new();
        let mut state = state;
        for ev in events {
            let (next, effects) = transition(state, ev, caps);
            state = next;
            all.extend(effects);
        }
        (state, all)
    }

    #[test]
    fn select_from_idle_loads_native() {
        let (s, fx) = transition(SessionState::default(), Event::Select(ch(0)), NATIVE);
        assert_eq!(s.phase.status(), PlaybackStatus::Attaching);
        assert!(s.phase.is_loading());
        assert_eq!(
            fx,
            vec![Effect::LoadNative {
                token: 1,
                url: "http://tv/0.m3u8".into()
            }]
        );
    }

    #[test]
    fn sink_ready_starts_playback() {
        let (s, fx) = run(
            SessionState::default(),
            vec![Event::Select(ch(0)), Event::SinkReady { token: 1 }],
            NATIVE,
        );
        assert_eq!(s.phase.status(), PlaybackStatus::Playing);
        assert_eq!(fx.last(), Some(&Effect::StartPlayback { token: 1 }));
    }

    #[test]
    fn engine_path_waits_for_manifest() {
        let (s, fx) = run(
            SessionState::default(),
            vec![Event::Select(ch(0)), Event::SinkReady { token: 1 }],
            ENGINE,
        );
        assert_eq!(s.phase.status(), PlaybackStatus::Attaching);
        assert_eq!(
            fx,
            vec![Effect::CreateEngine {
                token: 1,
                url: "http://tv/0.m3u8".into()
            }]
        );
        let (s, fx) = transition(s, Event::ManifestParsed { token: 1 }, ENGINE);
        assert_eq!(s.phase.status(), PlaybackStatus::Playing);
        assert_eq!(fx, vec![Effect::StartPlayback { token: 1 }]);
    }

    #[test]
    fn reselect_tears_down_engine_before_creating_next() {
        let (s, _) = run(
            SessionState::default(),
            vec![Event::Select(ch(0)), Event::ManifestParsed { token: 1 }],
            ENGINE,
        );
        let (s, fx) = transition(s, Event::Select(ch(1)), ENGINE);
        assert_eq!(
            fx,
            vec![
                Effect::DisposeEngine,
                Effect::ClearSink,
                Effect::CreateEngine {
                    token: 2,
                    url: "http://tv/1.m3u8".into()
                },
            ]
        );
        assert_eq!(s.phase.channel().map(|c| c.id), Some(1));
    }

    #[test]
    fn no_capability_fails_immediately() {
        let (s, fx) = transition(SessionState::default(), Event::Select(ch(0)), NOTHING);
        assert_eq!(s.phase.status(), PlaybackStatus::Failed);
        assert!(!s.phase.is_loading());
        assert!(matches!(fx.as_slice(), [Effect::ReportFatal { .. }]));
        // Nothing was attached, so nothing to tear down on the next select.
        let (_, fx) = transition(s, Event::Select(ch(1)), NOTHING);
        assert!(matches!(fx.as_slice(), [Effect::ReportFatal { .. }]));
    }

    #[test]
    fn fatal_fails_and_retry_reattaches() {
        let (s, fx) = run(
            SessionState::default(),
            vec![
                Event::Select(ch(0)),
                Event::Fatal {
                    token: 1,
                    reason: "manifest 404".into(),
                },
            ],
            ENGINE,
        );
        assert_eq!(s.phase.status(), PlaybackStatus::Failed);
        assert!(!s.phase.is_loading());
        assert_eq!(s.phase.error(), Some("stream failed: manifest 404"));
        assert!(fx.contains(&Effect::ReportFatal {
            reason: "stream failed: manifest 404".into()
        }));

        let (s, fx) = transition(s, Event::Retry, ENGINE);
        assert_eq!(s.phase.status(), PlaybackStatus::Attaching);
        assert_eq!(s.phase.channel().map(|c| c.id), Some(0));
        assert_eq!(
            fx,
            vec![
                Effect::DisposeEngine,
                Effect::ClearSink,
                Effect::CreateEngine {
                    token: 2,
                    url: "http://tv/0.m3u8".into()
                },
            ]
        );
    }

    #[test]
    fn fatal_while_playing_fails() {
        let (s, _) = run(
            SessionState::default(),
            vec![
                Event::Select(ch(0)),
                Event::SinkReady { token: 1 },
                Event::Fatal {
                    token: 1,
                    reason: "eof".into(),
                },
            ],
            NATIVE,
        );
        assert_eq!(s.phase.status(), PlaybackStatus::Failed);
    }

    #[test]
    fn retry_outside_failed_is_noop() {
        let (s, _) = transition(SessionState::default(), Event::Select(ch(0)), NATIVE);
        let (s2, fx) = transition(s.clone(), Event::Retry, NATIVE);
        assert_eq!(s, s2);
        assert!(fx.is_empty());
    }

    #[test]
    fn stale_tokens_are_ignored() {
        let (s, _) = run(
            SessionState::default(),
            vec![Event::Select(ch(0)), Event::Select(ch(1))],
            NATIVE,
        );
        let before = s.clone();
        let (s, fx) = run(
            s,
            vec![
                Event::SinkReady { token: 1 },
                Event::Fatal {
                    token: 1,
                    reason: "old".into(),
                },
                Event::AutoplayBlocked {
                    token: 1,
                    reason: "old".into(),
                },
            ],
            NATIVE,
        );
        assert_eq!(s, before);
        assert!(fx.is_empty());
    }

    #[test]
    fn autoplay_blocked_is_not_fatal() {
        let (s, _) = run(
            SessionState::default(),
            vec![Event::Select(ch(0)), Event::SinkReady { token: 1 }],
            NATIVE,
        );
        let (s, fx) = transition(
            s,
            Event::AutoplayBlocked {
                token: 1,
                reason: "paused".into(),
            },
            NATIVE,
        );
        assert_eq!(s.phase.status(), PlaybackStatus::Playing);
        assert_eq!(
            fx,
            vec![Effect::ReportAutoplayBlocked {
                reason: "autoplay blocked: paused".into()
            }]
        );
    }

    #[test]
    fn deselect_releases_everything() {
        let (s, _) = transition(SessionState::default(), Event::Select(ch(0)), ENGINE);
        let (s, fx) = transition(s, Event::Deselect, ENGINE);
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(fx, vec![Effect::DisposeEngine, Effect::ClearSink]);
        assert_eq!(s.last_token, 1);

        let (_, fx) = transition(s, Event::Deselect, ENGINE);
        assert!(fx.is_empty());
    }

    #[test]
    fn tokens_are_monotonic_across_deselect() {
        let (s, _) = run(
            SessionState::default(),
            vec![Event::Select(ch(0)), Event::Deselect, Event::Select(ch(0))],
            NATIVE,
        );
        assert_eq!(s.phase.token(), Some(2));
    }
}
