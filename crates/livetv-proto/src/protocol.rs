use serde::{Deserialize, Serialize};

/// Group assigned to channels whose metadata carries no `group-title`.
pub const DEFAULT_GROUP: &str = "General";

/// One playlist entry.  Created only by the playlist parser; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Dense, zero-based, assigned in parse order.  Not stable across reloads.
    pub id: usize,
    pub name: String,
    pub group: String,
    pub url: String,
    /// Logo URL, empty when the playlist has none.
    #[serde(default)]
    pub logo: String,
}

impl Channel {
    /// Same entry by content, ignoring the parse-order id.
    pub fn is_equivalent(&self, other: &Channel) -> bool {
        self.group == other.group && self.name == other.name && self.url == other.url
    }
}

/// Commands sent from the UI (or the HTTP API) to the player core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Attach the given channel, tearing down whatever is playing.
    Select { channel: Channel },
    /// Re-attempt the attachment of the current channel after a failure.
    Retry,
    /// Release the current attachment and go idle.
    Stop,
    SetFullscreen { on: bool },
    Volume { value: f32 },
}

/// Coarse playback status published to the UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle, // nothing attached
    Attaching, // manifest requested, waiting for the ready signal
    Playing,
    Failed, // fatal error, retry available
}

/// Health of the mpv process as observed by the player core.
///
/// Transitions:
///   Absent -> Starting -> Running -> Dead -> Starting ...
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum MpvHealth {
    /// mpv process does not exist yet (before first use).
    #[default]
    Absent,
    /// Process is spawning / socket not yet available.
    Starting,
    /// Socket connected, IPC responding normally.
    Running,
    /// Process exited or socket closed.
    Dead,
}

impl MpvHealth {
    /// Short label for badges / status bar.
    pub fn badge_label(&self) -> Option<&str> {
        match self {
            MpvHealth::Absent => None,
            MpvHealth::Starting => Some("INIT"),
            MpvHealth::Running => None,
            MpvHealth::Dead => Some("DEAD"),
        }
    }
}

/// Snapshot of the player core.  `rev` increments on every change so
/// listeners can drop stale copies.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerState {
    #[serde(default)]
    pub rev: u64,
    pub channel: Option<Channel>,
    pub status: PlaybackStatus,
    /// Reason of the last fatal error, cleared on the next attachment.
    pub error: Option<String>,
    /// Set when playback started muted/paused because autoplay was refused.
    pub autoplay_blocked: Option<String>,
    /// Whether the attachment goes through the ffmpeg engine.
    pub via_engine: bool,
    pub fullscreen: bool,
    pub volume: f32,
    #[serde(default)]
    pub mpv_health: MpvHealth,
}
