//! Error taxonomy shared by the loader and the stream session.
//!
//! None of these errors ends the program.  `LoadError` is recovered by
//! moving on to the next playlist source; `SessionError` becomes the
//! session's `Failed` state (or just a log line for autoplay).

use thiserror::Error;

/// One playlist source could not be used.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Connection, TLS, timeout or body read failure.
    #[error("fetch {source_url} failed: {error}")]
    Transport {
        source_url: String,
        #[source]
        error: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("fetch {source_url} returned HTTP {status}")]
    Status { source_url: String, status: u16 },

    /// Payload arrived but carries no channel metadata marker.
    #[error("{source_url} is not an extended M3U playlist")]
    NoMetadata { source_url: String },

    /// Local playlist file could not be read.
    #[error("read {source_url} failed: {error}")]
    Io {
        source_url: String,
        #[source]
        error: std::io::Error,
    },
}

impl LoadError {
    pub fn source_url(&self) -> &str {
        match self {
            LoadError::Transport { source_url, .. }
            | LoadError::Status { source_url, .. }
            | LoadError::NoMetadata { source_url }
            | LoadError::Io { source_url, .. } => source_url,
        }
    }
}

/// Playback-side failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The sink or the engine reported an unrecoverable error.
    #[error("stream failed: {0}")]
    StreamFatal(String),

    /// Playback start was refused; the stream is attached anyway.
    #[error("autoplay blocked: {0}")]
    AutoplayBlocked(String),

    /// Neither native adaptive playback nor an engine is available.
    #[error("no playback path: sink lacks native HLS and no streaming engine is available")]
    NoPlaybackPath,
}
