use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

/// Comma-separated source list that replaces `[playlist] sources`.
pub const PLAYLIST_ENV: &str = "LIVETV_PLAYLIST";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Ordered playlist sources.  Each entry is an https:// URL or a file path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Hand HLS manifests straight to mpv.  When false every attachment goes
    /// through the ffmpeg engine.
    #[serde(default = "default_native_hls")]
    pub native_hls: bool,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_low_latency")]
    pub low_latency: bool,
    /// Seconds of remuxed output kept for a sink that connects late.
    #[serde(default = "default_back_buffer_secs")]
    pub back_buffer_secs: u64,
    /// Network read/write timeout handed to ffmpeg.  A stalled host then
    /// ends the engine instead of leaving the attachment pending.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// Relay port; 0 picks a free one.
    #[serde(default)]
    pub relay_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            native_hls: default_native_hls(),
            volume: default_volume(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_latency: default_low_latency(),
            back_buffer_secs: default_back_buffer_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            relay_port: 0,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_sources() -> Vec<String> {
    vec![
        "https://raw.githubusercontent.com/Miguel179-spe/tvlion/refs/heads/peliculas/LiveTV.m3u"
            .to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_native_hls() -> bool {
    true
}

fn default_volume() -> f32 {
    0.8
}

fn default_low_latency() -> bool {
    true
}

fn default_back_buffer_secs() -> u64 {
    30
}

fn default_io_timeout_secs() -> u64 {
    10
}

fn default_http_enabled() -> bool {
    false
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

/// Split an env override into sources, dropping blanks.
fn parse_source_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            config
        } else {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        };

        if let Ok(raw) = std::env::var(PLAYLIST_ENV) {
            config.apply_source_override(&raw);
        }
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Replace the playlist sources when `raw` names at least one.
    pub fn apply_source_override(&mut self, raw: &str) {
        let sources = parse_source_list(raw);
        if !sources.is_empty() {
            self.playlist.sources = sources;
        }
    }
}
