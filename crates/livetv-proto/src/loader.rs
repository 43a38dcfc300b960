//! Playlist loader: ordered source fallback over HTTP(S) or local files.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use tracing::{info, warn};

use crate::error::LoadError;
use crate::playlist;
use crate::protocol::Channel;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

fn user_agent() -> String {
    format!("livetv/{}", env!("CARGO_PKG_VERSION"))
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

pub struct PlaylistLoader {
    sources: Vec<String>,
    client: reqwest::Client,
}

impl PlaylistLoader {
    pub fn new(sources: Vec<String>) -> anyhow::Result<Self> {
        Self::with_timeout(sources, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(sources: Vec<String>, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self { sources, client })
    }

    /// Channels from the first source that yields an extended M3U payload.
    /// Every failure is logged and skipped; exhausting all sources gives an
    /// empty list.
    pub async fn load(&self) -> Vec<Channel> {
        for source in &self.sources {
            match self.try_source(source).await {
                Ok(channels) => {
                    info!("Loaded {} channels from {}", channels.len(), source);
                    return channels;
                }
                Err(e) => warn!("Playlist source unavailable: {}", e),
            }
        }
        warn!(
            "No playlist source available ({} tried), starting with empty list",
            self.sources.len()
        );
        Vec::new()
    }

    pub async fn try_source(&self, source: &str) -> Result<Vec<Channel>, LoadError> {
        let text = if is_remote(source) {
            self.fetch(source).await?
        } else {
            let bytes = tokio::fs::read(PathBuf::from(source))
                .await
                .map_err(|error| LoadError::Io {
                    source_url: source.to_string(),
                    error,
                })?;
            // Latin-1 playlists are common; decode like the HTTP path does.
            String::from_utf8_lossy(&bytes).into_owned()
        };

        if !playlist::has_metadata(&text) {
            return Err(LoadError::NoMetadata {
                source_url: source.to_string(),
            });
        }
        Ok(playlist::parse(&text))
    }

    async fn fetch(&self, url: &str) -> Result<String, LoadError> {
        let transport = |error| LoadError::Transport {
            source_url: url.to_string(),
            error,
        };
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                source_url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://a/list.m3u"));
        assert!(is_remote("http://a/list.m3u"));
        assert!(!is_remote("/home/me/list.m3u"));
        assert!(!is_remote("httpish.m3u"));
    }

    #[test]
    fn user_agent_carries_version() {
        assert!(user_agent().starts_with("livetv/"));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let loader = PlaylistLoader::new(vec![]).unwrap();
        let err = loader
            .try_source("/definitely/not/here.m3u")
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert_eq!(err.source_url(), "/definitely/not/here.m3u");
    }

    #[tokio::test]
    async fn no_sources_yields_empty() {
        let loader = PlaylistLoader::new(vec![]).unwrap();
        assert!(loader.load().await.is_empty());
    }
}
