use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod direct;
pub mod ytdlp;

use crate::health::{ComponentStatus, HealthSnapshot};
use crate::platform::{PlatformInfo, PlatformType};

/// Metadata about a downloaded video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,

    /// Duration as `HH:MM:SS`, when the source reports one
    pub duration: Option<String>,

    /// Size of the downloaded file in bytes
    #[serde(rename = "size")]
    pub size_bytes: u64,

    /// Canonical URL of the video page or file
    pub url: String,
}

/// A video file on local disk plus its metadata
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub path: PathBuf,
    pub info: VideoInfo,
}

/// Errors raised while retrieving a video
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("download timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} while downloading {url}")]
    Http { status: u16, url: String },

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("downloaded file is empty")]
    EmptyFile,

    #[error("{tool} failed: {message}")]
    Tool {
        tool: String,
        message: String,
        transient: bool,
    },

    #[error("no fetcher available for platform {0}")]
    UnsupportedPlatform(PlatformType),

    #[error("file operation failed: {0}")]
    Io(String),
}

impl FetchError {
    /// Transient failures may succeed when the same request is repeated
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Http { status, .. } => is_transient_status(*status),
            FetchError::Tool { transient, .. } => *transient,
            FetchError::TooLarge { .. }
            | FetchError::EmptyFile
            | FetchError::UnsupportedPlatform(_)
            | FetchError::Io(_) => false,
        }
    }
}

/// 403 is included because CDN links often reject the first request and accept a repeat
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 403 | 408 | 429) || (500..600).contains(&status)
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout(error.to_string())
        } else if let Some(status) = error.status() {
            FetchError::Http {
                status: status.as_u16(),
                url: error
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_default(),
            }
        } else {
            FetchError::Network(error.to_string())
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(error: std::io::Error) -> Self {
        FetchError::Io(error.to_string())
    }
}

/// Retrieves a local video file for a classified link.
///
/// Implementations must be safe to call again with the same arguments after a
/// failure; the pipeline retries transient errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download the video into `work_dir`
    async fn fetch(&self, platform: &PlatformInfo, work_dir: &Path) -> Result<FetchedMedia, FetchError>;

    async fn health_snapshot(&self) -> HealthSnapshot;
}

/// Routes direct links to the HTTP fetcher and everything else to yt-dlp
pub struct PlatformFetcher {
    ytdlp: ytdlp::YtDlpFetcher,
    direct: direct::DirectFetcher,
}

impl PlatformFetcher {
    pub fn new(ytdlp: ytdlp::YtDlpFetcher, direct: direct::DirectFetcher) -> Self {
        Self { ytdlp, direct }
    }

    pub fn from_config(config: &crate::config::DownloadConfig) -> Self {
        Self::new(
            ytdlp::YtDlpFetcher::from_config(config),
            direct::DirectFetcher::from_config(config),
        )
    }
}

#[async_trait]
impl MediaFetcher for PlatformFetcher {
    async fn fetch(&self, platform: &PlatformInfo, work_dir: &Path) -> Result<FetchedMedia, FetchError> {
        match platform.platform_type {
            PlatformType::DirectLink => self.direct.fetch(platform, work_dir).await,
            PlatformType::Bilibili
            | PlatformType::Youtube
            | PlatformType::Vimeo
            | PlatformType::Douyin
            | PlatformType::Unknown => self.ytdlp.fetch(platform, work_dir).await,
        }
    }

    async fn health_snapshot(&self) -> HealthSnapshot {
        let ytdlp = self.ytdlp.health_snapshot().await;
        if ytdlp.status == ComponentStatus::Unavailable {
            let detail = ytdlp.detail.unwrap_or_default();
            return HealthSnapshot::unavailable(
                "media_fetcher",
                format!("{} (direct links still work)", detail),
            );
        }
        HealthSnapshot::ok("media_fetcher")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Network("reset".into()).is_transient());
        assert!(FetchError::Timeout("30s".into()).is_transient());
        assert!(FetchError::Http { status: 429, url: String::new() }.is_transient());
        assert!(FetchError::Http { status: 503, url: String::new() }.is_transient());
        assert!(FetchError::Http { status: 403, url: String::new() }.is_transient());
        assert!(!FetchError::Http { status: 404, url: String::new() }.is_transient());
        assert!(!FetchError::EmptyFile.is_transient());
        assert!(!FetchError::TooLarge { size: 2, limit: 1 }.is_transient());
        assert!(FetchError::Tool {
            tool: "yt-dlp".into(),
            message: "HTTP Error 429".into(),
            transient: true
        }
        .is_transient());
    }

    #[test]
    fn test_video_info_serializes_size() {
        let info = VideoInfo {
            title: "Demo".into(),
            duration: Some("00:03:20".into()),
            size_bytes: 1024,
            url: "https://example.com/v".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["size"], 1024);
        assert_eq!(json["duration"], "00:03:20");
    }
}
