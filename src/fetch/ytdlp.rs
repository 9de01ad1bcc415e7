use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{FetchError, FetchedMedia, MediaFetcher, VideoInfo};
use crate::config::DownloadConfig;
use crate::health::HealthSnapshot;
use crate::platform::PlatformInfo;
use crate::utils::{check_command_available, format_clock, sanitize_filename};

/// Markers in yt-dlp stderr that indicate a retry may help
const TRANSIENT_MARKERS: &[&str] = &[
    "HTTP Error 403",
    "HTTP Error 429",
    "HTTP Error 5",
    "timed out",
    "Connection reset",
    "Temporary failure",
    "Unable to download webpage",
];

/// Video fetcher for hosting sites, backed by yt-dlp
pub struct YtDlpFetcher {
    yt_dlp_path: String,
    timeout: Duration,
    max_file_size: u64,
}

impl YtDlpFetcher {
    pub fn new(yt_dlp_path: impl Into<String>, timeout: Duration, max_file_size: u64) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            timeout,
            max_file_size,
        }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(
            config.yt_dlp_path.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_file_size_bytes(),
        )
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        check_command_available(&self.yt_dlp_path).await
    }

    /// Run yt-dlp with a deadline, returning stdout
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, FetchError> {
        let child = Command::new(&self.yt_dlp_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| FetchError::Timeout(format!("yt-dlp exceeded {}s", self.timeout.as_secs())))?
            .map_err(|e| FetchError::Tool {
                tool: self.yt_dlp_path.clone(),
                message: format!("could not start: {}", e),
                transient: false,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_failure(&self.yt_dlp_path, stderr));
        }

        Ok(output.stdout)
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, url: &str) -> Result<Value, FetchError> {
        tracing::debug!("Extracting video info for: {}", url);

        let stdout = self.run(&["--dump-json", "--no-playlist", url]).await?;

        serde_json::from_slice(&stdout).map_err(|e| FetchError::Tool {
            tool: self.yt_dlp_path.clone(),
            message: format!("unreadable metadata: {}", e),
            transient: false,
        })
    }

    /// Download the video file to `output_path`
    async fn download_video(&self, url: &str, output_path: &Path) -> Result<(), FetchError> {
        tracing::debug!("Downloading video for: {}", url);

        let output = output_path.to_string_lossy();
        let max_size = self.max_file_size.to_string();
        self.run(&[
            "--no-playlist",
            "--format",
            "best[ext=mp4]/best",
            "--max-filesize",
            &max_size,
            "--no-part",
            "--output",
            &output,
            url,
        ])
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, platform: &PlatformInfo, work_dir: &Path) -> Result<FetchedMedia, FetchError> {
        let info = self.get_video_info(&platform.url).await?;

        let output_path: PathBuf =
            work_dir.join(format!("{}.mp4", sanitize_filename(&platform.platform_id)));
        self.download_video(&platform.url, &output_path).await?;

        let size = match tokio::fs::metadata(&output_path).await {
            Ok(metadata) => metadata.len(),
            // --max-filesize makes yt-dlp skip the download without failing
            Err(_) => {
                return Err(FetchError::Tool {
                    tool: self.yt_dlp_path.clone(),
                    message: format!(
                        "no file produced (larger than {} bytes or unavailable)",
                        self.max_file_size
                    ),
                    transient: false,
                })
            }
        };

        if size == 0 {
            tokio::fs::remove_file(&output_path).await.ok();
            return Err(FetchError::EmptyFile);
        }

        let title = info["title"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| platform.platform_id.clone());

        let duration = info["duration"].as_f64().map(format_clock);

        let url = info["webpage_url"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| platform.url.clone());

        tracing::info!(
            path = %output_path.display(),
            size_bytes = size,
            "Video downloaded with yt-dlp"
        );

        Ok(FetchedMedia {
            path: output_path,
            info: VideoInfo {
                title,
                duration,
                size_bytes: size,
                url,
            },
        })
    }

    async fn health_snapshot(&self) -> HealthSnapshot {
        if self.check_availability().await {
            HealthSnapshot::ok("yt_dlp")
        } else {
            HealthSnapshot::unavailable(
                "yt_dlp",
                format!("{} not found in PATH", self.yt_dlp_path),
            )
        }
    }
}

fn classify_failure(tool: &str, stderr: String) -> FetchError {
    let transient = TRANSIENT_MARKERS.iter().any(|marker| stderr.contains(marker));
    FetchError::Tool {
        tool: tool.to_string(),
        message: stderr,
        transient,
    }
}
