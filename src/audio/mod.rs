use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;

use crate::config::AudioConfig;
use crate::health::HealthSnapshot;
use crate::utils::check_command_available;

/// Errors raised while turning a video into transcription-ready audio
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("video file does not exist: {0}")]
    MissingInput(PathBuf),

    #[error("video file is empty: {0}")]
    EmptyInput(PathBuf),

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("audio extraction timed out after {0}s")]
    Timeout(u64),

    #[error("ffmpeg produced no audio")]
    EmptyOutput,

    #[error("file operation failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExtractionError {
    fn from(error: std::io::Error) -> Self {
        ExtractionError::Io(error.to_string())
    }
}

/// Converts a downloaded video into an audio file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Write the audio track of `video` into `work_dir` and return its path
    async fn extract_audio(&self, video: &Path, work_dir: &Path) -> Result<PathBuf, ExtractionError>;

    async fn health_snapshot(&self) -> HealthSnapshot;
}

/// ffmpeg-backed extractor producing mono 16-bit PCM WAV
pub struct FfmpegExtractor {
    ffmpeg_path: String,
    sample_rate: u32,
    timeout: Duration,
}

impl FfmpegExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, sample_rate: u32, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            sample_rate,
            timeout,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(
            config.ffmpeg_path.clone(),
            config.sample_rate,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Check if the file exists and has content
    async fn validate_file(&self, path: &Path) -> Result<(), ExtractionError> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(_) => return Err(ExtractionError::MissingInput(path.to_path_buf())),
        };

        if !metadata.is_file() {
            return Err(ExtractionError::MissingInput(path.to_path_buf()));
        }

        if metadata.len() == 0 {
            return Err(ExtractionError::EmptyInput(path.to_path_buf()));
        }

        Ok(())
    }

    fn ffmpeg_args(&self, source: &Path, target: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            source.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-y".to_string(),
            target.to_string_lossy().into_owned(),
        ]
    }

    /// Output file name: the video's stem with a `.wav` extension
    fn target_path(video: &Path, work_dir: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        work_dir.join(format!("{}.wav", stem))
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract_audio(&self, video: &Path, work_dir: &Path) -> Result<PathBuf, ExtractionError> {
        self.validate_file(video).await?;

        let target = Self::target_path(video, work_dir);
        tracing::debug!("Extracting audio: {} -> {}", video.display(), target.display());

        let child = Command::new(&self.ffmpeg_path)
            .args(self.ffmpeg_args(video, &target))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| ExtractionError::Ffmpeg(format!("could not start {}: {}", self.ffmpeg_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // ffmpeg prints its banner first; the cause is at the end
            let tail: Vec<&str> = stderr.lines().rev().take(3).collect();
            let message = tail.into_iter().rev().collect::<Vec<_>>().join(" | ");
            return Err(ExtractionError::Ffmpeg(message));
        }

        match fs::metadata(&target).await {
            Ok(metadata) if metadata.len() > 0 => {
                tracing::info!(
                    path = %target.display(),
                    size_bytes = metadata.len(),
                    "Audio extracted"
                );
                Ok(target)
            }
            _ => Err(ExtractionError::EmptyOutput),
        }
    }

    async fn health_snapshot(&self) -> HealthSnapshot {
        if check_command_available(&self.ffmpeg_path).await {
            HealthSnapshot::ok("audio_extractor")
        } else {
            HealthSnapshot::unavailable(
                "audio_extractor",
                format!("{} not found in PATH", self.ffmpeg_path),
            )
        }
    }
}
