use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::openai::ApiCredentials;
use crate::text::TextTask;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OpenAI-compatible API settings for transcription and text processing
    pub openai: OpenAiConfig,

    /// Video download settings
    pub download: DownloadConfig,

    /// Audio extraction settings
    pub audio: AudioConfig,

    /// Stage sequencing and retry settings
    pub pipeline: PipelineConfig,

    /// Artifact persistence settings
    pub output: OutputConfig,

    /// HTTP service settings
    pub server: ServerConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key; `OPENAI_API_KEY` overrides
    pub api_key: Option<String>,

    /// API base URL; `OPENAI_BASE_URL` overrides
    pub base_url: Option<String>,

    /// Speech-to-text model
    pub whisper_model: String,

    /// Language hint for transcription (auto-detect if not specified)
    pub language: Option<String>,

    /// Chat model used for text processing
    pub gpt_model: String,

    /// Attempts per API call before giving up
    pub max_retries: u32,

    /// Base delay between API attempts
    pub retry_delay_secs: u64,

    pub transcribe_timeout_secs: u64,

    pub format_timeout_secs: u64,

    /// What the text stage does with the transcript
    pub text_task: TextTask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Parent directory for per-job work directories (system temp if not specified)
    pub work_dir: Option<PathBuf>,

    pub max_file_size_mb: u64,

    pub timeout_secs: u64,

    pub yt_dlp_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub ffmpeg_path: String,

    /// Sample rate for extracted audio in Hz
    pub sample_rate: u32,

    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extra fetch attempts after a transient failure
    pub fetch_retries: u32,

    pub retry_delay_ms: u64,

    /// Classify unrecognised HTTP(S) links as `unknown` instead of rejecting them
    pub accept_generic_links: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,

    /// Write transcripts and result JSON after each job
    pub save_artifacts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Maximum jobs processed at the same time
    pub max_concurrent_jobs: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            whisper_model: "whisper-1".to_string(),
            language: None,
            gpt_model: "gpt-4o".to_string(),
            max_retries: 3,
            retry_delay_secs: 2,
            transcribe_timeout_secs: 300,
            format_timeout_secs: 60,
            text_task: TextTask::Format,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            max_file_size_mb: 1000,
            timeout_secs: 300,
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            sample_rate: 16000,
            timeout_secs: 300,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_retries: 1,
            retry_delay_ms: 2000,
            accept_generic_links: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            save_artifacts: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_concurrent_jobs: 3,
        }
    }
}

impl DownloadConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

impl PipelineConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl OpenAiConfig {
    /// Credentials handed to each API-backed collaborator
    pub fn credentials(&self) -> ApiCredentials {
        ApiCredentials::new(self.api_key.clone(), self.base_url.clone())
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let mut config = Self::default();
            config.save().await?;
            config.apply_env();
            Ok(config)
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let mut config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("linkscribe").join("config.yaml"))
    }

    /// Credentials from the environment take precedence over the file
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.openai.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                self.openai.base_url = Some(url);
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.max_concurrent_jobs == 0 {
            anyhow::bail!("server.max_concurrent_jobs must be at least 1");
        }

        if self.audio.sample_rate == 0 {
            anyhow::bail!("audio.sample_rate must be positive");
        }

        if self.download.max_file_size_mb == 0 {
            anyhow::bail!("download.max_file_size_mb must be positive");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        let credentials = self.openai.credentials();
        println!("Current Configuration:");
        println!(
            "  API Key: {}",
            if credentials.has_api_key() { "configured" } else { "missing" }
        );
        println!(
            "  API Base URL: {}",
            self.openai.base_url.as_deref().unwrap_or("missing")
        );
        println!("  Whisper Model: {}", self.openai.whisper_model);
        println!("  Text Model: {} ({})", self.openai.gpt_model, self.openai.text_task);
        println!("  Fetch Retries: {}", self.pipeline.fetch_retries);
        println!("  Output Dir: {}", self.output.dir.display());
        println!("  Save Artifacts: {}", self.output.save_artifacts);
        println!(
            "  Server: {}:{} (max {} concurrent jobs)",
            self.server.host, self.server.port, self.server.max_concurrent_jobs
        );
    }
}
