use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod segments;

use crate::config::OpenAiConfig;
use crate::health::HealthSnapshot;
use crate::openai::{error_excerpt, retry_decision, ApiCredentials, RetryDecision};
use crate::utils::build_http_client;
use segments::{Segment, VerboseTranscription};

/// Transcription output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Plain transcript text
    pub text: String,

    /// One `[MM:SS - MM:SS] text` line per segment, when the service returned segments
    pub timestamped: Option<String>,

    pub language: Option<String>,

    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Transcript {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamped: None,
            language: None,
            segments: Vec::new(),
        }
    }
}

/// Errors raised by the transcription service
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionError {
    #[error("transcription API key is not configured")]
    NotConfigured,

    #[error("transcription API key is invalid or expired")]
    Unauthorized,

    #[error("transcription API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transcription request failed: {0}")]
    Network(String),

    #[error("transcription request timed out")]
    Timeout,

    #[error("transcription service returned an empty transcript")]
    EmptyTranscript,

    #[error("unreadable transcription response: {0}")]
    InvalidResponse(String),

    #[error("cannot read audio file: {0}")]
    Io(String),
}

impl From<reqwest::Error> for TranscriptionError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranscriptionError::Timeout
        } else if error.is_decode() {
            TranscriptionError::InvalidResponse(error.to_string())
        } else {
            TranscriptionError::Network(error.to_string())
        }
    }
}

/// Converts audio into text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript, TranscriptionError>;

    async fn health_snapshot(&self) -> HealthSnapshot;
}

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint
pub struct WhisperTranscriber {
    client: Client,
    credentials: ApiCredentials,
    model: String,
    language: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl WhisperTranscriber {
    pub fn new(credentials: ApiCredentials, model: impl Into<String>, timeout: Duration) -> Self {
        let client = build_http_client(Client::builder().timeout(timeout), "audio_transcriber");

        Self {
            client,
            credentials,
            model: model.into(),
            language: None,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn from_config(config: &OpenAiConfig) -> Self {
        let mut transcriber = Self::new(
            config.credentials(),
            config.whisper_model.clone(),
            Duration::from_secs(config.transcribe_timeout_secs),
        );
        transcriber.language = config.language.clone();
        transcriber.max_retries = config.max_retries.max(1);
        transcriber.retry_delay = Duration::from_secs(config.retry_delay_secs);
        transcriber
    }

    async fn build_form(&self, audio: &Path) -> Result<Form, TranscriptionError> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| TranscriptionError::Io(format!("{}: {}", audio.display(), e)))?;

        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        Ok(form)
    }

    /// One request, classified as retryable or fatal on failure
    async fn attempt(&self, api_key: &str, audio: &Path) -> Result<Transcript, AttemptError> {
        let form = self.build_form(audio).await.map_err(AttemptError::Fatal)?;

        let response = self
            .client
            .post(self.credentials.endpoint("audio/transcriptions"))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AttemptError::Retry(e.into(), None))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = if status == 401 {
                TranscriptionError::Unauthorized
            } else {
                TranscriptionError::Api {
                    status,
                    message: error_excerpt(&body),
                }
            };
            return match retry_decision(status, 0, self.retry_delay) {
                RetryDecision::GiveUp => Err(AttemptError::Fatal(error)),
                RetryDecision::RetryAfter(_) => Err(AttemptError::Retry(error, Some(status))),
            };
        }

        let body: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(TranscriptionError::InvalidResponse(e.to_string())))?;

        let transcript = body.into_transcript();
        if transcript.text.is_empty() {
            return Err(AttemptError::Retry(TranscriptionError::EmptyTranscript, None));
        }

        Ok(transcript)
    }
}

enum AttemptError {
    Retry(TranscriptionError, Option<u16>),
    Fatal(TranscriptionError),
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript, TranscriptionError> {
        let api_key = self
            .credentials
            .api_key()
            .ok_or(TranscriptionError::NotConfigured)?;

        let mut last_error = TranscriptionError::EmptyTranscript;
        for attempt in 0..self.max_retries {
            tracing::debug!(attempt = attempt + 1, model = %self.model, "Calling transcription API");

            match self.attempt(api_key, audio).await {
                Ok(transcript) => {
                    tracing::info!(
                        chars = transcript.text.chars().count(),
                        segments = transcript.segments.len(),
                        "Transcription complete"
                    );
                    return Ok(transcript);
                }
                Err(AttemptError::Fatal(error)) => return Err(error),
                Err(AttemptError::Retry(error, status)) => {
                    if attempt + 1 < self.max_retries {
                        let delay = match status.map(|s| retry_decision(s, attempt, self.retry_delay)) {
                            Some(RetryDecision::RetryAfter(delay)) => delay,
                            _ => self.retry_delay,
                        };
                        tracing::warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "Transcription attempt failed: {}",
                            error
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = error;
                }
            }
        }

        Err(last_error)
    }

    async fn health_snapshot(&self) -> HealthSnapshot {
        let snapshot = if self.credentials.has_api_key() {
            HealthSnapshot::ok("audio_transcriber")
        } else {
            HealthSnapshot::unavailable("audio_transcriber", "API key not configured")
        };
        self.credentials
            .credential_statuses()
            .into_iter()
            .fold(snapshot, |snapshot, (name, status)| snapshot.with_credential(&name, status))
    }
}
