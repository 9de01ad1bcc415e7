use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;

use crate::config::OpenAiConfig;
use crate::health::HealthSnapshot;
use crate::openai::{error_excerpt, retry_decision, ApiCredentials, RetryDecision};
use crate::utils::build_http_client;

/// What the text stage does with a raw transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TextTask {
    /// Restructure as a Markdown document
    #[default]
    Format,
    /// Fix grammar, punctuation and dictation mistakes
    Correct,
    /// Condense to the key points
    Summarize,
}

impl TextTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextTask::Format => "format",
            TextTask::Correct => "correct",
            TextTask::Summarize => "summarize",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            TextTask::Format => {
                "You are a professional text-processing assistant specialising in text formatting. \
                 Complete the user's request and return an accurate, useful result."
            }
            TextTask::Correct => {
                "You are a professional text-processing assistant specialising in text correction. \
                 Complete the user's request and return an accurate, useful result."
            }
            TextTask::Summarize => {
                "You are a professional text-processing assistant specialising in summarisation. \
                 Complete the user's request and return an accurate, useful result."
            }
        }
    }

    fn user_prompt(&self, transcript: &str) -> String {
        let instructions = match self {
            TextTask::Format => {
                "Format the following transcript as Markdown:\n\
                 1. Add suitable headings and paragraphs\n\
                 2. Use Markdown syntax to improve readability\n\
                 3. Keep the content complete\n\
                 4. Add emphasis and lists where appropriate"
            }
            TextTask::Correct => {
                "Correct the errors in the following transcript:\n\
                 1. Grammar mistakes\n\
                 2. Punctuation mistakes\n\
                 3. Obvious dictation mistakes\n\
                 4. Keep the original meaning unchanged"
            }
            TextTask::Summarize => {
                "Summarise the main content of the following transcript:\n\
                 1. Extract the key information\n\
                 2. Outline the main points\n\
                 3. Stay objective and accurate\n\
                 4. Keep the summary a moderate length"
            }
        };
        format!("{}\n\nTranscript:\n{}", instructions, transcript)
    }
}

impl fmt::Display for TextTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while post-processing a transcript
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormattingError {
    #[error("text processing API key is not configured")]
    NotConfigured,

    #[error("text processing API key is invalid or expired")]
    Unauthorized,

    #[error("text processing API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("text processing request failed: {0}")]
    Network(String),

    #[error("text processing request timed out")]
    Timeout,

    #[error("text processing API returned empty content")]
    EmptyContent,

    #[error("nothing to process: transcript is empty")]
    EmptyInput,
}

impl From<reqwest::Error> for FormattingError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FormattingError::Timeout
        } else {
            FormattingError::Network(error.to_string())
        }
    }
}

/// Turns a raw transcript into a cleaned-up document
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextFormatter: Send + Sync {
    async fn format(&self, text: &str) -> Result<String, FormattingError>;

    async fn health_snapshot(&self) -> HealthSnapshot;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Formatter backed by an OpenAI-compatible `/chat/completions` endpoint
pub struct ChatFormatter {
    client: Client,
    credentials: ApiCredentials,
    model: String,
    task: TextTask,
    max_retries: u32,
    retry_delay: Duration,
}

impl ChatFormatter {
    pub fn new(credentials: ApiCredentials, model: impl Into<String>, task: TextTask, timeout: Duration) -> Self {
        let client = build_http_client(Client::builder().timeout(timeout), "text_formatter");

        Self {
            client,
            credentials,
            model: model.into(),
            task,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn from_config(config: &OpenAiConfig) -> Self {
        let mut formatter = Self::new(
            config.credentials(),
            config.gpt_model.clone(),
            config.text_task,
            Duration::from_secs(config.format_timeout_secs),
        );
        formatter.max_retries = config.max_retries.max(1);
        formatter.retry_delay = Duration::from_secs(config.retry_delay_secs);
        formatter
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.task.system_prompt() },
                { "role": "user", "content": self.task.user_prompt(text) },
            ],
            "max_tokens": 2000,
            "temperature": 0.3,
        })
    }

    /// Returns the delay before the next attempt, or the error if retrying cannot help
    async fn call_once(&self, api_key: &str, text: &str, attempt: u32) -> Result<String, (FormattingError, Option<Duration>)> {
        let response = self
            .client
            .post(self.credentials.endpoint("chat/completions"))
            .bearer_auth(api_key)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| (FormattingError::from(e), Some(self.retry_delay)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = if status == 401 {
                FormattingError::Unauthorized
            } else {
                FormattingError::Api {
                    status,
                    message: error_excerpt(&body),
                }
            };
            return match retry_decision(status, attempt, self.retry_delay) {
                RetryDecision::GiveUp => Err((error, None)),
                RetryDecision::RetryAfter(delay) => Err((error, Some(delay))),
            };
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| (FormattingError::Network(e.to_string()), None))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or((FormattingError::EmptyContent, Some(self.retry_delay)))
    }
}

#[async_trait]
impl TextFormatter for ChatFormatter {
    async fn format(&self, text: &str) -> Result<String, FormattingError> {
        let api_key = self
            .credentials
            .api_key()
            .ok_or(FormattingError::NotConfigured)?;

        if text.trim().is_empty() {
            return Err(FormattingError::EmptyInput);
        }

        let mut last_error = FormattingError::EmptyContent;
        for attempt in 0..self.max_retries {
            tracing::debug!(
                attempt = attempt + 1,
                task = %self.task,
                model = %self.model,
                "Calling chat completion API"
            );

            match self.call_once(api_key, text, attempt).await {
                Ok(content) => {
                    tracing::info!(task = %self.task, chars = content.chars().count(), "Text processing complete");
                    return Ok(content);
                }
                Err((error, None)) => return Err(error),
                Err((error, Some(delay))) => {
                    if attempt + 1 < self.max_retries {
                        tracing::warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "Text processing attempt failed: {}",
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
            HealthSnapshot::ok("text_formatter")
        } else {
            HealthSnapshot::unavailable("text_formatter", "API key not configured")
        };
        self.credentials
            .credential_statuses()
            .into_iter()
            .fold(snapshot, |snapshot, (name, status)| snapshot.with_credential(&name, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let formatter = ChatFormatter::new(
            ApiCredentials::new(Some("sk-test".into()), None),
            "gpt-4o",
            TextTask::Summarize,
            Duration::from_secs(5),
        );
        let body = formatter.request_body("hello world");

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"][0]["role"], "system");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.starts_with("Summarise"));
        assert!(user.ends_with("hello world"));
    }

    #[test]
    fn test_task_names() {
        assert_eq!(TextTask::default(), TextTask::Format);
        assert_eq!(serde_json::to_string(&TextTask::Correct).unwrap(), "\"correct\"");
        assert_eq!(TextTask::Summarize.to_string(), "summarize");
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let formatter = ChatFormatter::new(
            ApiCredentials::default(),
            "gpt-4o",
            TextTask::Format,
            Duration::from_secs(5),
        );
        let err = tokio_test::block_on(formatter.format("some text")).unwrap_err();
        assert_eq!(err, FormattingError::NotConfigured);

        let snapshot = tokio_test::block_on(formatter.health_snapshot());
        assert_eq!(snapshot.status, crate::health::ComponentStatus::Unavailable);
    }

    #[test]
    fn test_blank_transcript_is_rejected() {
        let formatter = ChatFormatter::new(
            ApiCredentials::new(Some("sk-test".into()), None),
            "gpt-4o",
            TextTask::Format,
            Duration::from_secs(5),
        );
        let err = tokio_test::block_on(formatter.format("   ")).unwrap_err();
        assert_eq!(err, FormattingError::EmptyInput);
    }
}
