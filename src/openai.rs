//! Shared plumbing for OpenAI-compatible HTTP APIs.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::health::CredentialStatus;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Credentials handed to each API-backed collaborator at construction time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiCredentials {
    api_key: Option<String>,
    base_url: Option<String>,
}

impl ApiCredentials {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        let clean = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            api_key: clean(api_key),
            base_url: clean(base_url),
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Base URL without a trailing slash, falling back to the public endpoint
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    /// Status of each credential, keyed the way the health endpoint reports them
    pub fn credential_statuses(&self) -> BTreeMap<String, CredentialStatus> {
        let mut statuses = BTreeMap::new();
        statuses.insert(
            "openai_api_key".to_string(),
            CredentialStatus::from_present(self.api_key.is_some()),
        );
        statuses.insert(
            "openai_base_url".to_string(),
            CredentialStatus::from_present(self.base_url.is_some()),
        );
        statuses
    }
}

/// What to do after a failed API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay
    RetryAfter(Duration),
    /// The request itself is wrong; repeating it cannot help
    GiveUp,
}

/// Decide whether a failed HTTP status is worth retrying.
///
/// `attempt` counts from zero. Rate limits back off exponentially, gateway errors wait
/// longer than the base delay, other server errors wait the base delay.
pub fn retry_decision(status: u16, attempt: u32, base_delay: Duration) -> RetryDecision {
    match status {
        400 | 401 | 403 | 404 | 413 | 422 => RetryDecision::GiveUp,
        429 => RetryDecision::RetryAfter(exponential_backoff(base_delay, attempt)),
        502 | 503 => RetryDecision::RetryAfter(
            exponential_backoff(base_delay, attempt) + Duration::from_secs(5),
        ),
        s if s >= 500 => RetryDecision::RetryAfter(base_delay),
        _ => RetryDecision::GiveUp,
    }
}

/// `base * 2^attempt`, capped at five minutes
pub fn exponential_backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(16));
    base.saturating_mul(factor).min(Duration::from_secs(300))
}

/// Trim an error body for inclusion in messages
pub fn error_excerpt(body: &str) -> String {
    crate::utils::preview(body.trim(), 200)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_credentials_are_missing() {
        let credentials = ApiCredentials::new(Some("  ".into()), None);
        assert!(!credentials.has_api_key());
        assert_eq!(credentials.base_url(), DEFAULT_BASE_URL);

        let statuses = credentials.credential_statuses();
        assert_eq!(statuses["openai_api_key"], CredentialStatus::Missing);
        assert_eq!(statuses["openai_base_url"], CredentialStatus::Missing);
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let credentials = ApiCredentials::new(
            Some("sk-test".into()),
            Some("https://proxy.example.com/v1/".into()),
        );
        assert_eq!(
            credentials.endpoint("/audio/transcriptions"),
            "https://proxy.example.com/v1/audio/transcriptions"
        );
        assert_eq!(
            credentials.credential_statuses()["openai_api_key"],
            CredentialStatus::Configured
        );
    }

    #[test]
    fn test_retry_decisions() {
        let base = Duration::from_secs(2);
        assert_eq!(retry_decision(401, 0, base), RetryDecision::GiveUp);
        assert_eq!(retry_decision(400, 0, base), RetryDecision::GiveUp);
        assert_eq!(
            retry_decision(429, 2, base),
            RetryDecision::RetryAfter(Duration::from_secs(8))
        );
        assert_eq!(
            retry_decision(503, 0, base),
            RetryDecision::RetryAfter(Duration::from_secs(7))
        );
        assert_eq!(retry_decision(500, 3, base), RetryDecision::RetryAfter(base));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(
            exponential_backoff(Duration::from_secs(2), 40),
            Duration::from_secs(300)
        );
    }
}
