//! Health reporting for pipeline collaborators.
//!
//! Every leaf collaborator exposes a `health_snapshot()` describing whether it can
//! run and which credentials it was constructed with. The service layer folds the
//! snapshots into a single [`ServiceHealth`] report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a collaborator can currently do its job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Ok,
    Unavailable,
}

/// Whether an external credential was supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Configured,
    Missing,
}

impl CredentialStatus {
    pub fn from_present(present: bool) -> Self {
        if present {
            CredentialStatus::Configured
        } else {
            CredentialStatus::Missing
        }
    }
}

/// Point-in-time health of one collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub component: String,
    pub status: ComponentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub credentials: BTreeMap<String, CredentialStatus>,
}

impl HealthSnapshot {
    pub fn ok(component: &str) -> Self {
        Self {
            component: component.to_string(),
            status: ComponentStatus::Ok,
            detail: None,
            credentials: BTreeMap::new(),
        }
    }

    pub fn unavailable(component: &str, detail: impl Into<String>) -> Self {
        Self {
            component: component.to_string(),
            status: ComponentStatus::Unavailable,
            detail: Some(detail.into()),
            credentials: BTreeMap::new(),
        }
    }

    pub fn with_credential(mut self, name: &str, status: CredentialStatus) -> Self {
        self.credentials.insert(name.to_string(), status);
        self
    }
}

/// Overall verdict reported by the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

/// Aggregated health of every collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub components: BTreeMap<String, ComponentStatus>,
    pub credentials: BTreeMap<String, CredentialStatus>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl ServiceHealth {
    /// Fold snapshots into one report. A credential shared by several components is
    /// reported missing if any of them lacks it.
    pub fn aggregate(snapshots: Vec<HealthSnapshot>) -> Self {
        let mut components = BTreeMap::new();
        let mut credentials: BTreeMap<String, CredentialStatus> = BTreeMap::new();
        let mut details = BTreeMap::new();

        for snapshot in snapshots {
            for (name, status) in snapshot.credentials {
                let entry = credentials.entry(name).or_insert(status);
                if status == CredentialStatus::Missing {
                    *entry = CredentialStatus::Missing;
                }
            }
            if let Some(detail) = snapshot.detail {
                details.insert(snapshot.component.clone(), detail);
            }
            components.insert(snapshot.component, snapshot.status);
        }

        let healthy = components.values().all(|s| *s == ComponentStatus::Ok)
            && credentials.values().all(|c| *c == CredentialStatus::Configured);

        Self {
            status: if healthy {
                OverallStatus::Healthy
            } else {
                OverallStatus::Degraded
            },
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            components,
            credentials,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_ok_is_healthy() {
        let health = ServiceHealth::aggregate(vec![
            HealthSnapshot::ok("link_classifier"),
            HealthSnapshot::ok("audio_transcriber")
                .with_credential("openai_api_key", CredentialStatus::Configured),
        ]);

        assert_eq!(health.status, OverallStatus::Healthy);
        assert_eq!(health.components.len(), 2);
        assert!(health.details.is_empty());
    }

    #[test]
    fn test_missing_credential_wins_across_components() {
        let health = ServiceHealth::aggregate(vec![
            HealthSnapshot::ok("audio_transcriber")
                .with_credential("openai_api_key", CredentialStatus::Configured),
            HealthSnapshot::ok("text_formatter")
                .with_credential("openai_api_key", CredentialStatus::Missing),
        ]);

        assert_eq!(health.status, OverallStatus::Degraded);
        assert_eq!(
            health.credentials["openai_api_key"],
            CredentialStatus::Missing
        );
    }

    #[test]
    fn test_unavailable_component_carries_detail() {
        let health = ServiceHealth::aggregate(vec![HealthSnapshot::unavailable(
            "audio_extractor",
            "ffmpeg not found",
        )]);

        assert_eq!(health.status, OverallStatus::Degraded);
        assert_eq!(health.details["audio_extractor"], "ffmpeg not found");
    }

    #[test]
    fn test_serialized_shape() {
        let snapshot = HealthSnapshot::ok("media_fetcher");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json.get("credentials").is_none());
    }
}
