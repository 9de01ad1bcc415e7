use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One step of a transcription job, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Classify,
    Fetch,
    ExtractAudio,
    Transcribe,
    FormatText,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Classify,
        Stage::Fetch,
        Stage::ExtractAudio,
        Stage::Transcribe,
        Stage::FormatText,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Classify => "classify",
            Stage::Fetch => "fetch",
            Stage::ExtractAudio => "extract-audio",
            Stage::Transcribe => "transcribe",
            Stage::FormatText => "format-text",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    /// Stages that must have succeeded before this one may start
    pub fn predecessors(&self) -> &'static [Stage] {
        &Stage::ALL[..self.index()]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Succeeded | StageStatus::Failed | StageStatus::Skipped
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Status, timing and outcome of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub status: StageStatus,
    pub attempts: u32,
    pub elapsed: Option<Duration>,
    pub error: Option<String>,
}

impl Default for StageRecord {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            attempts: 0,
            elapsed: None,
            error: None,
        }
    }
}

/// Rejected stage transition
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("stage {stage} cannot move from {from} to {to}")]
    InvalidTransition {
        stage: Stage,
        from: StageStatus,
        to: StageStatus,
    },

    #[error("stage {stage} cannot start while {predecessor} is {status}")]
    PredecessorIncomplete {
        stage: Stage,
        predecessor: Stage,
        status: StageStatus,
    },
}

/// Per-job stage state machine.
///
/// Each stage moves `pending -> running -> succeeded | failed` or `pending -> skipped`,
/// exactly once. A stage starts only after every earlier stage has succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTracker {
    records: [StageRecord; 5],
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, stage: Stage) -> &StageRecord {
        &self.records[stage.index()]
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        self.record(stage).status
    }

    /// Statuses in execution order
    pub fn statuses(&self) -> Vec<(Stage, StageStatus)> {
        Stage::ALL.iter().map(|s| (*s, self.status(*s))).collect()
    }

    pub fn start(&mut self, stage: Stage) -> Result<(), TransitionError> {
        for predecessor in stage.predecessors() {
            let status = self.status(*predecessor);
            if status != StageStatus::Succeeded {
                return Err(TransitionError::PredecessorIncomplete {
                    stage,
                    predecessor: *predecessor,
                    status,
                });
            }
        }
        self.transition(stage, StageStatus::Pending, StageStatus::Running)
    }

    pub fn succeed(&mut self, stage: Stage, elapsed: Duration) -> Result<(), TransitionError> {
        self.transition(stage, StageStatus::Running, StageStatus::Succeeded)?;
        self.records[stage.index()].elapsed = Some(elapsed);
        Ok(())
    }

    pub fn fail(&mut self, stage: Stage, elapsed: Duration, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(stage, StageStatus::Running, StageStatus::Failed)?;
        let record = &mut self.records[stage.index()];
        record.elapsed = Some(elapsed);
        record.error = Some(error.into());
        Ok(())
    }

    /// Record how many attempts a stage took
    pub fn record_attempts(&mut self, stage: Stage, attempts: u32) {
        self.records[stage.index()].attempts = attempts;
    }

    /// Mark every stage that has not started as skipped
    pub fn skip_remaining(&mut self) {
        for record in self.records.iter_mut() {
            if record.status == StageStatus::Pending {
                record.status = StageStatus::Skipped;
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.records.iter().all(|r| r.status.is_terminal())
    }

    fn transition(&mut self, stage: Stage, from: StageStatus, to: StageStatus) -> Result<(), TransitionError> {
        let record = &mut self.records[stage.index()];
        if record.status != from {
            return Err(TransitionError::InvalidTransition {
                stage,
                from: record.status,
                to,
            });
        }
        record.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_and_order() {
        let labels: Vec<&str> = Stage::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(
            labels,
            vec!["classify", "fetch", "extract-audio", "transcribe", "format-text"]
        );
        assert_eq!(Stage::Transcribe.predecessors().len(), 3);
        assert!(Stage::Classify.predecessors().is_empty());
        assert_eq!(
            serde_json::to_string(&Stage::ExtractAudio).unwrap(),
            "\"extract-audio\""
        );
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut tracker = StageTracker::new();
        for stage in Stage::ALL {
            tracker.start(stage).unwrap();
            assert_eq!(tracker.status(stage), StageStatus::Running);
            tracker.succeed(stage, Duration::from_millis(5)).unwrap();
        }
        assert!(tracker.is_complete());
        assert_eq!(
            tracker.record(Stage::Fetch).elapsed,
            Some(Duration::from_millis(5))
        );
    }

    #[test]
    fn test_cannot_start_out_of_order() {
        let mut tracker = StageTracker::new();
        let err = tracker.start(Stage::Fetch).unwrap_err();
        assert_eq!(
            err,
            TransitionError::PredecessorIncomplete {
                stage: Stage::Fetch,
                predecessor: Stage::Classify,
                status: StageStatus::Pending,
            }
        );
    }

    #[test]
    fn test_transitions_happen_once() {
        let mut tracker = StageTracker::new();
        tracker.start(Stage::Classify).unwrap();
        tracker
            .fail(Stage::Classify, Duration::ZERO, "unrecognized")
            .unwrap();

        assert!(tracker.start(Stage::Classify).is_err());
        assert!(tracker.succeed(Stage::Classify, Duration::ZERO).is_err());
        assert_eq!(
            tracker.record(Stage::Classify).error.as_deref(),
            Some("unrecognized")
        );
    }

    #[test]
    fn test_skip_remaining_leaves_finished_stages() {
        let mut tracker = StageTracker::new();
        tracker.start(Stage::Classify).unwrap();
        tracker.succeed(Stage::Classify, Duration::ZERO).unwrap();
        tracker.start(Stage::Fetch).unwrap();
        tracker.fail(Stage::Fetch, Duration::ZERO, "404").unwrap();
        tracker.skip_remaining();

        assert_eq!(
            tracker.statuses(),
            vec![
                (Stage::Classify, StageStatus::Succeeded),
                (Stage::Fetch, StageStatus::Failed),
                (Stage::ExtractAudio, StageStatus::Skipped),
                (Stage::Transcribe, StageStatus::Skipped),
                (Stage::FormatText, StageStatus::Skipped),
            ]
        );
        assert!(tracker.is_complete());
    }
}
