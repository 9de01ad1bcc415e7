use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::PipelineError;
use super::stage::{Stage, StageStatus, StageTracker};
use crate::fetch::VideoInfo;
use crate::platform::PlatformInfo;
use crate::transcribe::Transcript;

/// One URL's trip through the pipeline. Owned by a single controller call.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub input_url: String,
    pub platform_info: Option<PlatformInfo>,
    pub video_info: Option<VideoInfo>,
    pub transcript: Option<Transcript>,
    pub formatted_text: Option<String>,
    pub stages: StageTracker,

    /// Failure that stopped the job
    pub error: Option<PipelineError>,

    /// Recoverable text-processing failure absorbed into a partial success
    pub text_error: Option<PipelineError>,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Serializable summary of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub attempts: u32,
    pub elapsed_ms: Option<u64>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(input_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_url: input_url.into(),
            platform_info: None,
            video_info: None,
            transcript: None,
            formatted_text: None,
            stages: StageTracker::new(),
            error: None,
            text_error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// True when every stage through transcription succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.stages.status(Stage::Transcribe) == StageStatus::Succeeded
    }

    pub fn text_processing_success(&self) -> bool {
        self.stages.status(Stage::FormatText) == StageStatus::Succeeded && self.formatted_text.is_some()
    }

    /// Stop the job: keep the error and skip everything not yet started
    pub(crate) fn abort(&mut self, error: PipelineError) {
        self.stages.skip_remaining();
        self.error = Some(error);
    }

    /// Keep the transcript and record why the text stage produced nothing
    pub(crate) fn degrade(&mut self, error: PipelineError) {
        self.text_error = Some(error);
    }

    pub(crate) fn finish(&mut self) {
        self.stages.skip_remaining();
        self.completed_at = Some(Utc::now());
    }

    pub fn stage_reports(&self) -> Vec<StageReport> {
        Stage::ALL
            .iter()
            .map(|stage| {
                let record = self.stages.record(*stage);
                StageReport {
                    stage: *stage,
                    status: record.status,
                    attempts: record.attempts,
                    elapsed_ms: record.elapsed.map(|d| d.as_millis() as u64),
                    error: record.error.clone(),
                }
            })
            .collect()
    }

    /// Wall-clock duration, once the job has completed
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_abort_skips_unstarted_stages() {
        let mut job = Job::new("not-a-url");
        job.stages.start(Stage::Classify).unwrap();
        job.stages.fail(Stage::Classify, Duration::ZERO, "unrecognized").unwrap();
        job.abort(PipelineError::UnsupportedPlatform("not-a-url".into()));
        job.finish();

        assert!(!job.is_success());
        let reports = job.stage_reports();
        assert_eq!(reports[0].status, StageStatus::Failed);
        assert_eq!(reports[0].error.as_deref(), Some("unrecognized"));
        assert!(reports[1..].iter().all(|r| r.status == StageStatus::Skipped));
        assert!(job.duration().is_some());
    }

    #[test]
    fn test_success_needs_transcription() {
        let mut job = Job::new("https://youtu.be/abc");
        for stage in &Stage::ALL[..4] {
            job.stages.start(*stage).unwrap();
            job.stages.succeed(*stage, Duration::from_millis(1)).unwrap();
        }
        assert!(job.is_success());
        assert!(!job.text_processing_success());
    }

    #[test]
    fn test_degraded_job_stays_successful() {
        let mut job = Job::new("https://youtu.be/abc");
        for stage in &Stage::ALL[..4] {
            job.stages.start(*stage).unwrap();
            job.stages.succeed(*stage, Duration::ZERO).unwrap();
        }
        job.degrade(PipelineError::Cancelled {
            stage: Stage::FormatText,
        });
        job.finish();

        assert!(job.is_success());
        assert!(job.error.is_none());
        assert_eq!(job.stages.status(Stage::FormatText), StageStatus::Skipped);
        assert!(job.stages.is_complete());
    }
}
