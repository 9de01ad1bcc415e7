use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::envelope::{ResultEnvelope, TranscribeRequest};
use super::error::PipelineError;
use super::job::Job;
use super::retry::{RetryError, RetryPolicy};
use super::stage::Stage;
use crate::audio::{AudioExtractor, FfmpegExtractor};
use crate::config::Config;
use crate::fetch::{FetchError, FetchedMedia, MediaFetcher, PlatformFetcher};
use crate::health::ServiceHealth;
use crate::platform::{ClassifierRegistry, PlatformClassifier};
use crate::text::{ChatFormatter, TextFormatter};
use crate::transcribe::{Transcriber, WhisperTranscriber};

/// Drives a job through classify, fetch, extract-audio, transcribe and format-text.
///
/// The controller holds no per-job state; concurrent calls each own their `Job`.
#[derive(Clone)]
pub struct PipelineController {
    classifier: Arc<dyn PlatformClassifier>,
    fetcher: Arc<dyn MediaFetcher>,
    extractor: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn Transcriber>,
    formatter: Arc<dyn TextFormatter>,
    retry: RetryPolicy,
    work_root: Option<PathBuf>,
}

impl PipelineController {
    pub fn new(
        classifier: Arc<dyn PlatformClassifier>,
        fetcher: Arc<dyn MediaFetcher>,
        extractor: Arc<dyn AudioExtractor>,
        transcriber: Arc<dyn Transcriber>,
        formatter: Arc<dyn TextFormatter>,
    ) -> Self {
        Self {
            classifier,
            fetcher,
            extractor,
            transcriber,
            formatter,
            retry: RetryPolicy::default(),
            work_root: None,
        }
    }

    /// Production collaborators, each built from its own config section
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(ClassifierRegistry::new(config.pipeline.accept_generic_links)),
            Arc::new(PlatformFetcher::from_config(&config.download)),
            Arc::new(FfmpegExtractor::from_config(&config.audio)),
            Arc::new(WhisperTranscriber::from_config(&config.openai)),
            Arc::new(ChatFormatter::from_config(&config.openai)),
        )
        .with_retry_policy(RetryPolicy::from_config(&config.pipeline))
        .with_work_root(config.download.work_dir.clone())
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Parent directory for per-job scratch space; the system temp dir when `None`
    pub fn with_work_root(mut self, work_root: Option<PathBuf>) -> Self {
        self.work_root = work_root;
        self
    }

    /// Process one URL and return the response envelope
    pub async fn process(&self, url: &str) -> ResultEnvelope {
        self.process_with_cancel(url, CancellationToken::new()).await
    }

    pub async fn process_with_cancel(&self, url: &str, cancel: CancellationToken) -> ResultEnvelope {
        let job = self.run(url, cancel).await;
        ResultEnvelope::checked(&job)
    }

    /// Process a request body; a missing `video_url` is rejected before any stage runs
    pub async fn process_request(&self, request: &TranscribeRequest, cancel: CancellationToken) -> ResultEnvelope {
        let url = request.video_url.as_deref().unwrap_or_default();
        self.process_with_cancel(url, cancel).await
    }

    /// Run the job and return it with stage statuses and timings
    pub async fn run(&self, url: &str, cancel: CancellationToken) -> Job {
        let mut job = Job::new(url.trim());
        let span = tracing::info_span!("job", job_id = %job.id, input_url = %job.input_url);

        async {
            if let Err(error) = self.drive(&mut job, &cancel).await {
                match &error {
                    PipelineError::Cancelled { .. } => {
                        tracing::warn!(stage = ?error.stage(), "Job aborted: {}", error)
                    }
                    _ => tracing::error!(
                        kind = ?error.kind(),
                        stage = ?error.stage(),
                        "Job aborted: {}",
                        error
                    ),
                }
                job.abort(error);
            }
            job.finish();
            debug_assert!(job.stages.is_complete());

            if job.error.is_none() {
                tracing::info!(
                    text_processing = job.text_processing_success(),
                    elapsed_ms = job.duration().map(|d| d.num_milliseconds()),
                    "Job completed"
                );
            }
        }
        .instrument(span)
        .await;

        job
    }

    /// Aggregate every collaborator's health snapshot
    pub async fn health(&self) -> ServiceHealth {
        ServiceHealth::aggregate(vec![
            self.classifier.health_snapshot(),
            self.fetcher.health_snapshot().await,
            self.extractor.health_snapshot().await,
            self.transcriber.health_snapshot().await,
            self.formatter.health_snapshot().await,
        ])
    }

    async fn drive(&self, job: &mut Job, cancel: &CancellationToken) -> Result<(), PipelineError> {
        if job.input_url.is_empty() {
            return Err(PipelineError::missing_url());
        }

        // classify
        let started = begin(job, Stage::Classify, cancel)?;
        let platform = match self.classifier.classify(&job.input_url) {
            Some(platform) => platform,
            None => {
                let error = PipelineError::UnsupportedPlatform(job.input_url.clone());
                fail(job, Stage::Classify, started, &error)?;
                return Err(error);
            }
        };
        job.platform_info = Some(platform.clone());
        succeed(job, Stage::Classify, started)?;

        // fetch
        let started = begin(job, Stage::Fetch, cancel)?;
        let work_dir = match self.create_work_dir() {
            Ok(dir) => dir,
            Err(source) => {
                let error = PipelineError::Fetch { attempts: 0, source };
                fail(job, Stage::Fetch, started, &error)?;
                return Err(error);
            }
        };
        let work_path = work_dir.path().to_path_buf();

        let fetched = self
            .retry
            .run(cancel, |attempt| {
                let fetcher = Arc::clone(&self.fetcher);
                let platform = platform.clone();
                let work_path = work_path.clone();
                async move {
                    tracing::debug!(attempt = attempt + 1, "Fetching media");
                    fetcher.fetch(&platform, &work_path).await
                }
            })
            .await;

        let media: FetchedMedia = match fetched {
            Ok(outcome) => {
                job.stages.record_attempts(Stage::Fetch, outcome.attempts);
                outcome.result
            }
            Err(RetryError::Failed { error, attempts }) => {
                job.stages.record_attempts(Stage::Fetch, attempts);
                let error = PipelineError::Fetch {
                    attempts,
                    source: error,
                };
                fail(job, Stage::Fetch, started, &error)?;
                return Err(error);
            }
            Err(RetryError::Cancelled { attempts }) => {
                job.stages.record_attempts(Stage::Fetch, attempts);
                let error = PipelineError::Cancelled { stage: Stage::Fetch };
                fail(job, Stage::Fetch, started, &error)?;
                return Err(error);
            }
        };
        job.video_info = Some(media.info.clone());
        succeed(job, Stage::Fetch, started)?;

        // extract-audio
        let started = begin(job, Stage::ExtractAudio, cancel)?;
        let audio = match self.extractor.extract_audio(&media.path, &work_path).await {
            Ok(audio) => audio,
            Err(source) => {
                let error = PipelineError::Extraction(source);
                fail(job, Stage::ExtractAudio, started, &error)?;
                return Err(error);
            }
        };
        succeed(job, Stage::ExtractAudio, started)?;

        // transcribe
        let started = begin(job, Stage::Transcribe, cancel)?;
        let transcript = match self.transcriber.transcribe(&audio).await {
            Ok(transcript) => transcript,
            Err(source) => {
                let error = PipelineError::Transcription(source);
                fail(job, Stage::Transcribe, started, &error)?;
                return Err(error);
            }
        };
        let text = transcript.text.clone();
        job.transcript = Some(transcript);
        succeed(job, Stage::Transcribe, started)?;

        // scratch files are no longer needed
        drop(work_dir);

        // format-text
        if let Err(error) = self.format_text(job, &text, cancel).await {
            if !error.is_recoverable() {
                return Err(error);
            }
            tracing::warn!(
                stage = ?error.stage(),
                kind = ?error.kind(),
                "Text processing failed, returning raw transcript: {}",
                error
            );
            job.degrade(error);
        }

        Ok(())
    }

    async fn format_text(&self, job: &mut Job, text: &str, cancel: &CancellationToken) -> Result<(), PipelineError> {
        let started = begin(job, Stage::FormatText, cancel)?;
        match self.formatter.format(text).await {
            Ok(formatted) => {
                job.formatted_text = Some(formatted);
                succeed(job, Stage::FormatText, started)
            }
            Err(source) => {
                let error = PipelineError::Formatting(source);
                fail(job, Stage::FormatText, started, &error)?;
                Err(error)
            }
        }
    }

    fn create_work_dir(&self) -> Result<tempfile::TempDir, FetchError> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("linkscribe-");
            builder
        };

        let dir = match &self.work_root {
            Some(root) => {
                fs_err::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!(work_dir = %dir.path().display(), "Created job work directory");
        Ok(dir)
    }
}

fn begin(job: &mut Job, stage: Stage, cancel: &CancellationToken) -> Result<Instant, PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { stage });
    }
    job.stages.start(stage)?;
    tracing::info!(stage = %stage, "Stage started");
    Ok(Instant::now())
}

fn succeed(job: &mut Job, stage: Stage, started: Instant) -> Result<(), PipelineError> {
    let elapsed = started.elapsed();
    job.stages.succeed(stage, elapsed)?;
    tracing::info!(
        stage = %stage,
        elapsed_ms = elapsed.as_millis() as u64,
        "Stage succeeded"
    );
    Ok(())
}

fn fail(job: &mut Job, stage: Stage, started: Instant, error: &PipelineError) -> Result<(), PipelineError> {
    job.stages.fail(stage, started.elapsed(), error.to_string())?;
    Ok(())
}
