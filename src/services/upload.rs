use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::models::job::{Job, JobStatus, UploadKind};
use crate::services::api::{ApiError, PantryApi};
use crate::services::compress::{compress_image, CompressionSettings};
use crate::services::extraction::{self, Extraction, ExtractionError, ScanMode};

/// Client-side view of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Compressing,
    Uploading,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl From<JobStatus> for UploadPhase {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Queued => UploadPhase::Queued,
            JobStatus::Processing => UploadPhase::Processing,
            JobStatus::Completed => UploadPhase::Completed,
            JobStatus::Failed => UploadPhase::Failed,
        }
    }
}

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How often and how long to poll a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first status call.
    pub interval: Duration,
    /// Multiplier applied to the delay after each non-terminal report. `1.0` disables backoff.
    pub backoff_factor: f64,
    pub max_interval: Duration,
    /// Give up after this long. `None` polls until a terminal status or cancellation.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            backoff_factor: 1.5,
            max_interval: Duration::from_secs(10),
            max_wait: Some(Duration::from_secs(120)),
        }
    }
}

impl PollPolicy {
    /// Constant interval, no deadline.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            backoff_factor: 1.0,
            max_interval: interval,
            max_wait: None,
        }
    }

    /// Delay before the first status call, never below one millisecond.
    pub fn initial_delay(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }

    /// Delay after another non-terminal report. Saturates at `max_interval` for any factor.
    pub fn next_delay(&self, current: Duration) -> Duration {
        if self.backoff_factor.is_nan() || self.backoff_factor <= 1.0 {
            return current;
        }
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// Submits images for analysis and polls the resulting jobs.
pub struct UploadClient {
    api: Arc<dyn PantryApi>,
    user_id: String,
    policy: PollPolicy,
    compression: CompressionSettings,
    phase: Arc<watch::Sender<UploadPhase>>,
}

impl UploadClient {
    pub fn new(
        api: Arc<dyn PantryApi>,
        user_id: impl Into<String>,
        policy: PollPolicy,
        compression: CompressionSettings,
    ) -> Self {
        let (phase, _) = watch::channel(UploadPhase::Idle);
        Self {
            api,
            user_id: user_id.into(),
            policy,
            compression,
            phase: Arc::new(phase),
        }
    }

    pub fn phase(&self) -> UploadPhase {
        *self.phase.borrow()
    }

    /// Observe phase changes (e.g. to drive a progress indicator).
    pub fn subscribe(&self) -> watch::Receiver<UploadPhase> {
        self.phase.subscribe()
    }

    /// Compress and upload an image. Returns the freshly queued job.
    pub async fn submit(&self, image: &[u8], file_name: &str, kind: UploadKind) -> Result<Job, UploadError> {
        self.phase.send_replace(UploadPhase::Compressing);
        let compressed = compress_image(image, file_name, self.compression);

        self.phase.send_replace(UploadPhase::Uploading);
        let job_id = match self
            .api
            .upload_image(&self.user_id, kind, &compressed.file_name, compressed.bytes)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, kind = %kind, "Image upload failed");
                self.phase.send_replace(UploadPhase::Failed);
                return Err(UploadError::Transport(e));
            }
        };

        metrics::counter!("ingest_jobs_submitted", "kind" => kind.to_string()).increment(1);
        tracing::info!(job_id = %job_id, kind = %kind, "Analysis job submitted");

        self.phase.send_replace(UploadPhase::Queued);
        Ok(Job::new(job_id, kind))
    }

    /// Poll a job until it completes, fails, times out, or `cancel` fires.
    pub async fn poll(&self, job: Job, cancel: &CancellationToken) -> Result<Job, UploadError> {
        poll_job(self.api.as_ref(), self.policy, job, cancel, &self.phase).await
    }

    /// Poll on a background task. Dropping the handle stops the timer.
    pub fn spawn_poll(&self, job: Job) -> PollHandle {
        let cancel = CancellationToken::new();
        let api = Arc::clone(&self.api);
        let policy = self.policy;
        let phase = Arc::clone(&self.phase);
        let token = cancel.clone();

        let task = tokio::spawn(async move { poll_job(api.as_ref(), policy, job, &token, &phase).await });

        PollHandle {
            task,
            cancel: cancel.clone(),
            _guard: cancel.drop_guard(),
        }
    }

    /// Submit, poll to completion, and map the result onto drafts.
    pub async fn analyze(
        &self,
        image: &[u8],
        file_name: &str,
        mode: ScanMode,
        cancel: &CancellationToken,
    ) -> Result<Extraction, UploadError> {
        let job = self.submit(image, file_name, mode.upload_kind()).await?;
        let job = self.poll(job, cancel).await?;
        let result = job.result.unwrap_or_default();
        extraction::extract(mode, &result).map_err(|e| {
            tracing::error!(job_id = %job.id, error = %e, "Analyzer result could not be mapped to drafts");
            self.phase.send_replace(UploadPhase::Failed);
            UploadError::Malformed(e)
        })
    }
}

/// A poll loop running on its own task.
pub struct PollHandle {
    task: JoinHandle<Result<Job, UploadError>>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl PollHandle {
    /// Stop polling. The server-side job keeps running; its result is never collected.
    pub fn abandon(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> Result<Job, UploadError> {
        let PollHandle { task, _guard, .. } = self;
        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Poll task aborted");
                Err(UploadError::Cancelled)
            }
        }
    }
}

async fn poll_job(
    api: &dyn PantryApi,
    policy: PollPolicy,
    mut job: Job,
    cancel: &CancellationToken,
    phase: &watch::Sender<UploadPhase>,
) -> Result<Job, UploadError> {
    let started = Instant::now();
    let deadline = policy.max_wait.map(|max| started + max);
    let mut delay = policy.initial_delay();
    let mut attempts: u32 = 0;

    loop {
        let wake = match deadline {
            Some(d) => (Instant::now() + delay).min(d),
            None => Instant::now() + delay,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(abandon(&job, phase)),
            _ = tokio::time::sleep_until(wake) => {}
        }

        if let Some(d) = deadline {
            if Instant::now() >= d {
                let waited = started.elapsed();
                tracing::warn!(job_id = %job.id, attempts, waited_ms = waited.as_millis() as u64, "Job polling timed out");
                metrics::counter!("ingest_jobs_failed", "reason" => "timeout").increment(1);
                phase.send_replace(UploadPhase::Failed);
                return Err(UploadError::Timeout(waited));
            }
        }

        attempts += 1;
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(abandon(&job, phase)),
            report = api.job_status(&job.id) => report,
        };

        let report = match report {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(job_id = %job.id, attempts, error = %e, "Job status check failed");
                metrics::counter!("ingest_jobs_failed", "reason" => "transport").increment(1);
                phase.send_replace(UploadPhase::Failed);
                return Err(UploadError::Transport(e));
            }
        };

        job.advance(report);
        phase.send_replace(job.status.into());

        match job.status {
            JobStatus::Completed => {
                metrics::counter!("ingest_jobs_completed").increment(1);
                metrics::histogram!("ingest_job_wait_seconds").record(started.elapsed().as_secs_f64());
                tracing::info!(job_id = %job.id, attempts, "Analysis job completed");
                return Ok(job);
            }
            JobStatus::Failed => {
                let message = job.error.clone().unwrap_or_default();
                metrics::counter!("ingest_jobs_failed", "reason" => "analysis").increment(1);
                tracing::warn!(job_id = %job.id, attempts, error = %message, "Analysis job failed");
                return Err(UploadError::Analysis(message));
            }
            JobStatus::Queued | JobStatus::Processing => {
                tracing::debug!(job_id = %job.id, attempts, status = ?job.status, "Job still running");
                delay = policy.next_delay(delay);
            }
        }
    }
}

fn abandon(job: &Job, phase: &watch::Sender<UploadPhase>) -> UploadError {
    tracing::info!(job_id = %job.id, "Polling abandoned; server job left to finish on its own");
    phase.send_replace(UploadPhase::Cancelled);
    UploadError::Cancelled
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Network error while talking to the analyzer: {0}")]
    Transport(#[source] ApiError),

    #[error("{0}")]
    Analysis(String),

    #[error("Analysis did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Polling was cancelled")]
    Cancelled,

    #[error("Analyzer returned an unusable result: {0}")]
    Malformed(#[from] ExtractionError),
}
