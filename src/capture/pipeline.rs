use super::artifact::CaptureArtifact;
use super::job::{CaptureJob, FailureKind, Poem, PoemFailure, PoemResult};
use super::save::save_poem;
use super::state::CaptureStatus;
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::events::{EventQueue, PipelineEvent};
use crate::frame::FrameData;
use crate::inference::InferenceClient;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Result of a trigger that was not rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new job was started
    Started { job_id: u64 },
    /// A job is already in flight; nothing happened
    Ignored,
}

/// Turns one trigger into one inference round trip.
///
/// Owned by the presentation task. The pipeline spawns one worker per
/// capture and learns about its progress only through `PipelineEvent`s fed
/// back into `handle_event`, so all state changes happen on the owner's turn.
pub struct CapturePipeline {
    client: Arc<dyn InferenceClient>,
    queue: EventQueue,
    artifact_dir: PathBuf,
    jpeg_quality: u8,
    model: String,
    status: CaptureStatus,
    next_job_id: u64,
    worker: Option<AbortHandle>,
    monitor: Option<JoinHandle<()>>,
    displayed: Option<Poem>,
}

impl CapturePipeline {
    pub fn new(
        config: &CaptureConfig,
        model: String,
        client: Arc<dyn InferenceClient>,
        queue: EventQueue,
    ) -> Self {
        Self {
            client,
            queue,
            artifact_dir: PathBuf::from(&config.artifact_dir),
            jpeg_quality: config.jpeg_quality,
            model,
            status: CaptureStatus::Idle,
            next_job_id: 1,
            worker: None,
            monitor: None,
            displayed: None,
        }
    }

    pub fn status(&self) -> &CaptureStatus {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Change the model used by the next capture
    pub fn set_model(&mut self, model: String) {
        info!("Model changed from {} to {}", self.model, model);
        self.model = model;
    }

    /// Poem currently on display, if any
    pub fn displayed_poem(&self) -> Option<&Poem> {
        self.displayed.as_ref()
    }

    /// Start a capture of `frame`.
    ///
    /// While a job is in flight this is a no-op. Without a frame the trigger
    /// is rejected and the pipeline stays `Idle`.
    pub fn trigger(&mut self, frame: Option<&FrameData>) -> Result<TriggerOutcome, CaptureError> {
        if let Some(job_id) = self.status.active_job() {
            debug!("Capture {} still in flight, ignoring trigger", job_id);
            return Ok(TriggerOutcome::Ignored);
        }

        self.status = CaptureStatus::Idle;
        let frame = frame.ok_or(CaptureError::NoFrame)?;

        let job = CaptureJob::new(self.next_job_id, frame.clone(), self.model.clone());
        self.next_job_id += 1;
        let job_id = job.id;

        info!(
            "Capturing frame {} ({} ms old) as job {} (model {})",
            frame.id,
            frame.age_ms(),
            job_id,
            job.model
        );
        self.status = CaptureStatus::Capturing { job_id };
        self.spawn_worker(job);

        Ok(TriggerOutcome::Started { job_id })
    }

    /// Apply a worker message. Returns the result when a job finished.
    pub fn handle_event(&mut self, event: PipelineEvent) -> Option<PoemResult> {
        if self.status.active_job() != Some(event.job_id()) {
            warn!("Ignoring stale pipeline event: {}", event.description());
            return None;
        }

        match event {
            PipelineEvent::ArtifactPersisted { job_id, .. } => {
                if let CaptureStatus::Capturing { .. } = self.status {
                    self.status = CaptureStatus::Analyzing { job_id };
                }
                None
            }
            PipelineEvent::JobFinished { result, .. } => {
                self.worker = None;
                self.monitor = None;
                match &result {
                    PoemResult::Success(poem) => {
                        self.displayed = Some(poem.clone());
                        self.status = CaptureStatus::Ready;
                    }
                    PoemResult::Failure(failure) => {
                        self.status = CaptureStatus::Failed {
                            kind: failure.kind,
                            message: failure.message.clone(),
                        };
                    }
                }
                Some(result)
            }
        }
    }

    /// Save the displayed poem into `dir`
    pub async fn save_displayed(&self, dir: &Path) -> Result<PathBuf, CaptureError> {
        let poem = self.displayed.as_ref().ok_or(CaptureError::NothingToSave)?;
        save_poem(poem, dir).await
    }

    /// Abort any in-flight worker. Its artifact guard removes the file.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            info!("Aborting in-flight capture");
            worker.abort();
        }
    }

    /// Abort the in-flight worker and wait until it has been torn down, so
    /// its artifact is gone when this returns.
    pub async fn shutdown_and_wait(&mut self, grace: Duration) {
        self.shutdown();
        if let Some(monitor) = self.monitor.take() {
            if timeout(grace, monitor).await.is_err() {
                warn!("Capture worker did not stop within {:?}", grace);
            }
        }
    }

    fn spawn_worker(&mut self, job: CaptureJob) {
        let job_id = job.id;
        let queue = self.queue.clone();
        let task = tokio::spawn(run_capture_job(
            job,
            Arc::clone(&self.client),
            self.artifact_dir.clone(),
            self.jpeg_quality,
            self.queue.clone(),
        ));
        self.worker = Some(task.abort_handle());

        // Report completion even when the worker panics
        let monitor = tokio::spawn(async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => {
                    debug!("Capture {} aborted", job_id);
                    return;
                }
                Err(e) => PoemResult::Failure(PoemFailure::new(
                    FailureKind::Worker,
                    format!("capture worker failed: {}", e),
                )),
            };
            queue.post(PipelineEvent::JobFinished { job_id, result });
        });
        self.monitor = Some(monitor);
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker body: persist, infer, clean up. The artifact is gone before this
/// returns, on every path.
async fn run_capture_job(
    job: CaptureJob,
    client: Arc<dyn InferenceClient>,
    artifact_dir: PathBuf,
    jpeg_quality: u8,
    queue: EventQueue,
) -> PoemResult {
    let jpeg = match job.frame.to_jpeg(jpeg_quality) {
        Ok(jpeg) => jpeg,
        Err(e) => return PoemResult::Failure(PoemFailure::new(FailureKind::Storage, e.to_string())),
    };

    let artifact = match CaptureArtifact::persist(&artifact_dir, &job.artifact_name(), &jpeg) {
        Ok(artifact) => artifact,
        Err(e) => return PoemResult::Failure(PoemFailure::new(FailureKind::Storage, e.to_string())),
    };

    queue.post(PipelineEvent::ArtifactPersisted {
        job_id: job.id,
        path: artifact.path().to_path_buf(),
    });

    let outcome = match artifact.read().await {
        Ok(image) => client
            .generate(&job.model, &image)
            .await
            .map_err(PoemFailure::from),
        Err(e) => Err(PoemFailure::new(FailureKind::Storage, e.to_string())),
    };

    let artifact_path = artifact.remove();

    match outcome {
        Ok(text) => PoemResult::Success(Poem {
            text,
            model: job.model,
            generated_at: Local::now(),
            artifact: artifact_path,
        }),
        Err(failure) => PoemResult::Failure(failure),
    }
}
