use crate::capture::PoemResult;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Messages posted by capture workers onto the presentation queue.
///
/// Workers never touch UI-visible state; they describe what happened and the
/// presentation task applies it on its own turn.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The frame for `job_id` was written to disk and inference has started
    ArtifactPersisted { job_id: u64, path: PathBuf },
    /// The job finished; its artifact has already been removed
    JobFinished { job_id: u64, result: PoemResult },
}

impl PipelineEvent {
    pub fn job_id(&self) -> u64 {
        match self {
            PipelineEvent::ArtifactPersisted { job_id, .. } => *job_id,
            PipelineEvent::JobFinished { job_id, .. } => *job_id,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PipelineEvent::ArtifactPersisted { job_id, path } => {
                format!("Capture {} persisted to {}", job_id, path.display())
            }
            PipelineEvent::JobFinished { job_id, result } => match result {
                PoemResult::Success(_) => format!("Capture {} produced a poem", job_id),
                PoemResult::Failure(failure) => {
                    format!("Capture {} failed ({}): {}", job_id, failure.kind, failure.message)
                }
            },
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::ArtifactPersisted { .. } => "artifact_persisted",
            PipelineEvent::JobFinished { .. } => "job_finished",
        }
    }
}

/// Sending side of the presentation queue
#[derive(Debug, Clone)]
pub struct EventQueue {
    sender: mpsc::UnboundedSender<PipelineEvent>,
}

impl EventQueue {
    /// Create the queue and the receiver consumed by the presentation task
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Post an event. Returns false when the presentation task has gone away.
    pub fn post(&self, event: PipelineEvent) -> bool {
        match &event {
            PipelineEvent::JobFinished {
                result: PoemResult::Failure(failure),
                ..
            } => {
                error!("Capture failed ({}): {}", failure.kind, failure.message);
            }
            PipelineEvent::JobFinished { .. } => info!("{}", event.description()),
            PipelineEvent::ArtifactPersisted { .. } => debug!("{}", event.description()),
        }

        if self.sender.send(event).is_err() {
            warn!("Presentation queue closed; dropping pipeline event");
            return false;
        }
        true
    }
}
