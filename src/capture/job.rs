use crate::error::InferenceError;
use crate::frame::FrameData;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One in-flight capture: the frame being analyzed and the model asked
#[derive(Debug, Clone)]
pub struct CaptureJob {
    pub id: u64,
    pub frame: FrameData,
    pub model: String,
    pub created_at: DateTime<Local>,
}

impl CaptureJob {
    pub fn new(id: u64, frame: FrameData, model: String) -> Self {
        Self {
            id,
            frame,
            model,
            created_at: Local::now(),
        }
    }

    /// Timestamped file name for the transient image
    pub fn artifact_name(&self) -> String {
        format!("capture_{}.jpg", self.created_at.format("%Y%m%d_%H%M%S_%3f"))
    }
}

/// Classification of a failed capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Inference service unreachable
    ConnectionFailed,
    /// Inference request exceeded its timeout
    Timeout,
    /// Reply had an unexpected or missing payload
    Malformed,
    /// Inference service answered with a non-success status
    ServiceError,
    /// The frame could not be encoded or written to disk
    Storage,
    /// The worker task died before reporting
    Worker,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::ConnectionFailed => "connection failed",
            FailureKind::Timeout => "timeout",
            FailureKind::Malformed => "malformed response",
            FailureKind::ServiceError => "service error",
            FailureKind::Storage => "storage",
            FailureKind::Worker => "worker",
        };
        f.write_str(label)
    }
}

impl From<&InferenceError> for FailureKind {
    fn from(error: &InferenceError) -> Self {
        match error {
            InferenceError::ConnectionFailed { .. } => FailureKind::ConnectionFailed,
            InferenceError::Timeout { .. } => FailureKind::Timeout,
            InferenceError::Status { .. } => FailureKind::ServiceError,
            InferenceError::Malformed { .. } => FailureKind::Malformed,
        }
    }
}

/// A generated poem, ready to display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poem {
    pub text: String,
    pub model: String,
    pub generated_at: DateTime<Local>,
    /// Path of the (already deleted) image the poem was written about
    pub artifact: PathBuf,
}

impl Poem {
    /// Text block shown to the user and written by save
    pub fn render(&self) -> String {
        format!(
            "Generated on {}\nImage: {}\n{}\n\n{}\n\n{}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S"),
            self.artifact.display(),
            "-".repeat(40),
            self.text,
            "=".repeat(40)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoemFailure {
    pub kind: FailureKind,
    /// Raw error text, shown verbatim
    pub message: String,
    pub failed_at: DateTime<Local>,
}

impl PoemFailure {
    pub fn new<S: Into<String>>(kind: FailureKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            failed_at: Local::now(),
        }
    }
}

impl From<InferenceError> for PoemFailure {
    fn from(error: InferenceError) -> Self {
        Self::new(FailureKind::from(&error), error.to_string())
    }
}

/// Outcome of one capture, consumed once by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoemResult {
    Success(Poem),
    Failure(PoemFailure),
}

impl PoemResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PoemResult::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PoemResult::Success(_) => None,
            PoemResult::Failure(failure) => Some(failure.kind),
        }
    }
}
