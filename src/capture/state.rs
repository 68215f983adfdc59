use super::job::FailureKind;

/// Capture pipeline state.
///
/// `Idle -> Capturing -> Analyzing -> Ready | Failed`; the terminal states
/// go back to `Idle` on the next trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Capturing { job_id: u64 },
    Analyzing { job_id: u64 },
    Ready,
    Failed { kind: FailureKind, message: String },
}

impl CaptureStatus {
    /// True while a job is in flight; triggers and device switches are refused
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            CaptureStatus::Capturing { .. } | CaptureStatus::Analyzing { .. }
        )
    }

    /// Id of the job in flight, if any
    pub fn active_job(&self) -> Option<u64> {
        match self {
            CaptureStatus::Capturing { job_id } | CaptureStatus::Analyzing { job_id } => {
                Some(*job_id)
            }
            _ => None,
        }
    }

    /// Status line shown to the user
    pub fn label(&self) -> String {
        match self {
            CaptureStatus::Idle => "Ready to capture".to_string(),
            CaptureStatus::Capturing { .. } => "Capturing image...".to_string(),
            CaptureStatus::Analyzing { .. } => "Analyzing image with AI...".to_string(),
            CaptureStatus::Ready => "Poem generated successfully!".to_string(),
            CaptureStatus::Failed { kind, message } => {
                format!("Error generating poem ({}): {}", kind, message)
            }
        }
    }
}

impl Default for CaptureStatus {
    fn default() -> Self {
        CaptureStatus::Idle
    }
}
