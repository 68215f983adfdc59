mod artifact;
mod job;
mod pipeline;
mod save;
mod state;

pub use artifact::CaptureArtifact;
pub use job::{CaptureJob, FailureKind, Poem, PoemFailure, PoemResult};
pub use pipeline::{CapturePipeline, TriggerOutcome};
pub use save::save_poem;
pub use state::CaptureStatus;
