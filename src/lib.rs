pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod inference;
pub mod keyboard_input;
pub mod recovery;

pub use app::{AppCommand, PoetryCamApp, ShutdownReason, StatusView};
pub use camera::{
    default_backend, CameraBackend, CameraDevice, DeviceId, FeedController, FeedStatus, FeedTick,
    SyntheticCameraBackend,
};
pub use capture::{
    save_poem, CaptureArtifact, CapturePipeline, CaptureStatus, FailureKind, Poem, PoemResult,
    TriggerOutcome,
};
pub use config::PoetryCamConfig;
pub use error::{CameraError, CaptureError, InferenceError, PoetryCamError, Result};
pub use events::{EventQueue, PipelineEvent};
pub use frame::{FrameData, FrameFormat, RawFrame};
pub use inference::{InferenceClient, OllamaClient};
pub use keyboard_input::{KeyMapper, KeyboardInputHandler};
pub use recovery::{CameraRecovery, RecoveryConfig};
