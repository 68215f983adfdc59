use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoetryCamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl PoetryCamError {
    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Camera device failures. None of these are fatal; the feed loop re-opens
/// the device on a later tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Could not open camera {device}: {details}. Check camera permissions")]
    OpenFailed { device: u32, details: String },

    #[error("Could not read from camera {device}: {details}. Another application may be using it")]
    ReadFailed { device: u32, details: String },

    #[error("Camera backend configuration failed: {details}")]
    Configuration { details: String },
}

impl CameraError {
    pub fn open_failed<S: Into<String>>(device: u32, details: S) -> Self {
        Self::OpenFailed {
            device,
            details: details.into(),
        }
    }

    pub fn read_failed<S: Into<String>>(device: u32, details: S) -> Self {
        Self::ReadFailed {
            device,
            details: details.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Could not connect to Ollama at {url}. Make sure Ollama is running (try 'ollama serve' in terminal)")]
    ConnectionFailed { url: String },

    #[error("Request timed out after {timeout:?}. The model might be taking too long to respond")]
    Timeout { timeout: Duration },

    #[error("Inference service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response from inference service: {details}")]
    Malformed { details: String },
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No camera feed available")]
    NoFrame,

    #[error("A capture is already in progress")]
    Busy,

    #[error("Failed to persist capture artifact {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode frame as JPEG: {details}")]
    Encode { details: String },

    #[error("No poem to save")]
    NothingToSave,

    #[error("Failed to save poem to {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PoetryCamError>;
