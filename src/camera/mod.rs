mod backend;
mod feed;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst_backend;
mod synthetic;

pub use backend::{CameraBackend, CameraDevice, DeviceId};
pub use feed::{FeedController, FeedStatus, FeedTick, DEFAULT_DEVICE};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst_backend::GStreamerBackend;
pub use synthetic::{DeviceBehavior, SyntheticCameraBackend};

use crate::config::CameraConfig;
use tracing::warn;

/// Pick the camera backend for this platform, falling back to synthetic
/// frames when GStreamer is unavailable.
#[cfg(all(feature = "camera", target_os = "linux"))]
pub fn default_backend(config: &CameraConfig) -> Box<dyn CameraBackend> {
    match GStreamerBackend::new(config.read_timeout()) {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            warn!("{}; using synthetic camera", e);
            Box::new(SyntheticCameraBackend::with_devices(&[config.device]))
        }
    }
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
pub fn default_backend(config: &CameraConfig) -> Box<dyn CameraBackend> {
    #[cfg(not(target_os = "linux"))]
    warn!("GStreamer camera backend is only available on Linux, using synthetic camera");
    #[cfg(not(feature = "camera"))]
    warn!("Camera feature is disabled, using synthetic camera");
    Box::new(SyntheticCameraBackend::with_devices(&[config.device]))
}
