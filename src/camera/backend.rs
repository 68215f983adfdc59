use crate::error::CameraError;
use crate::frame::RawFrame;
use std::fmt;

/// Index of a camera device (e.g. 0 for /dev/video0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DeviceId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// Source of camera devices.
///
/// Implementations only open and enumerate; settling delays, verification
/// reads and recovery are the feed controller's business.
pub trait CameraBackend: Send {
    /// Candidate device ids within `0..limit`, before any read check.
    fn list_devices(&self, limit: u32) -> Vec<DeviceId>;

    /// Open a device, passing the resolution as a best-effort hint.
    fn open(
        &mut self,
        device: DeviceId,
        resolution: (u32, u32),
    ) -> Result<Box<dyn CameraDevice>, CameraError>;

    fn name(&self) -> &'static str;
}

/// An open camera handle. Dropping the handle releases it.
pub trait CameraDevice: Send {
    fn id(&self) -> DeviceId;

    /// Read a single frame. Never retries.
    fn read(&mut self) -> Result<RawFrame, CameraError>;

    /// Release the underlying device. Calling it twice is harmless.
    fn release(&mut self);
}
