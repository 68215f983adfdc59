use super::backend::{CameraBackend, CameraDevice, DeviceId};
use crate::config::MAX_RESOLUTION;
use crate::error::CameraError;
use crate::frame::{FrameFormat, RawFrame};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// How a synthetic device responds to open and read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceBehavior {
    /// Opens and produces frames
    Healthy,
    /// Opens, but every read fails
    Unreadable,
}

#[derive(Debug, Default)]
struct SyntheticState {
    devices: HashMap<u32, DeviceBehavior>,
    pending_read_failures: HashMap<u32, u32>,
    open_handles: usize,
    total_opens: usize,
    open_attempts: usize,
}

/// Camera backend that generates test-pattern frames without hardware.
///
/// Clones share state, so a test can keep one clone to unplug devices or
/// inject failures while the feed controller owns another.
#[derive(Debug, Clone, Default)]
pub struct SyntheticCameraBackend {
    state: Arc<Mutex<SyntheticState>>,
}

impl SyntheticCameraBackend {
    /// Backend with no devices attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with the given healthy devices attached
    pub fn with_devices(indices: &[u32]) -> Self {
        let backend = Self::new();
        for index in indices {
            backend.set_device(*index, DeviceBehavior::Healthy);
        }
        backend
    }

    pub fn set_device(&self, index: u32, behavior: DeviceBehavior) {
        self.state.lock().devices.insert(index, behavior);
    }

    /// Unplug a device; open fails and reads on existing handles fail
    pub fn remove_device(&self, index: u32) {
        self.state.lock().devices.remove(&index);
    }

    /// Make the next `count` reads on `index` fail
    pub fn fail_next_reads(&self, index: u32, count: u32) {
        *self
            .state
            .lock()
            .pending_read_failures
            .entry(index)
            .or_insert(0) += count;
    }

    /// Handles currently open and not yet released
    pub fn open_handles(&self) -> usize {
        self.state.lock().open_handles
    }

    /// Successful opens since creation
    pub fn total_opens(&self) -> usize {
        self.state.lock().total_opens
    }

    /// Calls to `open`, failed ones included
    pub fn open_attempts(&self) -> usize {
        self.state.lock().open_attempts
    }
}

impl CameraBackend for SyntheticCameraBackend {
    fn list_devices(&self, limit: u32) -> Vec<DeviceId> {
        (0..limit).map(DeviceId).collect()
    }

    fn open(
        &mut self,
        device: DeviceId,
        resolution: (u32, u32),
    ) -> Result<Box<dyn CameraDevice>, CameraError> {
        let mut state = self.state.lock();
        state.open_attempts += 1;
        if !state.devices.contains_key(&device.0) {
            return Err(CameraError::open_failed(device.0, "no such device"));
        }
        if resolution.0 > MAX_RESOLUTION || resolution.1 > MAX_RESOLUTION {
            return Err(CameraError::open_failed(
                device.0,
                format!("unsupported resolution {}x{}", resolution.0, resolution.1),
            ));
        }

        state.open_handles += 1;
        state.total_opens += 1;
        debug!(
            "Opened synthetic camera {} ({} open handles)",
            device, state.open_handles
        );

        Ok(Box::new(SyntheticDevice {
            id: device,
            resolution,
            frame_counter: 0,
            released: false,
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

struct SyntheticDevice {
    id: DeviceId,
    resolution: (u32, u32),
    frame_counter: u64,
    released: bool,
    state: Arc<Mutex<SyntheticState>>,
}

impl CameraDevice for SyntheticDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn read(&mut self) -> Result<RawFrame, CameraError> {
        if self.released {
            return Err(CameraError::read_failed(self.id.0, "handle released"));
        }

        {
            let mut state = self.state.lock();
            match state.devices.get(&self.id.0) {
                None => return Err(CameraError::read_failed(self.id.0, "device removed")),
                Some(DeviceBehavior::Unreadable) => {
                    return Err(CameraError::read_failed(self.id.0, "device not readable"))
                }
                Some(DeviceBehavior::Healthy) => {}
            }

            if let Some(pending) = state.pending_read_failures.get_mut(&self.id.0) {
                if *pending > 0 {
                    *pending -= 1;
                    return Err(CameraError::read_failed(self.id.0, "injected read failure"));
                }
            }
        }

        let (width, height) = self.resolution;
        let frame_size = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(FrameFormat::Rgb24.bytes_per_pixel()))
            .ok_or_else(|| {
                CameraError::read_failed(
                    self.id.0,
                    format!("resolution {}x{} is too large", width, height),
                )
            })?;
        let mut data = vec![0u8; frame_size];

        // Fill with a simple pattern based on the frame counter
        let shade = (self.frame_counter % 256) as u8;
        for chunk in data.chunks_mut(3) {
            chunk[0] = shade;
            chunk[1] = 128;
            chunk[2] = 255 - shade;
        }
        self.frame_counter += 1;

        trace!("Generated synthetic frame {} ({}x{})", self.frame_counter, width, height);

        Ok(RawFrame {
            data,
            width,
            height,
            format: FrameFormat::Rgb24,
        })
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut state = self.state.lock();
        state.open_handles = state.open_handles.saturating_sub(1);
        debug!(
            "Released synthetic camera {} ({} open handles)",
            self.id, state.open_handles
        );
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        self.release();
    }
}
