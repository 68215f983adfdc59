use super::backend::{CameraBackend, CameraDevice, DeviceId};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::FrameData;
use crate::recovery::{CameraRecovery, RecoveryConfig};
use std::time::{Duration, Instant, SystemTime};
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

/// Device used when discovery finds nothing openable
pub const DEFAULT_DEVICE: DeviceId = DeviceId(0);

/// Connection state of the live feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// No handle has been opened yet, or the feed was closed
    Disconnected,
    /// A handle is open and frames are arriving
    Live,
    /// The device failed and reconnect attempts are running
    Lost,
}

/// Outcome of one poll tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedTick {
    /// A new frame replaced the latest one
    Frame { id: u64 },
    /// The device had failed and was re-opened
    Reconnected,
    /// The feed was live and has just been lost
    Lost(CameraError),
    /// A reconnect attempt failed while the feed was already lost
    StillLost(CameraError),
    /// Waiting out the reconnect backoff
    Waiting,
}

/// Owns the single camera handle and keeps the latest frame fresh.
///
/// All methods take `&mut self`; the controller lives on the presentation
/// task and is never shared, so camera reads need no locking.
pub struct FeedController {
    backend: Box<dyn CameraBackend>,
    config: CameraConfig,
    handle: Option<Box<dyn CameraDevice>>,
    selected: DeviceId,
    latest: Option<FrameData>,
    frame_counter: u64,
    status: FeedStatus,
    recovery: CameraRecovery,
}

impl FeedController {
    pub fn new(backend: Box<dyn CameraBackend>, config: CameraConfig) -> Self {
        let recovery = CameraRecovery::with_config(RecoveryConfig {
            max_delay: config.reconnect_max_delay(),
            ..RecoveryConfig::default()
        });
        let selected = DeviceId(config.device);

        info!(
            "Feed controller using {} backend (device {}, {}x{})",
            backend.name(),
            selected,
            config.resolution.0,
            config.resolution.1
        );

        Self {
            backend,
            config,
            handle: None,
            selected,
            latest: None,
            frame_counter: 0,
            status: FeedStatus::Disconnected,
            recovery,
        }
    }

    /// Probe `0..probe_limit` and return the devices that open and read.
    ///
    /// Every probe handle is released before the next probe. The device
    /// currently held by the controller is reported without re-probing.
    pub fn discover(&mut self) -> Vec<DeviceId> {
        let held = self.handle.as_ref().map(|handle| handle.id());
        let mut available = Vec::new();

        for device in self.backend.list_devices(self.config.probe_limit) {
            if Some(device) == held {
                available.push(device);
                continue;
            }

            match self.backend.open(device, self.config.resolution) {
                Ok(mut probe) => {
                    match probe.read() {
                        Ok(_) => {
                            debug!("Discovered camera {}", device);
                            available.push(device);
                        }
                        Err(e) => debug!("Camera {} opened but unreadable: {}", device, e),
                    }
                    probe.release();
                }
                Err(e) => trace!("Camera {} not available: {}", device, e),
            }
        }

        if available.is_empty() {
            warn!(
                "No readable cameras found, falling back to device {}",
                DEFAULT_DEVICE
            );
            available.push(DEFAULT_DEVICE);
        }

        info!("Available cameras: {:?}", available);
        available
    }

    /// Open `device`, releasing any held handle first.
    ///
    /// Waits the settling delay, then performs one verification read whose
    /// frame becomes the latest frame.
    pub async fn open(&mut self, device: DeviceId) -> Result<(), CameraError> {
        self.close();

        debug!("Opening camera {}", device);
        let mut handle = self.backend.open(device, self.config.resolution)?;

        let settle = self.config.settle_delay();
        if settle > Duration::ZERO {
            sleep(settle).await;
        }

        match handle.read() {
            Ok(raw) => {
                if raw.width != self.config.resolution.0 || raw.height != self.config.resolution.1 {
                    warn!(
                        "Camera resolution adjusted by driver: requested {}x{}, got {}x{}",
                        self.config.resolution.0, self.config.resolution.1, raw.width, raw.height
                    );
                }
                let id = self.next_frame_id();
                self.store_frame(FrameData::from_raw(id, SystemTime::now(), raw));
                self.handle = Some(handle);
                self.selected = device;
                self.status = FeedStatus::Live;
                self.recovery.reset();
                info!("Camera {} opened", device);
                Ok(())
            }
            Err(e) => {
                handle.release();
                Err(e)
            }
        }
    }

    /// Read one frame from the held handle. Never retries.
    pub fn poll_once(&mut self) -> Result<FrameData, CameraError> {
        let selected = self.selected;
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| CameraError::read_failed(selected.0, "no open camera"))?;

        let raw = handle.read()?;
        let id = self.next_frame_id();
        let frame = FrameData::from_raw(id, SystemTime::now(), raw);
        self.store_frame(frame.clone());
        Ok(frame)
    }

    /// Release the held handle, if any. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            debug!("Releasing camera {}", handle.id());
            handle.release();
        }
        if self.status == FeedStatus::Live {
            self.status = FeedStatus::Disconnected;
        }
    }

    /// Switch to another device, never holding two handles at once.
    ///
    /// When the new device cannot be opened the previous one is re-opened so
    /// the feed keeps running; the original error is still returned.
    pub async fn switch_device(&mut self, device: DeviceId) -> Result<(), CameraError> {
        if device == self.selected && self.handle.is_some() {
            debug!("Camera {} already active", device);
            return Ok(());
        }

        let previous = self.selected;
        match self.open(device).await {
            Ok(()) => {
                info!("Switched camera from {} to {}", previous, device);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to switch to camera {}: {}", device, e);
                if previous == device {
                    self.status = FeedStatus::Lost;
                } else if let Err(rollback) = self.open(previous).await {
                    warn!("Could not re-open previous camera {}: {}", previous, rollback);
                    self.status = FeedStatus::Lost;
                }
                Err(e)
            }
        }
    }

    /// One tick of the feed loop: poll, or run the recovery policy.
    ///
    /// A failed poll releases the handle and immediately tries one re-open;
    /// after that, re-opens are spaced by the reconnect backoff.
    pub async fn tick(&mut self, now: Instant) -> FeedTick {
        let device = self.selected;

        if self.handle.is_some() {
            match self.poll_once() {
                Ok(frame) => return FeedTick::Frame { id: frame.id },
                Err(e) => {
                    warn!("Camera feed lost: {}", e);
                    self.close();
                    return match self.open(device).await {
                        Ok(()) => FeedTick::Reconnected,
                        Err(reopen) => {
                            self.status = FeedStatus::Lost;
                            self.recovery.record_failure(now);
                            debug!("Immediate reconnect failed: {}", reopen);
                            FeedTick::Lost(e)
                        }
                    };
                }
            }
        }

        if !self.recovery.should_attempt(now) {
            return FeedTick::Waiting;
        }

        match self.open(device).await {
            Ok(()) => FeedTick::Reconnected,
            Err(e) => {
                self.status = FeedStatus::Lost;
                self.recovery.record_failure(now);
                FeedTick::StillLost(e)
            }
        }
    }

    /// Most recent successfully read frame
    pub fn latest_frame(&self) -> Option<&FrameData> {
        self.latest.as_ref()
    }

    pub fn selected_device(&self) -> DeviceId {
        self.selected
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn next_frame_id(&mut self) -> u64 {
        let id = self.frame_counter;
        self.frame_counter += 1;
        id
    }

    fn store_frame(&mut self, frame: FrameData) {
        if let Some(current) = &self.latest {
            if frame.id <= current.id {
                return;
            }
        }
        self.latest = Some(frame);
    }
}

impl Drop for FeedController {
    fn drop(&mut self) {
        self.close();
    }
}
