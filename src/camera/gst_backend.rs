use super::backend::{CameraBackend, CameraDevice, DeviceId};
use crate::error::CameraError;
use crate::frame::{FrameFormat, RawFrame};
use gstreamer::prelude::*;
use gstreamer::{ClockTime, Pipeline, State};
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// How long to wait for a freshly launched pipeline to reach PLAYING
const STATE_CHANGE_TIMEOUT: Duration = Duration::from_secs(3);

/// V4L2 camera backend built on a GStreamer appsink pipeline
pub struct GStreamerBackend {
    read_timeout: Duration,
}

impl GStreamerBackend {
    pub fn new(read_timeout: Duration) -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        Ok(Self { read_timeout })
    }

    /// Raw RGB output scaled toward the requested resolution. Cameras that
    /// only offer other sizes are still accepted; videoscale adapts them.
    fn build_pipeline_string(device: DeviceId, resolution: (u32, u32)) -> String {
        let (width, height) = resolution;
        format!(
            "v4l2src device=/dev/video{} ! \
             decodebin ! videoconvert ! videoscale ! \
             video/x-raw,format=RGB,width={},height={} ! \
             appsink name=sink sync=false max-buffers=1 drop=true enable-last-sample=false",
            device.0, width, height
        )
    }
}

impl CameraBackend for GStreamerBackend {
    fn list_devices(&self, limit: u32) -> Vec<DeviceId> {
        (0..limit)
            .filter(|index| Path::new(&format!("/dev/video{}", index)).exists())
            .map(DeviceId)
            .collect()
    }

    fn open(
        &mut self,
        device: DeviceId,
        resolution: (u32, u32),
    ) -> Result<Box<dyn CameraDevice>, CameraError> {
        let pipeline_desc = Self::build_pipeline_string(device, resolution);
        debug!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::open_failed(device.0, format!("pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::open_failed(device.0, "Failed to downcast to Pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| CameraError::open_failed(device.0, "pipeline has no appsink"))?;

        if let Err(e) = pipeline.set_state(State::Playing) {
            let _ = pipeline.set_state(State::Null);
            return Err(CameraError::open_failed(device.0, e.to_string()));
        }

        let (result, current, _pending) =
            pipeline.state(ClockTime::from_mseconds(STATE_CHANGE_TIMEOUT.as_millis() as u64));
        if let Err(e) = result {
            let _ = pipeline.set_state(State::Null);
            return Err(CameraError::open_failed(
                device.0,
                format!("pipeline did not start ({:?}): {}", current, e),
            ));
        }

        info!("GStreamer camera {} opened", device);

        Ok(Box::new(GStreamerDevice {
            id: device,
            pipeline: Some(pipeline),
            appsink,
            read_timeout: self.read_timeout,
        }))
    }

    fn name(&self) -> &'static str {
        "gstreamer"
    }
}

struct GStreamerDevice {
    id: DeviceId,
    pipeline: Option<Pipeline>,
    appsink: AppSink,
    read_timeout: Duration,
}

impl CameraDevice for GStreamerDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn read(&mut self) -> Result<RawFrame, CameraError> {
        if self.pipeline.is_none() {
            return Err(CameraError::read_failed(self.id.0, "handle released"));
        }

        let sample = self
            .appsink
            .try_pull_sample(ClockTime::from_mseconds(self.read_timeout.as_millis() as u64))
            .ok_or_else(|| {
                CameraError::read_failed(
                    self.id.0,
                    format!("no frame within {:?}", self.read_timeout),
                )
            })?;

        let buffer = sample
            .buffer()
            .ok_or_else(|| CameraError::read_failed(self.id.0, "No buffer in sample"))?;
        let caps = sample
            .caps()
            .ok_or_else(|| CameraError::read_failed(self.id.0, "No caps in sample"))?;
        let video_info = VideoInfo::from_caps(caps).map_err(|e| {
            CameraError::read_failed(self.id.0, format!("Failed to get video info: {}", e))
        })?;
        let map = buffer.map_readable().map_err(|e| {
            CameraError::read_failed(self.id.0, format!("Failed to map buffer: {}", e))
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let row_bytes = width as usize * 3;
        let stride = video_info.stride()[0] as usize;

        // Drop any row padding so the frame is tightly packed RGB
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in map.as_slice().chunks(stride).take(height as usize) {
            if row.len() < row_bytes {
                return Err(CameraError::read_failed(self.id.0, "short frame buffer"));
            }
            data.extend_from_slice(&row[..row_bytes]);
        }

        trace!(
            "Captured RGB frame from camera {} ({}x{}, {} bytes)",
            self.id,
            width,
            height,
            data.len()
        );

        Ok(RawFrame {
            data,
            width,
            height,
            format: FrameFormat::Rgb24,
        })
    }

    fn release(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.set_state(State::Null) {
                warn!("Failed to stop GStreamer pipeline for camera {}: {}", self.id, e);
            } else {
                debug!("GStreamer camera {} released", self.id);
            }
        }
    }
}

impl Drop for GStreamerDevice {
    fn drop(&mut self) {
        self.release();
    }
}
