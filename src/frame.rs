use crate::error::CaptureError;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a frame as delivered by the camera backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Rgb24 => 3,
        }
    }
}

/// Pixels handed back by a single device read, before the feed controller
/// assigns an id and timestamp.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

/// Immutable snapshot of one camera frame
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Capture order; strictly increasing across the lifetime of a feed
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared so snapshots are cheap)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    pub fn from_raw(id: u64, timestamp: SystemTime, raw: RawFrame) -> Self {
        Self::new(id, timestamp, raw.data, raw.width, raw.height, raw.format)
    }

    /// Get the expected frame size in bytes
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// JPEG bytes for this frame
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, CaptureError> {
        if !self.validate_size() {
            return Err(CaptureError::Encode {
                details: format!(
                    "frame {} has {} bytes, expected {}",
                    self.id,
                    self.data.len(),
                    self.expected_size()
                ),
            });
        }

        let color = match self.format {
            FrameFormat::Rgb24 => ColorType::Rgb8,
        };
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, quality)
            .encode(&self.data, self.width, self.height, color)
            .map_err(|e| CaptureError::Encode {
                details: e.to_string(),
            })?;

        tracing::trace!(
            "Encoded frame {} ({}x{}) to {} JPEG bytes",
            self.id,
            self.width,
            self.height,
            encoded.len()
        );
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(width: u32, height: u32) -> FrameData {
        let data = vec![128u8; (width * height * 3) as usize];
        FrameData::new(1, SystemTime::now(), data, width, height, FrameFormat::Rgb24)
    }

    #[test]
    fn test_rgb_frame_encodes_to_jpeg() {
        let frame = rgb_frame(16, 8);
        let jpeg = frame.to_jpeg(90).unwrap();

        // SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_expected_size_is_three_bytes_per_pixel() {
        let frame = rgb_frame(16, 8);
        assert_eq!(frame.expected_size(), 16 * 8 * 3);
        assert!(frame.validate_size());
    }

    #[test]
    fn test_truncated_rgb_frame_is_rejected() {
        let frame = FrameData::new(
            7,
            SystemTime::now(),
            vec![0u8; 10],
            16,
            8,
            FrameFormat::Rgb24,
        );
        assert!(!frame.validate_size());
        assert!(matches!(
            frame.to_jpeg(90),
            Err(CaptureError::Encode { .. })
        ));
    }
}
