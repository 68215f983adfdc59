use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Largest accepted width or height
pub const MAX_RESOLUTION: u32 = 8192;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoetryCamConfig {
    pub camera: CameraConfig,
    pub inference: InferenceConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_device")]
    pub device: u32,

    /// Requested resolution (width, height); the driver may not honor it
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Number of device indices probed during discovery
    #[serde(default = "default_probe_limit")]
    pub probe_limit: u32,

    /// Interval between feed polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay after opening a device before the verification read
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Longest wait for a single frame before the read counts as failed
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Upper bound on the delay between reconnect attempts
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InferenceConfig {
    /// Base URL of the Ollama-compatible service
    #[serde(default = "default_inference_url")]
    pub url: String,

    /// Vision model used for generation
    #[serde(default = "default_model")]
    pub model: String,

    /// Generation request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Startup liveness check timeout in seconds
    #[serde(default = "default_liveness_timeout_seconds")]
    pub liveness_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Directory for transient capture images
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    /// Directory where saved poems are written
    #[serde(default = "default_save_dir")]
    pub save_dir: String,

    /// JPEG quality used when a raw frame has to be encoded
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl CameraConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_seconds)
    }
}

impl PoetryCamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("poetrycam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.device", default_camera_device())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.probe_limit", default_probe_limit())?
            .set_default("camera.poll_interval_ms", default_poll_interval_ms())?
            .set_default("camera.settle_ms", default_settle_ms())?
            .set_default("camera.read_timeout_ms", default_read_timeout_ms())?
            .set_default(
                "camera.reconnect_max_delay_ms",
                default_reconnect_max_delay_ms(),
            )?
            .set_default("inference.url", default_inference_url())?
            .set_default("inference.model", default_model())?
            .set_default("inference.timeout_seconds", default_timeout_seconds())?
            .set_default(
                "inference.liveness_timeout_seconds",
                default_liveness_timeout_seconds(),
            )?
            .set_default("capture.artifact_dir", default_artifact_dir())?
            .set_default("capture.save_dir", default_save_dir())?
            .set_default("capture.jpeg_quality", default_jpeg_quality() as i64)?
            .add_source(File::with_name(&path_str).required(false))
            // POETRYCAM__INFERENCE__MODEL=llava:13b
            .add_source(Environment::with_prefix("POETRYCAM").separator("__"))
            .build()?;

        let config: PoetryCamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        let (width, height) = self.camera.resolution;
        if width > MAX_RESOLUTION || height > MAX_RESOLUTION {
            return Err(ConfigError::Message(format!(
                "Camera resolution must be at most {}x{}",
                MAX_RESOLUTION, MAX_RESOLUTION
            )));
        }

        if self.camera.probe_limit == 0 {
            return Err(ConfigError::Message(
                "Camera probe_limit must be greater than 0".to_string(),
            ));
        }

        if self.camera.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Camera poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.inference.url.trim().is_empty() {
            return Err(ConfigError::Message(
                "Inference url must not be empty".to_string(),
            ));
        }

        if self.inference.model.trim().is_empty() {
            return Err(ConfigError::Message(
                "Inference model must not be empty".to_string(),
            ));
        }

        if self.inference.timeout_seconds == 0 || self.inference.liveness_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Inference timeouts must be greater than 0".to_string(),
            ));
        }

        if self.capture.jpeg_quality == 0 || self.capture.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Capture jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PoetryCamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                device: default_camera_device(),
                resolution: default_camera_resolution(),
                probe_limit: default_probe_limit(),
                poll_interval_ms: default_poll_interval_ms(),
                settle_ms: default_settle_ms(),
                read_timeout_ms: default_read_timeout_ms(),
                reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            },
            inference: InferenceConfig {
                url: default_inference_url(),
                model: default_model(),
                timeout_seconds: default_timeout_seconds(),
                liveness_timeout_seconds: default_liveness_timeout_seconds(),
            },
            capture: CaptureConfig {
                artifact_dir: default_artifact_dir(),
                save_dir: default_save_dir(),
                jpeg_quality: default_jpeg_quality(),
            },
        }
    }
}

// Default value functions
fn default_camera_device() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_probe_limit() -> u32 {
    10
}
fn default_poll_interval_ms() -> u64 {
    30
}
fn default_settle_ms() -> u64 {
    1000
}
fn default_read_timeout_ms() -> u64 {
    500
}
fn default_reconnect_max_delay_ms() -> u64 {
    1000
}

fn default_inference_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llava:7b".to_string()
}
fn default_timeout_seconds() -> u64 {
    120
}
fn default_liveness_timeout_seconds() -> u64 {
    5
}

fn default_artifact_dir() -> String {
    ".".to_string()
}
fn default_save_dir() -> String {
    ".".to_string()
}
fn default_jpeg_quality() -> u8 {
    90
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PoetryCamConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.inference.model, "llava:7b");
        assert_eq!(config.inference.timeout(), Duration::from_secs(120));
        assert_eq!(config.camera.settle_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[inference]\nmodel = \"llava:13b\"\n\n[camera]\ndevice = 2\n"
        )
        .unwrap();

        let config = PoetryCamConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.inference.model, "llava:13b");
        assert_eq!(config.camera.device, 2);
        // untouched values keep their defaults
        assert_eq!(config.camera.probe_limit, 10);
        assert_eq!(config.inference.url, "http://localhost:11434");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = PoetryCamConfig::load_from_file("/nonexistent/poetrycam.toml").unwrap();
        assert_eq!(config.camera.poll_interval_ms, 30);
        assert_eq!(config.capture.jpeg_quality, 90);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PoetryCamConfig::default();
        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());

        config.camera.resolution = (40000, 480);
        assert!(config.validate().is_err());

        config.camera.resolution = (MAX_RESOLUTION, MAX_RESOLUTION);
        assert!(config.validate().is_ok());

        config.camera.resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.inference.model = "  ".to_string();
        assert!(config.validate().is_err());

        config.inference.model = "llava:7b".to_string();
        config.capture.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&PoetryCamConfig::default()).unwrap();
        assert!(rendered.contains("[camera]"));
        assert!(rendered.contains("model = \"llava:7b\""));
    }
}
