use super::PoetryCamApp;
use crate::camera::DEFAULT_DEVICE;
use crate::error::Result;
use tracing::{info, warn};

impl PoetryCamApp {
    /// Discover cameras and open the configured one.
    ///
    /// A camera that fails to open is not fatal; the poll loop keeps trying
    /// to reconnect it.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting poetrycam (model {})", self.pipeline.model());

        self.devices = self.feed.discover();
        let listed: Vec<String> = self.devices.iter().map(|d| d.to_string()).collect();
        info!("Available cameras: {}", listed.join(", "));

        let preferred = self.feed.selected_device();
        let device = if self.devices.contains(&preferred) {
            preferred
        } else {
            let fallback = self.devices.first().copied().unwrap_or(DEFAULT_DEVICE);
            warn!(
                "Configured camera {} was not found, using camera {}",
                preferred, fallback
            );
            fallback
        };

        match self.feed.open(device).await {
            Ok(()) => info!("Camera {} started", device),
            Err(e) => {
                warn!("Failed to open camera {}: {}", device, e);
                self.view.notice("Camera connection failed");
            }
        }

        self.view.help();
        self.view.show_status(self.pipeline.status());
        Ok(())
    }
}
