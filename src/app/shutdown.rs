use super::PoetryCamApp;
use std::time::Duration;
use tracing::info;

const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

impl PoetryCamApp {
    /// Abort any in-flight capture and release the camera
    pub async fn shutdown(&mut self) {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();
        self.pipeline.shutdown_and_wait(WORKER_STOP_TIMEOUT).await;
        self.feed.close();

        info!("Graceful shutdown completed");
    }
}
