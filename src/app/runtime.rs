use super::{AppCommand, PoetryCamApp, ShutdownReason};
use crate::camera::{DeviceId, FeedTick};
use crate::capture::{PoemResult, TriggerOutcome};
use crate::error::{CaptureError, Result};
use crate::events::PipelineEvent;
use std::path::PathBuf;
use std::time::Instant;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

impl PoetryCamApp {
    /// Run the presentation loop until a quit command, a signal or
    /// cancellation, then shut down.
    pub async fn run(&mut self) -> Result<ShutdownReason> {
        info!("poetrycam is running");

        let handle_signals = self.handle_signals;
        let signals = async move {
            if handle_signals {
                wait_for_signal().await
            } else {
                std::future::pending().await
            }
        };
        tokio::pin!(signals);

        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let reason = loop {
            tokio::select! {
                reason = &mut signals => break reason,
                _ = self.cancellation_token.cancelled() => break ShutdownReason::Cancelled,
                Some(command) = self.commands.recv() => {
                    if command == AppCommand::Quit {
                        break ShutdownReason::UserRequest;
                    }
                    self.handle_command(command).await;
                }
                Some(event) = self.events.recv() => self.on_pipeline_event(event),
                _ = poll.tick() => self.on_tick().await,
            }
        };

        info!("Shutdown initiated: {:?}", reason);
        self.shutdown().await;
        Ok(reason)
    }

    /// Apply one user command on the presentation task
    pub async fn handle_command(&mut self, command: AppCommand) {
        debug!("Handling command {:?}", command);
        match command {
            AppCommand::Capture => {
                if let Err(e) = self.capture() {
                    self.view.notice(&e.to_string());
                }
            }
            AppCommand::NextCamera => self.cycle_camera(1).await,
            AppCommand::PreviousCamera => self.cycle_camera(-1).await,
            AppCommand::SwitchDevice(device) => {
                if let Err(e) = self.switch_camera(device).await {
                    debug!("Camera change to {} failed: {}", device, e);
                }
            }
            AppCommand::EditModel => self.view.notice(&format!(
                "Enter a model name and press Enter (current: {})",
                self.pipeline.model()
            )),
            AppCommand::SetModel(model) => {
                info!("Model changed to {}", model);
                self.view.notice(&format!("Model set to {}", model));
                self.pipeline.set_model(model);
            }
            AppCommand::Save => {
                if let Err(e) = self.save_poem().await {
                    debug!("Save failed: {}", e);
                }
            }
            AppCommand::Quit => self.cancellation_token.cancel(),
        }
    }

    /// Trigger a capture of the latest frame
    pub fn capture(&mut self) -> std::result::Result<TriggerOutcome, CaptureError> {
        let outcome = self.pipeline.trigger(self.feed.latest_frame());
        match &outcome {
            Ok(TriggerOutcome::Started { job_id }) => debug!("Capture {} started", job_id),
            Ok(TriggerOutcome::Ignored) => debug!("Capture already in progress"),
            Err(e) => warn!("Capture rejected: {}", e),
        }
        self.view.show_status(self.pipeline.status());
        outcome
    }

    /// Switch cameras. Rejected while a capture is in flight.
    pub async fn switch_camera(&mut self, device: DeviceId) -> Result<()> {
        if self.pipeline.is_busy() {
            warn!(
                "Ignoring camera change to {} while a capture is in progress",
                device
            );
            self.view
                .notice("Cannot change camera while a capture is in progress");
            return Err(CaptureError::Busy.into());
        }

        match self.feed.switch_device(device).await {
            Ok(()) => {
                info!("Camera {} selected", device);
                self.view.notice("Camera changed successfully");
                Ok(())
            }
            Err(e) => {
                self.view.notice("Failed to change camera");
                Err(e.into())
            }
        }
    }

    /// Save the displayed poem into the configured save directory
    pub async fn save_poem(&mut self) -> Result<PathBuf> {
        match self.pipeline.save_displayed(&self.save_dir).await {
            Ok(path) => {
                info!("Poem saved to {}", path.display());
                self.view
                    .notice(&format!("Poem saved to {}", path.display()));
                Ok(path)
            }
            Err(CaptureError::NothingToSave) => {
                warn!("No poem to save");
                self.view.notice("No poem to save yet");
                Err(CaptureError::NothingToSave.into())
            }
            Err(e) => {
                error!("Failed to save poem: {}", e);
                self.view.notice(&format!("Failed to save poem: {}", e));
                Err(e.into())
            }
        }
    }

    async fn cycle_camera(&mut self, step: isize) {
        if self.devices.is_empty() {
            return;
        }

        let current = self.feed.selected_device();
        let len = self.devices.len() as isize;
        let index = self
            .devices
            .iter()
            .position(|d| *d == current)
            .unwrap_or(0) as isize;
        let next = self.devices[(index + step).rem_euclid(len) as usize];

        if let Err(e) = self.switch_camera(next).await {
            debug!("Camera change to {} failed: {}", next, e);
        }
    }

    pub(super) async fn on_tick(&mut self) {
        match self.feed.tick(Instant::now()).await {
            FeedTick::Frame { id } => trace!("Frame {} ready", id),
            FeedTick::Waiting => {}
            FeedTick::Reconnected => self.view.notice("Camera reconnected!"),
            FeedTick::Lost(_) => self
                .view
                .notice("Camera feed lost. Attempting to reconnect..."),
            FeedTick::StillLost(e) => debug!("Reconnect attempt failed: {}", e),
        }
    }

    pub(super) fn on_pipeline_event(&mut self, event: PipelineEvent) {
        let result = self.pipeline.handle_event(event);
        self.view.show_status(self.pipeline.status());
        if let Some(PoemResult::Success(poem)) = result {
            self.view.show_poem(&poem);
        }
    }
}

/// Resolve on SIGINT or, on Unix, SIGTERM
async fn wait_for_signal() -> ShutdownReason {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                return tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        ShutdownReason::Signal("SIGTERM".to_string())
                    }
                    reason = wait_for_ctrl_c() => reason,
                };
            }
            Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
        }
    }

    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> ShutdownReason {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received SIGINT signal (Ctrl+C)");
            ShutdownReason::Signal("SIGINT".to_string())
        }
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending().await
        }
    }
}
