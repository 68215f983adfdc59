use super::types::AppCommand;
use super::view::StatusView;
use crate::camera::{CameraBackend, DeviceId, FeedController};
use crate::capture::CapturePipeline;
use crate::config::PoetryCamConfig;
use crate::events::{EventQueue, PipelineEvent};
use crate::inference::InferenceClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Presentation-side owner of the feed, the capture pipeline and the view.
///
/// Everything UI-visible lives here and is only touched from `run`, so no
/// state is shared with the capture workers or the keyboard thread.
pub struct PoetryCamApp {
    pub(super) feed: FeedController,
    pub(super) pipeline: CapturePipeline,
    pub(super) devices: Vec<DeviceId>,
    pub(super) view: StatusView,
    pub(super) save_dir: PathBuf,
    pub(super) poll_interval: Duration,

    pub(super) events: mpsc::UnboundedReceiver<PipelineEvent>,
    pub(super) commands: mpsc::UnboundedReceiver<AppCommand>,
    pub(super) command_sender: mpsc::UnboundedSender<AppCommand>,

    pub(super) cancellation_token: CancellationToken,
    pub(super) handle_signals: bool,
}

impl PoetryCamApp {
    pub fn new(
        config: PoetryCamConfig,
        backend: Box<dyn CameraBackend>,
        client: Arc<dyn InferenceClient>,
        view: StatusView,
    ) -> Self {
        let (queue, events) = EventQueue::new();
        let (command_sender, commands) = mpsc::unbounded_channel();

        let pipeline = CapturePipeline::new(
            &config.capture,
            config.inference.model.clone(),
            client,
            queue,
        );
        let poll_interval = config.camera.poll_interval();
        let feed = FeedController::new(backend, config.camera);

        Self {
            feed,
            pipeline,
            devices: Vec::new(),
            view,
            save_dir: PathBuf::from(config.capture.save_dir),
            poll_interval,
            events,
            commands,
            command_sender,
            cancellation_token: CancellationToken::new(),
            handle_signals: true,
        }
    }

    /// Sender used by input sources to post commands
    pub fn command_sender(&self) -> mpsc::UnboundedSender<AppCommand> {
        self.command_sender.clone()
    }

    /// Token that stops the loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Disable SIGINT/SIGTERM handling, e.g. when embedding the loop
    pub fn set_signal_handling(&mut self, enabled: bool) {
        self.handle_signals = enabled;
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub fn feed(&self) -> &FeedController {
        &self.feed
    }

    pub fn pipeline(&self) -> &CapturePipeline {
        &self.pipeline
    }

    pub fn view(&self) -> &StatusView {
        &self.view
    }
}
