use super::*;
use super::view::HISTORY_LIMIT;
use crate::camera::{DeviceId, FeedStatus, SyntheticCameraBackend};
use crate::capture::{CaptureStatus, TriggerOutcome};
use crate::config::{CameraConfig, CaptureConfig, InferenceConfig, PoetryCamConfig};
use crate::error::{CaptureError, InferenceError, PoetryCamError};
use crate::inference::InferenceClient;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Client that waits for a permit, then returns a fixed poem
struct GatedClient {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl InferenceClient for GatedClient {
    async fn generate(&self, _model: &str, _image: &[u8]) -> Result<String, InferenceError> {
        self.gate.acquire().await.unwrap().forget();
        Ok("a quiet lens\nwatching".to_string())
    }

    async fn check_liveness(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

fn create_test_config(dir: &Path) -> PoetryCamConfig {
    PoetryCamConfig {
        camera: CameraConfig {
            device: 0,
            resolution: (32, 24),
            probe_limit: 4,
            poll_interval_ms: 10,
            settle_ms: 0,
            read_timeout_ms: 100,
            reconnect_max_delay_ms: 1000,
        },
        inference: InferenceConfig {
            url: "http://127.0.0.1:9".to_string(),
            model: "llava:7b".to_string(),
            timeout_seconds: 5,
            liveness_timeout_seconds: 1,
        },
        capture: CaptureConfig {
            artifact_dir: dir.display().to_string(),
            save_dir: dir.join("poems").display().to_string(),
            jpeg_quality: 80,
        },
    }
}

fn create_test_app(
    dir: &Path,
    backend: &SyntheticCameraBackend,
    permits: usize,
) -> (PoetryCamApp, Arc<Semaphore>) {
    let gate = Arc::new(Semaphore::new(permits));
    let client = Arc::new(GatedClient {
        gate: Arc::clone(&gate),
    });
    let mut app = PoetryCamApp::new(
        create_test_config(dir),
        Box::new(backend.clone()),
        client,
        StatusView::silent(),
    );
    app.set_signal_handling(false);
    (app, gate)
}

fn history_contains(app: &PoetryCamApp, needle: &str) -> bool {
    app.view().history().iter().any(|line| line.contains(needle))
}

/// Pump pipeline events until the capture reaches a terminal state
async fn settle_pipeline(app: &mut PoetryCamApp) {
    while app.pipeline().is_busy() {
        let event = tokio::time::timeout(Duration::from_secs(5), app.events.recv())
            .await
            .expect("timed out waiting for pipeline event")
            .expect("event queue closed");
        app.on_pipeline_event(event);
    }
}

fn artifact_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("capture_"))
        .count()
}

#[tokio::test]
async fn test_start_opens_configured_camera() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0, 2]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);

    app.start().await.unwrap();

    assert_eq!(app.devices(), &[DeviceId(0), DeviceId(2)]);
    assert_eq!(app.feed().status(), FeedStatus::Live);
    assert!(app.feed().latest_frame().is_some());
    assert_eq!(backend.open_handles(), 1);
    assert!(history_contains(&app, "Ready to capture"));
}

#[tokio::test]
async fn test_start_without_camera_recovers_on_tick() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::new();
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);

    app.start().await.unwrap();

    assert_eq!(app.devices(), &[DeviceId(0)]);
    assert!(!app.feed().is_open());
    assert!(history_contains(&app, "Camera connection failed"));

    backend.set_device(0, crate::camera::DeviceBehavior::Healthy);
    app.on_tick().await;

    assert!(app.feed().is_open());
    assert!(history_contains(&app, "Camera reconnected!"));
}

#[tokio::test]
async fn test_feed_loss_is_reported_and_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);
    app.start().await.unwrap();

    backend.remove_device(0);
    app.on_tick().await;

    assert_eq!(app.feed().status(), FeedStatus::Lost);
    assert!(history_contains(&app, "Camera feed lost. Attempting to reconnect..."));
    assert!(app.feed().latest_frame().is_some());

    backend.set_device(0, crate::camera::DeviceBehavior::Healthy);
    tokio::time::sleep(Duration::from_millis(250)).await;
    app.on_tick().await;

    assert_eq!(app.feed().status(), FeedStatus::Live);
    assert_eq!(backend.open_handles(), 1);
}

#[tokio::test]
async fn test_capture_without_frame_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::new();
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);

    let result = app.capture();

    assert!(matches!(result, Err(CaptureError::NoFrame)));
    assert_eq!(app.pipeline().status(), &CaptureStatus::Idle);

    app.handle_command(AppCommand::Capture).await;
    assert!(history_contains(&app, "No camera feed available"));
}

#[tokio::test]
async fn test_capture_displays_poem() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 1);
    app.start().await.unwrap();

    assert_eq!(app.capture().unwrap(), TriggerOutcome::Started { job_id: 1 });
    settle_pipeline(&mut app).await;

    assert_eq!(app.pipeline().status(), &CaptureStatus::Ready);
    assert!(history_contains(&app, "Capturing image..."));
    assert!(history_contains(&app, "Poem generated successfully!"));
    assert!(history_contains(&app, "a quiet lens"));
    assert_eq!(artifact_files(dir.path()), 0);
}

#[tokio::test]
async fn test_camera_switch_rejected_during_capture() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0, 1]);
    let (mut app, gate) = create_test_app(dir.path(), &backend, 0);
    app.start().await.unwrap();

    app.capture().unwrap();
    let result = app.switch_camera(DeviceId(1)).await;

    assert!(matches!(
        result,
        Err(PoetryCamError::Capture(CaptureError::Busy))
    ));
    assert_eq!(app.feed().selected_device(), DeviceId(0));
    assert_eq!(backend.open_handles(), 1);

    gate.add_permits(1);
    settle_pipeline(&mut app).await;
    app.switch_camera(DeviceId(1)).await.unwrap();
    assert_eq!(app.feed().selected_device(), DeviceId(1));
    assert_eq!(backend.open_handles(), 1);
}

#[tokio::test]
async fn test_next_and_previous_camera_wrap() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0, 1, 2]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);
    app.start().await.unwrap();

    app.handle_command(AppCommand::NextCamera).await;
    assert_eq!(app.feed().selected_device(), DeviceId(1));

    app.handle_command(AppCommand::PreviousCamera).await;
    app.handle_command(AppCommand::PreviousCamera).await;
    assert_eq!(app.feed().selected_device(), DeviceId(2));

    app.handle_command(AppCommand::NextCamera).await;
    assert_eq!(app.feed().selected_device(), DeviceId(0));
    assert_eq!(backend.open_handles(), 1);
    assert!(history_contains(&app, "Camera changed successfully"));
}

#[tokio::test]
async fn test_failed_switch_keeps_previous_camera() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);
    app.start().await.unwrap();

    app.handle_command(AppCommand::SwitchDevice(DeviceId(5))).await;

    assert_eq!(app.feed().selected_device(), DeviceId(0));
    assert!(app.feed().is_open());
    assert_eq!(backend.open_handles(), 1);
    assert!(history_contains(&app, "Failed to change camera"));
}

#[tokio::test]
async fn test_save_poem() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 1);
    app.start().await.unwrap();

    app.handle_command(AppCommand::Save).await;
    assert!(history_contains(&app, "No poem to save yet"));

    app.capture().unwrap();
    settle_pipeline(&mut app).await;

    let saved = app.save_poem().await.unwrap();
    assert!(saved.starts_with(dir.path().join("poems")));
    let contents = std::fs::read_to_string(saved).unwrap();
    assert!(contents.contains("a quiet lens\nwatching"));
}

#[tokio::test]
async fn test_set_model_applies_to_next_capture() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);

    app.handle_command(AppCommand::EditModel).await;
    assert!(history_contains(&app, "current: llava:7b"));

    app.handle_command(AppCommand::SetModel("bakllava".to_string()))
        .await;

    assert_eq!(app.pipeline().model(), "bakllava");
    assert!(history_contains(&app, "Model set to bakllava"));
}

#[tokio::test]
async fn test_digit_key_selects_camera() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0, 2]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);
    app.start().await.unwrap();

    let command = crate::keyboard_input::command_for_key(
        crossterm::event::KeyCode::Char('2'),
        crossterm::event::KeyModifiers::NONE,
    )
    .unwrap();
    app.handle_command(command).await;

    assert_eq!(app.feed().selected_device(), DeviceId(2));
    assert_eq!(backend.open_handles(), 1);
}

#[tokio::test]
async fn test_quit_during_capture_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);
    app.start().await.unwrap();

    let commands = app.command_sender();
    commands.send(AppCommand::Capture).unwrap();
    commands.send(AppCommand::Quit).unwrap();

    let reason = tokio::time::timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run loop did not stop")
        .unwrap();

    assert_eq!(reason, ShutdownReason::UserRequest);
    assert!(!app.feed().is_open());
    assert_eq!(backend.open_handles(), 0);
    assert_eq!(artifact_files(dir.path()), 0);
}

#[tokio::test]
async fn test_cancellation_stops_run_loop() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCameraBackend::with_devices(&[0]);
    let (mut app, _gate) = create_test_app(dir.path(), &backend, 0);
    app.start().await.unwrap();

    let token = app.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let reason = tokio::time::timeout(Duration::from_secs(5), app.run())
        .await
        .expect("run loop did not stop")
        .unwrap();

    assert_eq!(reason, ShutdownReason::Cancelled);
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_status_view_only_prints_label_changes() {
    let mut view = StatusView::silent();

    view.show_status(&CaptureStatus::Idle);
    view.show_status(&CaptureStatus::Idle);
    view.show_status(&CaptureStatus::Capturing { job_id: 1 });

    assert_eq!(
        view.history().iter().cloned().collect::<Vec<_>>(),
        vec![
            "[status] Ready to capture".to_string(),
            "[status] Capturing image...".to_string()
        ]
    );
}

#[test]
fn test_status_view_history_keeps_newest_lines() {
    let mut view = StatusView::silent();

    for i in 0..HISTORY_LIMIT + 10 {
        view.notice(&format!("notice {}", i));
    }

    assert_eq!(view.history().len(), HISTORY_LIMIT);
    assert_eq!(view.history().front().unwrap(), "notice 10");
    assert_eq!(
        view.history().back().unwrap(),
        &format!("notice {}", HISTORY_LIMIT + 9)
    );
}
