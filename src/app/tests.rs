use super::orchestrator::{build_camera, build_engine};
use super::*;
use crate::capture::{CameraDevice, MockCameraDevice};
use crate::config::{CameraBackend, VisionConfig};
use crate::detection::{BoundingBox, Category, Detection, DetectionSet, DetectorKind};
use crate::detector::{InferenceEngine, MockEngine, MockEngineStats};
use crate::error::{CaptureError, VisionError};
use crate::events::VisionEvent;
use crate::scheduler::LoopState;
use image::GenericImageView;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, NamedTempFile};

fn test_config(mode: DetectorKind) -> VisionConfig {
    let mut config = VisionConfig::default();
    config.detector.mode = mode;
    config.system.summary_interval_ms = 50;
    config
}

fn create_app(
    config: VisionConfig,
    camera: &MockCameraDevice,
    engine: MockEngine,
) -> (VisionApp, Arc<MockEngineStats>) {
    let stats = engine.stats();
    let camera: Arc<dyn CameraDevice> = Arc::new(camera.clone());
    let engine: Arc<dyn InferenceEngine> = Arc::new(engine);
    let app = VisionApp::with_backends(config, camera, engine).unwrap();
    (app, stats)
}

#[tokio::test]
async fn test_app_starts_configured_mode_and_releases_on_shutdown() {
    let camera = MockCameraDevice::new().ready_on_open();
    let (mut app, engine) = create_app(test_config(DetectorKind::Hand), &camera, MockEngine::new());

    let session = app.start().await.unwrap();
    assert_eq!(session.kind(), DetectorKind::Hand);
    assert_eq!(session.state(), LoopState::Running);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(engine.detect_calls() >= 1);

    let exit_code = app.shutdown(&ShutdownReason::UserRequest).await.unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(session.state(), LoopState::Stopped);
    assert!(!camera.last_stream().unwrap().is_live());
    assert_eq!(engine.live_detectors(), 0);
}

#[tokio::test]
async fn test_shutdown_writes_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overlay.png");

    let camera = MockCameraDevice::new().ready_on_open();
    let (mut app, _) = create_app(test_config(DetectorKind::Object), &camera, MockEngine::new());
    app.set_snapshot_path(Some(path.clone()));

    app.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let exit_code = app.shutdown(&ShutdownReason::UserRequest).await.unwrap();
    assert_eq!(exit_code, 0);

    let image = image::open(&path).unwrap();
    assert_eq!(image.dimensions(), (640, 480));
}

#[tokio::test]
async fn test_snapshot_without_frame_fails_exit_code() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overlay.png");

    // Metadata never arrives
    let camera = MockCameraDevice::new();
    let (mut app, _) = create_app(test_config(DetectorKind::Object), &camera, MockEngine::new());
    app.set_snapshot_path(Some(path.clone()));

    app.start().await.unwrap();
    let exit_code = app.shutdown(&ShutdownReason::UserRequest).await.unwrap();

    assert_eq!(exit_code, 1);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_run_returns_after_requested_shutdown() {
    let camera = MockCameraDevice::new().ready_on_open();
    let (mut app, engine) = create_app(test_config(DetectorKind::Object), &camera, MockEngine::new());
    let mut events = app.event_bus().subscribe();

    assert!(app.shutdown_handle().trigger(ShutdownReason::UserRequest).await);
    assert!(!app.shutdown_handle().trigger(ShutdownReason::UserRequest).await);

    let exit_code = app.run().await.unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(engine.live_detectors(), 0);

    let mut saw_shutdown = false;
    while let Ok(event) = events.try_recv() {
        if let VisionEvent::ShutdownRequested { reason, .. } = event {
            assert_eq!(reason, "user request");
            saw_shutdown = true;
        }
    }
    assert!(saw_shutdown);
}

#[tokio::test]
async fn test_run_fails_when_camera_is_denied() {
    let camera = MockCameraDevice::new().failing(CaptureError::PermissionDenied {
        details: "denied by user".to_string(),
    });
    let (mut app, engine) = create_app(test_config(DetectorKind::Hand), &camera, MockEngine::new());

    let result = app.run().await;
    assert!(matches!(result, Err(VisionError::Capture(_))));
    assert_eq!(engine.detectors_created(), 0);

    let session = app.controller().current().await.unwrap();
    assert_eq!(session.state(), LoopState::Error);
}

#[tokio::test]
async fn test_stream_loss_shuts_down_with_error() {
    let camera = MockCameraDevice::new().ready_on_open();
    let (mut app, engine) = create_app(test_config(DetectorKind::Object), &camera, MockEngine::new());

    let running = tokio::spawn(async move { app.run().await });

    tokio::time::sleep(Duration::from_millis(150)).await;
    camera.last_stream().unwrap().end_tracks();

    let exit_code = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 1);
    assert_eq!(engine.live_detectors(), 0);
}

#[tokio::test]
async fn test_missing_font_builds_app_without_labels() {
    let mut config = test_config(DetectorKind::Object);
    config.render.font_path = Some("/nonexistent/font.ttf".to_string());

    let camera = MockCameraDevice::new();
    let app = VisionApp::with_backends(
        config,
        Arc::new(camera),
        Arc::new(MockEngine::new()),
    )
    .unwrap();
    assert!(!app.canvas().lock().has_font());
}

#[tokio::test]
async fn test_unparsable_font_is_an_error() {
    let mut font = NamedTempFile::new().unwrap();
    font.write_all(b"not a truetype font").unwrap();

    let mut config = test_config(DetectorKind::Object);
    config.render.font_path = Some(font.path().to_string_lossy().to_string());

    let result = VisionApp::with_backends(
        config,
        Arc::new(MockCameraDevice::new()),
        Arc::new(MockEngine::new()),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_build_backends_from_config() {
    let mut config = VisionConfig::default();
    assert!(build_camera(&config.camera).is_ok());
    assert!(build_engine(&config.detector).is_ok());

    config.camera.backend = CameraBackend::Gstreamer;
    if cfg!(not(all(target_os = "linux", feature = "gstreamer-camera"))) {
        assert!(build_camera(&config.camera).is_err());
    }
}

#[tokio::test]
async fn test_build_engine_from_script() {
    let script = vec![DetectionSet::new(vec![Detection::boxed(
        BoundingBox::new(10.0, 20.0, 30.0, 40.0),
        vec![Category::new("cup", 0.92)],
    )])];
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&script).unwrap().as_bytes())
        .unwrap();

    let mut config = VisionConfig::default();
    config.detector.mock_script = Some(file.path().to_string_lossy().to_string());
    assert!(build_engine(&config.detector).is_ok());

    let mut bad = NamedTempFile::new().unwrap();
    bad.write_all(b"not json").unwrap();
    config.detector.mock_script = Some(bad.path().to_string_lossy().to_string());
    assert!(build_engine(&config.detector).is_err());
}

#[test]
fn test_shutdown_reason_exit_codes() {
    assert_eq!(ShutdownReason::Signal("SIGINT".to_string()).exit_code(), 0);
    assert_eq!(ShutdownReason::UserRequest.exit_code(), 0);
    assert_eq!(ShutdownReason::Error("lost".to_string()).exit_code(), 1);
    assert_eq!(
        ShutdownReason::Signal("SIGTERM".to_string()).to_string(),
        "signal SIGTERM"
    );
}
