use super::*;
use crate::capture::{MockCameraDevice, MockStreamController, StreamConstraints};
use crate::config::VisionConfig;
use crate::detection::DetectorKind;
use crate::detector::{MockEngine, MockEngineStats};
use crate::render::{
    DrawOp, MirrorMode, OverlayRenderer, OverlayStyle, RecordingCanvas, SharedRenderTarget,
};
use crate::session::{ResourceLifecycleManager, SharedResources};
use crate::store::DetectionStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    frame_loop: FrameLoop,
    resources: SharedResources,
    stream: MockStreamController,
    engine: Arc<MockEngineStats>,
    store: DetectionStore,
    canvas: Arc<Mutex<RecordingCanvas>>,
}

async fn harness(engine: MockEngine) -> Harness {
    let camera = MockCameraDevice::new();
    let stats = engine.stats();
    let manager = ResourceLifecycleManager::new(Arc::new(camera.clone()), Arc::new(engine));
    let config = VisionConfig::default().detector_config(DetectorKind::Object);

    let resources = Arc::new(Mutex::new(
        manager
            .acquire(&StreamConstraints::default(), &config)
            .await
            .unwrap(),
    ));
    let store = DetectionStore::new();
    let canvas = Arc::new(Mutex::new(RecordingCanvas::new()));
    let target: SharedRenderTarget = canvas.clone();

    let frame_loop = FrameLoop::new(
        Arc::clone(&resources),
        store.clone(),
        OverlayRenderer::new(OverlayStyle::default(), MirrorMode::Geometric),
        target,
    );

    Harness {
        frame_loop,
        resources,
        stream: camera.last_stream().unwrap(),
        engine: stats,
        store,
        canvas,
    }
}

#[tokio::test]
async fn test_zero_dimension_frame_skips_inference_and_continues() {
    let mut h = harness(MockEngine::new()).await;

    for _ in 0..3 {
        let outcome = h.frame_loop.tick();
        assert_eq!(outcome, TickOutcome::NotReady);
        assert!(outcome.continues());
    }

    assert_eq!(h.engine.detect_calls(), 0);
    assert_eq!(h.frame_loop.stats().not_ready, 3);
    assert!(h.canvas.lock().ops().is_empty());
}

#[tokio::test]
async fn test_same_timestamp_infers_once() {
    let mut h = harness(MockEngine::new()).await;
    h.stream.set_dimensions(640, 480);

    let first = h.frame_loop.tick();
    let detections = match &first {
        TickOutcome::Inferred { detections } => detections.clone(),
        other => panic!("Expected inference, got {:?}", other),
    };

    let second = h.frame_loop.tick();
    assert_eq!(second, TickOutcome::Duplicate);
    assert!(second.continues());

    assert_eq!(h.engine.detect_calls(), 1);
    assert!(h.store.latest().ptr_eq(&detections));

    let stats = h.frame_loop.stats();
    assert_eq!((stats.ticks, stats.inferences, stats.duplicates), (2, 1, 1));
}

#[tokio::test]
async fn test_new_frame_infers_again_with_increasing_timestamp() {
    let mut h = harness(MockEngine::new()).await;
    h.stream.set_dimensions(640, 480);

    h.frame_loop.tick();
    let first_ts = h.resources.lock().detector().unwrap().last_timestamp().unwrap();

    h.stream.advance(Duration::from_millis(33));
    assert!(matches!(h.frame_loop.tick(), TickOutcome::Inferred { .. }));
    let second_ts = h.resources.lock().detector().unwrap().last_timestamp().unwrap();

    assert!(second_ts > first_ts);
    assert_eq!(h.engine.detect_calls(), 2);
    assert_eq!(
        h.frame_loop.last_frame_time(),
        Some(Duration::from_millis(33))
    );
}

#[tokio::test]
async fn test_inference_failure_clears_store_and_keeps_ticking() {
    let mut h = harness(MockEngine::new().failing_detect_calls([2])).await;
    h.stream.set_dimensions(640, 480);

    assert!(matches!(h.frame_loop.tick(), TickOutcome::Inferred { .. }));
    assert!(!h.store.latest().is_empty());

    h.stream.advance(Duration::from_millis(33));
    let outcome = h.frame_loop.tick();
    assert!(matches!(outcome, TickOutcome::InferenceFailed(_)));
    assert!(outcome.continues());
    assert!(h.store.latest().is_empty());
    assert!(h.canvas.lock().current_frame().is_empty());

    h.stream.advance(Duration::from_millis(33));
    assert!(matches!(h.frame_loop.tick(), TickOutcome::Inferred { .. }));
    assert!(!h.store.latest().is_empty());
    assert_eq!(h.frame_loop.stats().inference_failures, 1);
}

#[tokio::test]
async fn test_duplicate_tick_redraws_retained_set_at_new_size() {
    let mut h = harness(MockEngine::new()).await;
    h.stream.set_dimensions(640, 480);
    h.frame_loop.tick();

    // Resolution change without a new media time
    h.stream.set_dimensions(1280, 720);
    assert_eq!(h.frame_loop.tick(), TickOutcome::Duplicate);

    let canvas = h.canvas.lock();
    assert_eq!(crate::render::RenderTarget::size(&*canvas), (1280, 720));
    assert_eq!(canvas.rects().len(), 1);
    assert!(canvas
        .ops()
        .iter()
        .any(|op| *op == DrawOp::Resize { width: 1280, height: 720 }));
}

#[tokio::test]
async fn test_released_resources_halt_the_loop() {
    let mut h = harness(MockEngine::new()).await;
    h.stream.set_dimensions(640, 480);

    h.resources.lock().release();
    h.stream.advance(Duration::from_millis(33));

    let outcome = h.frame_loop.tick();
    assert_eq!(outcome, TickOutcome::Halted);
    assert!(!outcome.continues());
    assert_eq!(h.engine.detect_calls(), 0);
}

#[tokio::test]
async fn test_ended_stream_is_fatal() {
    let mut h = harness(MockEngine::new()).await;
    h.stream.set_dimensions(640, 480);
    h.stream.end_tracks();

    let outcome = h.frame_loop.tick();
    assert_eq!(
        outcome,
        TickOutcome::Fatal(crate::error::CaptureError::StreamEnded)
    );
    assert!(!outcome.continues());
}

#[test]
fn test_loop_state_transitions() {
    use LoopState::*;

    assert!(Idle.can_transition_to(Initializing));
    assert!(Initializing.can_transition_to(Running));
    assert!(Running.can_transition_to(Error));
    assert!(!Idle.can_transition_to(Running));
    assert!(!Stopped.can_transition_to(Initializing));
    assert!(!Error.can_transition_to(Running));
    assert!(Stopped.is_terminal() && Error.is_terminal());

    let cell = LoopStateCell::new();
    assert_eq!(cell.transition(Initializing), Ok(Idle));
    assert_eq!(cell.transition(Running), Ok(Initializing));
    assert_eq!(cell.transition(Initializing), Err(Running));
    assert_eq!(cell.transition(Stopped), Ok(Running));
    assert_eq!(cell.transition(Error), Err(Stopped));
    assert_eq!(cell.get(), Stopped);
}

#[test]
fn test_refresh_period() {
    assert_eq!(RefreshTicker::new(60).period(), Duration::from_micros(16_666));
    assert_eq!(RefreshTicker::new(0).period(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_ticker_runs_until_cancelled() {
    let count = Arc::new(AtomicU64::new(0));
    let task_count = Arc::clone(&count);

    let handle = RefreshTicker::new(100).spawn("test", move || {
        task_count.fetch_add(1, Ordering::SeqCst);
        true
    });

    tokio::time::sleep(Duration::from_millis(55)).await;
    let ticks = count.load(Ordering::SeqCst);
    assert!(ticks >= 5, "expected at least 5 ticks, got {}", ticks);

    handle.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_cancel = count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    assert!(handle.join(Duration::from_secs(1)).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_ticker_halts_when_callback_declines() {
    let count = Arc::new(AtomicU64::new(0));
    let task_count = Arc::clone(&count);

    let handle = RefreshTicker::new(100).spawn("test", move || {
        task_count.fetch_add(1, Ordering::SeqCst) + 1 < 3
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_tick_handle_stops_callbacks() {
    let count = Arc::new(AtomicU64::new(0));
    let task_count = Arc::clone(&count);

    let handle = RefreshTicker::new(100).spawn("test", move || {
        task_count.fetch_add(1, Ordering::SeqCst);
        true
    });
    tokio::time::sleep(Duration::from_millis(25)).await;
    drop(handle);

    let before = count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), before);
}
