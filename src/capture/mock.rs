use super::source::{
    CameraDevice, MediaStream, MediaTrack, StreamConstraints, TrackKind, TrackState,
};
use crate::error::CaptureError;
use crate::frame::{Frame, FrameFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// How a mock stream produces frames
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMode {
    /// Frames only change through `MockStreamController`
    Manual,
    /// A background task advances the stream at the requested fps once
    /// `metadata_delay` has elapsed
    Live { metadata_delay: Duration },
}

#[derive(Debug)]
struct MockCameraBehavior {
    failure: Option<CaptureError>,
    feed: FeedMode,
    /// Manual streams start with dimensions when true
    ready_on_open: bool,
}

/// Camera stand-in producing a moving test pattern
#[derive(Clone)]
pub struct MockCameraDevice {
    behavior: Arc<Mutex<MockCameraBehavior>>,
    streams_opened: Arc<AtomicU64>,
    last_stream: Arc<Mutex<Option<MockStreamController>>>,
}

impl MockCameraDevice {
    /// Manual feed, metadata pending until the controller sets dimensions
    pub fn new() -> Self {
        Self {
            behavior: Arc::new(Mutex::new(MockCameraBehavior {
                failure: None,
                feed: FeedMode::Manual,
                ready_on_open: false,
            })),
            streams_opened: Arc::new(AtomicU64::new(0)),
            last_stream: Arc::new(Mutex::new(None)),
        }
    }

    /// Self-feeding test pattern at the requested fps
    pub fn live(metadata_delay: Duration) -> Self {
        let device = Self::new();
        device.behavior.lock().feed = FeedMode::Live { metadata_delay };
        device
    }

    /// Streams report their requested dimensions immediately
    pub fn ready_on_open(self) -> Self {
        self.behavior.lock().ready_on_open = true;
        self
    }

    /// Fail every `request_stream` with the given error
    pub fn failing(self, error: CaptureError) -> Self {
        self.behavior.lock().failure = Some(error);
        self
    }

    pub fn streams_opened(&self) -> u64 {
        self.streams_opened.load(Ordering::SeqCst)
    }

    /// Controller for the most recently opened stream
    pub fn last_stream(&self) -> Option<MockStreamController> {
        self.last_stream.lock().clone()
    }
}

impl Default for MockCameraDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDevice for MockCameraDevice {
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        let (failure, feed, ready_on_open) = {
            let behavior = self.behavior.lock();
            (
                behavior.failure.clone(),
                behavior.feed.clone(),
                behavior.ready_on_open,
            )
        };

        if let Some(error) = failure {
            debug!("Mock camera refusing stream: {}", error);
            return Err(error);
        }

        let stream = MockStream::new(constraints.width, constraints.height);
        let controller = stream.controller();
        if ready_on_open {
            controller.set_dimensions(constraints.width, constraints.height);
        }

        if let FeedMode::Live { metadata_delay } = feed {
            spawn_feed(controller.clone(), constraints, metadata_delay);
        }

        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        *self.last_stream.lock() = Some(controller);

        Ok(Box::new(stream))
    }
}

/// Advance the stream at the configured fps until its video track stops
fn spawn_feed(controller: MockStreamController, constraints: &StreamConstraints, delay: Duration) {
    let (width, height) = (constraints.width, constraints.height);
    let frame_interval = Duration::from_millis(1000 / constraints.fps.max(1) as u64);

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if !controller.video_track.is_live() {
            return;
        }
        controller.set_dimensions(width, height);
        info!("Mock camera feed started ({}x{})", width, height);

        let mut interval = tokio::time::interval(frame_interval);
        while controller.video_track.is_live() {
            interval.tick().await;
            controller.advance(frame_interval);
        }

        info!("Mock camera feed stopped");
    });
}

struct FeedState {
    frame: Frame,
    sequence: u64,
}

pub struct MockTrack {
    kind: TrackKind,
    live: AtomicBool,
    stop_calls: AtomicU64,
    fail_stop: AtomicBool,
}

impl MockTrack {
    fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            live: AtomicBool::new(true),
            stop_calls: AtomicU64::new(0),
            fail_stop: AtomicBool::new(false),
        }
    }

    pub fn stop_calls(&self) -> u64 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl MediaTrack for MockTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> String {
        format!("mock {} track", self.kind)
    }

    fn state(&self) -> TrackState {
        if self.live.load(Ordering::SeqCst) {
            TrackState::Live
        } else {
            TrackState::Ended
        }
    }

    fn stop(&self) -> Result<(), CaptureError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(CaptureError::Configuration {
                details: "scripted stop failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Test-pattern stream with a single video track
pub struct MockStream {
    feed: Arc<Mutex<FeedState>>,
    video_track: Arc<MockTrack>,
    requested: (u32, u32),
}

impl MockStream {
    fn new(width: u32, height: u32) -> Self {
        Self {
            feed: Arc::new(Mutex::new(FeedState {
                frame: Frame::unready(),
                sequence: 0,
            })),
            video_track: Arc::new(MockTrack::new(TrackKind::Video)),
            requested: (width, height),
        }
    }

    fn controller(&self) -> MockStreamController {
        MockStreamController {
            feed: Arc::clone(&self.feed),
            video_track: Arc::clone(&self.video_track),
            requested: self.requested,
        }
    }
}

impl MediaStream for MockStream {
    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        vec![Arc::clone(&self.video_track) as Arc<dyn MediaTrack>]
    }

    fn video_size(&self) -> (u32, u32) {
        self.feed.lock().frame.dimensions()
    }

    fn current_time(&self) -> Duration {
        self.feed.lock().frame.current_time
    }

    fn current_frame(&self) -> Frame {
        self.feed.lock().frame.clone()
    }
}

/// Drives a mock stream from tests or the feed task
#[derive(Clone)]
pub struct MockStreamController {
    feed: Arc<Mutex<FeedState>>,
    video_track: Arc<MockTrack>,
    requested: (u32, u32),
}

impl MockStreamController {
    /// Deliver metadata (or change resolution); keeps the media time
    pub fn set_dimensions(&self, width: u32, height: u32) {
        let mut feed = self.feed.lock();
        let current_time = feed.frame.current_time;
        let sequence = feed.sequence;
        feed.frame = pattern_frame(width, height, current_time, sequence);
        debug!("Mock stream dimensions set to {}x{}", width, height);
    }

    /// Present a new frame `delta` later in media time
    pub fn advance(&self, delta: Duration) {
        let mut feed = self.feed.lock();
        feed.sequence += 1;
        let (width, height) = feed.frame.dimensions();
        let current_time = feed.frame.current_time + delta;
        let sequence = feed.sequence;
        feed.frame = pattern_frame(width, height, current_time, sequence);
        trace!(
            "Mock stream advanced to frame {} at {:?}",
            sequence,
            current_time
        );
    }

    /// Simulate the device disappearing
    pub fn end_tracks(&self) {
        self.video_track.live.store(false, Ordering::SeqCst);
    }

    /// Make the next `stop` on the video track report an error
    pub fn fail_track_stop(&self) {
        self.video_track.fail_stop.store(true, Ordering::SeqCst);
    }

    pub fn video_track(&self) -> Arc<MockTrack> {
        Arc::clone(&self.video_track)
    }

    pub fn track_stop_calls(&self) -> u64 {
        self.video_track.stop_calls()
    }

    pub fn is_live(&self) -> bool {
        self.video_track.is_live()
    }

    pub fn requested_size(&self) -> (u32, u32) {
        self.requested
    }
}

/// Diagonal gradient shifted by the frame sequence
fn pattern_frame(width: u32, height: u32, current_time: Duration, sequence: u64) -> Frame {
    if width == 0 || height == 0 {
        let mut frame = Frame::unready();
        frame.current_time = current_time;
        return frame;
    }

    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    let shift = (sequence % 256) as u32;
    for y in 0..height {
        for x in 0..width {
            data.push(((x * 255 / width + shift) % 256) as u8);
            data.push(((y * 255 / height) % 256) as u8);
            data.push((((x + y) / 4 + shift) % 256) as u8);
            data.push(255);
        }
    }

    Frame::new(data, width, height, current_time, FrameFormat::Rgba8)
}
