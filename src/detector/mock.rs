use super::engine::{DetectorOptions, EngineDetector, EngineError, InferenceEngine, RuntimeHandle};
use crate::detection::{
    BoundingBox, Category, Detection, DetectionSet, DetectorKind, Landmark, HAND_LANDMARK_COUNT,
};
use crate::error::{Result, VisionError};
use crate::frame::Frame;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Call counters shared by a mock engine and its detectors
#[derive(Debug, Default)]
pub struct MockEngineStats {
    pub runtimes_loaded: AtomicU64,
    pub detectors_created: AtomicU64,
    pub detect_calls: AtomicU64,
    pub close_calls: AtomicU64,
    pub last_timestamp: AtomicU64,
}

impl MockEngineStats {
    pub fn detect_calls(&self) -> u64 {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u64 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn detectors_created(&self) -> u64 {
        self.detectors_created.load(Ordering::SeqCst)
    }

    /// Detectors created and not yet closed
    pub fn live_detectors(&self) -> u64 {
        self.detectors_created().saturating_sub(self.close_calls())
    }
}

#[derive(Debug, Default)]
struct MockBehavior {
    runtime_failure: Option<String>,
    model_failure: Option<String>,
    close_failure: Option<String>,
    /// 1-based detect call numbers that fail
    failing_calls: HashSet<u64>,
    /// Replayed in order, cycling; synthetic output when empty
    script: Vec<DetectionSet>,
}

/// Inference engine stand-in producing synthetic or scripted detections
#[derive(Clone, Default)]
pub struct MockEngine {
    behavior: Arc<Mutex<MockBehavior>>,
    stats: Arc<MockEngineStats>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay detection sets read from a JSON array of arrays
    pub fn from_script_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let script: Vec<DetectionSet> = serde_json::from_str(&contents).map_err(|e| {
            VisionError::component(
                "mock_engine".to_string(),
                format!(
                    "Failed to parse script '{}': {}",
                    path.as_ref().display(),
                    e
                ),
            )
        })?;
        info!(
            "Loaded {} scripted detection sets from {}",
            script.len(),
            path.as_ref().display()
        );
        Ok(Self::new().with_script(script))
    }

    pub fn with_script(self, script: Vec<DetectionSet>) -> Self {
        self.behavior.lock().script = script;
        self
    }

    pub fn failing_runtime<S: Into<String>>(self, reason: S) -> Self {
        self.behavior.lock().runtime_failure = Some(reason.into());
        self
    }

    pub fn failing_model<S: Into<String>>(self, reason: S) -> Self {
        self.behavior.lock().model_failure = Some(reason.into());
        self
    }

    pub fn failing_close<S: Into<String>>(self, reason: S) -> Self {
        self.behavior.lock().close_failure = Some(reason.into());
        self
    }

    /// Make the given 1-based detect calls fail
    pub fn failing_detect_calls<I: IntoIterator<Item = u64>>(self, calls: I) -> Self {
        self.behavior.lock().failing_calls.extend(calls);
        self
    }

    pub fn stats(&self) -> Arc<MockEngineStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl InferenceEngine for MockEngine {
    async fn load_runtime(&self, asset_root: &str) -> std::result::Result<RuntimeHandle, EngineError> {
        if let Some(reason) = self.behavior.lock().runtime_failure.clone() {
            return Err(EngineError::new(reason));
        }

        self.stats.runtimes_loaded.fetch_add(1, Ordering::SeqCst);
        debug!("Mock runtime loaded from {}", asset_root);
        Ok(RuntimeHandle::new(asset_root))
    }

    async fn create_detector(
        &self,
        _runtime: &RuntimeHandle,
        options: &DetectorOptions,
    ) -> std::result::Result<Box<dyn EngineDetector>, EngineError> {
        if let Some(reason) = self.behavior.lock().model_failure.clone() {
            return Err(EngineError::new(reason));
        }

        self.stats.detectors_created.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Mock {} detector created for {}",
            options.kind, options.model_location
        );

        Ok(Box::new(MockDetector {
            options: options.clone(),
            behavior: Arc::clone(&self.behavior),
            stats: Arc::clone(&self.stats),
            calls: 0,
        }))
    }
}

struct MockDetector {
    options: DetectorOptions,
    behavior: Arc<Mutex<MockBehavior>>,
    stats: Arc<MockEngineStats>,
    calls: u64,
}

impl EngineDetector for MockDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        timestamp_micros: u64,
    ) -> std::result::Result<DetectionSet, EngineError> {
        self.calls += 1;
        self.stats.detect_calls.fetch_add(1, Ordering::SeqCst);
        self.stats
            .last_timestamp
            .store(timestamp_micros, Ordering::SeqCst);

        let behavior = self.behavior.lock();
        if behavior.failing_calls.contains(&self.calls) {
            return Err(EngineError::new(format!(
                "scripted failure on call {}",
                self.calls
            )));
        }

        if !behavior.script.is_empty() {
            let index = (self.calls - 1) as usize % behavior.script.len();
            return Ok(behavior.script[index].clone());
        }
        drop(behavior);

        Ok(match self.options.kind {
            DetectorKind::Object => synthetic_objects(frame, timestamp_micros),
            DetectorKind::Hand => {
                synthetic_hands(timestamp_micros, self.options.num_instances.unwrap_or(1))
            }
        })
    }

    fn close(&mut self) -> std::result::Result<(), EngineError> {
        self.stats.close_calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior.lock().close_failure.clone() {
            Some(reason) => Err(EngineError::new(reason)),
            None => Ok(()),
        }
    }
}

/// A box sweeping left to right across the frame
fn synthetic_objects(frame: &Frame, timestamp_micros: u64) -> DetectionSet {
    let width = frame.width as f32;
    let height = frame.height as f32;
    let box_width = width * 0.25;
    let box_height = height * 0.4;
    let phase = (timestamp_micros / 20_000) as f32 % 100.0 / 100.0;

    DetectionSet::new(vec![Detection::boxed(
        BoundingBox::new(
            (width - box_width) * phase,
            height * 0.3,
            box_width,
            box_height,
        ),
        vec![Category::new("person", 0.87), Category::new("cup", 0.12)],
    )])
}

/// Open hands drifting vertically
fn synthetic_hands(timestamp_micros: u64, count: usize) -> DetectionSet {
    let drift = ((timestamp_micros / 50_000) % 20) as f32 / 100.0;

    let hands = (0..count.min(2))
        .map(|hand| {
            let wrist_x = 0.3 + hand as f32 * 0.4;
            let wrist_y = 0.8 - drift;
            let points = (0..HAND_LANDMARK_COUNT)
                .map(|i| {
                    if i == 0 {
                        return Landmark::new(wrist_x, wrist_y);
                    }
                    let finger = (i - 1) / 4;
                    let joint = (i - 1) % 4 + 1;
                    Landmark::new(
                        wrist_x - 0.08 + finger as f32 * 0.04,
                        wrist_y - joint as f32 * 0.05,
                    )
                })
                .collect();
            let side = if hand == 0 { "Left" } else { "Right" };
            Detection::landmarks(points, vec![Category::new(side, 0.95)])
        })
        .collect();

    DetectionSet::new(hands)
}
