use crate::detection::{DetectionSet, DetectorKind};
use crate::frame::Frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;

/// How the engine expects frames to arrive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunningMode {
    #[serde(rename = "VIDEO")]
    Video,
    #[serde(rename = "LIVE_STREAM")]
    LiveStream,
}

/// Failure reported by an engine implementation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self(message.into())
    }
}

/// Loaded inference runtime, shared by the detectors created from it
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    pub asset_root: String,
    pub loaded_at: SystemTime,
}

impl RuntimeHandle {
    pub fn new<S: Into<String>>(asset_root: S) -> Self {
        Self {
            asset_root: asset_root.into(),
            loaded_at: SystemTime::now(),
        }
    }
}

/// Options passed to `create_detector`
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOptions {
    pub kind: DetectorKind,
    pub model_location: String,
    pub running_mode: RunningMode,
    pub score_threshold: f32,
    pub max_results: usize,
    /// Hand instances; `None` for object detection
    pub num_instances: Option<usize>,
}

/// Vision inference engine boundary
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Fetch and initialize the runtime found under `asset_root`
    async fn load_runtime(&self, asset_root: &str) -> Result<RuntimeHandle, EngineError>;

    /// Load a model and build a detector on the runtime
    async fn create_detector(
        &self,
        runtime: &RuntimeHandle,
        options: &DetectorOptions,
    ) -> Result<Box<dyn EngineDetector>, EngineError>;
}

/// A live engine-side detector instance
pub trait EngineDetector: Send {
    fn detect(&mut self, frame: &Frame, timestamp_micros: u64)
        -> Result<DetectionSet, EngineError>;

    /// Release engine resources. Called at most once by `DetectorHandle`.
    fn close(&mut self) -> Result<(), EngineError>;
}
