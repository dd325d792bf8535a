use super::engine::{DetectorOptions, EngineDetector, InferenceEngine, RunningMode};
use crate::detection::{Detection, DetectionSet, DetectorKind, Geometry};
use crate::error::{InferenceError, InitializationError, ReleaseError};
use crate::frame::Frame;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Where a model asset lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    /// Bundled asset on the local filesystem
    Local(PathBuf),
    /// Remote URL fetched once at initialization
    Remote(String),
}

impl ModelRef {
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ModelRef::Remote(trimmed.to_string())
        } else {
            ModelRef::Local(PathBuf::from(trimmed))
        }
    }

    pub fn location(&self) -> String {
        match self {
            ModelRef::Local(path) => path.to_string_lossy().into_owned(),
            ModelRef::Remote(url) => url.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ModelRef::Local(path) => path.as_os_str().is_empty(),
            ModelRef::Remote(url) => url.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDetectorConfig {
    pub model: ModelRef,
    pub runtime_asset_root: String,
    pub score_threshold: f32,
    pub max_results: usize,
    pub running_mode: RunningMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarkerConfig {
    pub model: ModelRef,
    pub runtime_asset_root: String,
    pub num_hands: usize,
    pub min_confidence: f32,
    pub running_mode: RunningMode,
}

/// Configuration for one of the two detector variants
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorConfig {
    Object(ObjectDetectorConfig),
    HandLandmarker(HandLandmarkerConfig),
}

impl DetectorConfig {
    pub fn kind(&self) -> DetectorKind {
        match self {
            DetectorConfig::Object(_) => DetectorKind::Object,
            DetectorConfig::HandLandmarker(_) => DetectorKind::Hand,
        }
    }

    pub fn model(&self) -> &ModelRef {
        match self {
            DetectorConfig::Object(c) => &c.model,
            DetectorConfig::HandLandmarker(c) => &c.model,
        }
    }

    pub fn runtime_asset_root(&self) -> &str {
        match self {
            DetectorConfig::Object(c) => &c.runtime_asset_root,
            DetectorConfig::HandLandmarker(c) => &c.runtime_asset_root,
        }
    }

    pub fn score_threshold(&self) -> f32 {
        match self {
            DetectorConfig::Object(c) => c.score_threshold,
            DetectorConfig::HandLandmarker(c) => c.min_confidence,
        }
    }

    /// Upper bound on detections per frame
    pub fn max_results(&self) -> usize {
        match self {
            DetectorConfig::Object(c) => c.max_results,
            DetectorConfig::HandLandmarker(c) => c.num_hands,
        }
    }

    pub fn validate(&self) -> Result<(), InitializationError> {
        if self.model().is_empty() {
            return Err(InitializationError::InvalidConfig {
                details: "model location must not be empty".to_string(),
            });
        }

        let threshold = self.score_threshold();
        if !(0.0..=1.0).contains(&threshold) {
            return Err(InitializationError::InvalidConfig {
                details: format!("score threshold {} is outside [0, 1]", threshold),
            });
        }

        if let DetectorConfig::HandLandmarker(c) = self {
            if c.num_hands == 0 {
                return Err(InitializationError::InvalidConfig {
                    details: "num_hands must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }

    fn options(&self) -> DetectorOptions {
        match self {
            DetectorConfig::Object(c) => DetectorOptions {
                kind: DetectorKind::Object,
                model_location: c.model.location(),
                running_mode: c.running_mode,
                score_threshold: c.score_threshold,
                max_results: c.max_results,
                num_instances: None,
            },
            DetectorConfig::HandLandmarker(c) => DetectorOptions {
                kind: DetectorKind::Hand,
                model_location: c.model.location(),
                running_mode: c.running_mode,
                score_threshold: c.min_confidence,
                max_results: c.num_hands,
                num_instances: Some(c.num_hands),
            },
        }
    }
}

/// Uniform async front for the inference engine
#[derive(Clone)]
pub struct DetectorService {
    engine: Arc<dyn InferenceEngine>,
}

impl DetectorService {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine }
    }

    /// Load the runtime and model and return a live handle
    pub async fn initialize(
        &self,
        config: &DetectorConfig,
    ) -> Result<DetectorHandle, InitializationError> {
        config.validate()?;

        let asset_root = config.runtime_asset_root();
        info!(
            "Initializing {} detector (model: {})",
            config.kind(),
            config.model().location()
        );

        let runtime = self.engine.load_runtime(asset_root).await.map_err(|e| {
            InitializationError::Runtime {
                asset_root: asset_root.to_string(),
                details: e.to_string(),
            }
        })?;

        let inner = self
            .engine
            .create_detector(&runtime, &config.options())
            .await
            .map_err(|e| InitializationError::Model {
                model: config.model().location(),
                details: e.to_string(),
            })?;

        let handle = DetectorHandle::new(config.clone(), inner);
        info!("{} detector {} initialized", config.kind(), handle.id());
        Ok(handle)
    }
}

/// Owns one engine detector instance. Released exactly once, on `dispose`
/// or on drop.
pub struct DetectorHandle {
    id: Uuid,
    config: DetectorConfig,
    inner: Option<Box<dyn EngineDetector>>,
    last_timestamp: Option<u64>,
}

impl DetectorHandle {
    pub(crate) fn new(config: DetectorConfig, inner: Box<dyn EngineDetector>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            inner: Some(inner),
            last_timestamp: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> DetectorKind {
        self.config.kind()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// Run one inference. Timestamps must strictly increase per handle.
    pub fn infer(
        &mut self,
        frame: &Frame,
        timestamp_micros: u64,
    ) -> Result<DetectionSet, InferenceError> {
        let inner = self.inner.as_mut().ok_or(InferenceError::Disposed)?;

        if let Some(last) = self.last_timestamp {
            if timestamp_micros <= last {
                return Err(InferenceError::NonMonotonicTimestamp {
                    timestamp_micros,
                    last_micros: last,
                });
            }
        }

        if !frame.is_ready() {
            return Err(InferenceError::EmptyFrame {
                width: frame.width,
                height: frame.height,
            });
        }

        self.last_timestamp = Some(timestamp_micros);

        let raw = inner
            .detect(frame, timestamp_micros)
            .map_err(|e| InferenceError::Engine {
                details: e.to_string(),
            })?;

        let result = normalize(&self.config, raw);
        trace!(
            "Detector {} produced {} detections at {}us",
            self.id,
            result.len(),
            timestamp_micros
        );
        Ok(result)
    }

    /// Close the engine detector. Returns `Ok(true)` when this call released
    /// it and `Ok(false)` when it was already disposed.
    pub fn dispose(&mut self) -> Result<bool, ReleaseError> {
        match self.inner.take() {
            Some(mut inner) => {
                inner.close().map_err(|e| ReleaseError::Detector {
                    details: e.to_string(),
                })?;
                info!("{} detector {} closed", self.kind(), self.id);
                Ok(true)
            }
            None => {
                debug!("Detector {} already disposed", self.id);
                Ok(false)
            }
        }
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!("Error closing detector {} on drop: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("disposed", &self.is_disposed())
            .field("last_timestamp", &self.last_timestamp)
            .finish()
    }
}

/// Apply the configured threshold, ordering and result cap to engine output
fn normalize(config: &DetectorConfig, raw: DetectionSet) -> DetectionSet {
    let threshold = config.score_threshold();
    let limit = config.max_results();

    let detections: Vec<Detection> = raw
        .iter()
        .cloned()
        .map(|mut detection| {
            detection.sort_categories();
            detection
        })
        .filter(|detection| match (&detection.geometry, config) {
            (Geometry::Box(_), DetectorConfig::Object(_)) => detection.top_score() >= threshold,
            // Landmark sets without a handedness score are kept
            (Geometry::Landmarks { .. }, DetectorConfig::HandLandmarker(_)) => {
                detection.categories.is_empty() || detection.top_score() >= threshold
            }
            _ => false,
        })
        .take(limit)
        .collect();

    DetectionSet::new(detections)
}
