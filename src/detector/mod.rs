mod adapter;
mod engine;
mod mock;

pub use adapter::{
    DetectorConfig, DetectorHandle, DetectorService, HandLandmarkerConfig, ModelRef,
    ObjectDetectorConfig,
};
pub use engine::{
    DetectorOptions, EngineDetector, EngineError, InferenceEngine, RunningMode, RuntimeHandle,
};
pub use mock::{MockEngine, MockEngineStats};
