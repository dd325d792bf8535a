use crate::detection::DetectorKind;
use crate::detector::{
    DetectorConfig, HandLandmarkerConfig, ModelRef, ObjectDetectorConfig, RunningMode,
};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_OBJECT_MODEL: &str = "https://storage.googleapis.com/mediapipe-models/object_detector/efficientdet_lite0/int8/1/efficientdet_lite0.tflite";
pub const DEFAULT_HAND_MODEL: &str = "models/hand_landmarker.task";
pub const DEFAULT_RUNTIME_ASSET_ROOT: &str =
    "https://cdn.jsdelivr.net/npm/@mediapipe/tasks-vision@latest/wasm";
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VisionConfig {
    pub camera: CameraConfig,
    pub detector: DetectorSettings,
    pub scheduler: SchedulerConfig,
    pub render: RenderConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Synthetic test-pattern stream
    Mock,
    /// v4l2 device through GStreamer (requires the `gstreamer-camera` feature)
    Gstreamer,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Ideal capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Capture backend
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackend,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// Synthetic detections, optionally scripted from a JSON file
    Mock,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorSettings {
    /// Which detector variant the session starts with
    #[serde(default = "default_detector_mode")]
    pub mode: DetectorKind,

    /// Location of the inference runtime assets
    #[serde(default = "default_runtime_asset_root")]
    pub runtime_asset_root: String,

    /// Inference engine backend
    #[serde(default = "default_engine_backend")]
    pub engine: EngineBackend,

    /// JSON file of detection sets replayed by the mock engine
    pub mock_script: Option<String>,

    pub object: ObjectDetectorSettings,
    pub hand: HandLandmarkerSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ObjectDetectorSettings {
    /// Model location (local path or URL)
    #[serde(default = "default_object_model")]
    pub model: String,

    /// Minimum confidence to report
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Maximum number of detections per frame
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_object_running_mode")]
    pub running_mode: RunningMode,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HandLandmarkerSettings {
    /// Model location (local path or URL)
    #[serde(default = "default_hand_model")]
    pub model: String,

    /// Maximum simultaneous hands
    #[serde(default = "default_num_hands")]
    pub num_hands: usize,

    /// Minimum hand presence confidence
    #[serde(default = "default_score_threshold")]
    pub min_confidence: f32,

    #[serde(default = "default_hand_running_mode")]
    pub running_mode: RunningMode,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchedulerConfig {
    /// Display refresh rate driving the frame loop
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,

    /// How long `stop` waits for the frame loop task to finish
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RenderConfig {
    /// TrueType font for box labels; labels are skipped when the file is missing
    #[serde(default = "default_font_path")]
    pub font_path: Option<String>,

    #[serde(default = "default_label_font_size")]
    pub label_font_size: f32,

    #[serde(default = "default_box_line_width")]
    pub box_line_width: u32,

    #[serde(default = "default_connector_line_width")]
    pub connector_line_width: u32,

    #[serde(default = "default_landmark_radius")]
    pub landmark_radius: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Interval between detection summaries in the log
    #[serde(default = "default_summary_interval_ms")]
    pub summary_interval_ms: u64,
}

impl VisionConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("visioncam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.backend", "mock")?
            .set_default("detector.mode", "object")?
            .set_default("detector.runtime_asset_root", default_runtime_asset_root())?
            .set_default("detector.engine", "mock")?
            .set_default("detector.object.model", default_object_model())?
            .set_default(
                "detector.object.score_threshold",
                default_score_threshold() as f64,
            )?
            .set_default("detector.object.max_results", default_max_results() as i64)?
            .set_default("detector.object.running_mode", "LIVE_STREAM")?
            .set_default("detector.hand.model", default_hand_model())?
            .set_default("detector.hand.num_hands", default_num_hands() as i64)?
            .set_default(
                "detector.hand.min_confidence",
                default_score_threshold() as f64,
            )?
            .set_default("detector.hand.running_mode", "VIDEO")?
            .set_default("scheduler.refresh_hz", default_refresh_hz())?
            .set_default("scheduler.join_timeout_ms", default_join_timeout_ms())?
            .set_default("render.font_path", DEFAULT_FONT_PATH)?
            .set_default("render.label_font_size", default_label_font_size() as f64)?
            .set_default("render.box_line_width", default_box_line_width())?
            .set_default(
                "render.connector_line_width",
                default_connector_line_width(),
            )?
            .set_default("render.landmark_radius", default_landmark_radius())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.summary_interval_ms", default_summary_interval_ms())?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(Environment::with_prefix("VISIONCAM").separator("__"))
            .build()?;

        let config: VisionConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detector.object.score_threshold) {
            return Err(ConfigError::Message(
                "Object score_threshold must be within [0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detector.hand.min_confidence) {
            return Err(ConfigError::Message(
                "Hand min_confidence must be within [0, 1]".to_string(),
            ));
        }

        if self.detector.hand.num_hands == 0 {
            return Err(ConfigError::Message(
                "Hand num_hands must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.refresh_hz == 0 {
            return Err(ConfigError::Message(
                "Scheduler refresh_hz must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the detector configuration for a given variant
    pub fn detector_config(&self, kind: DetectorKind) -> DetectorConfig {
        match kind {
            DetectorKind::Object => DetectorConfig::Object(ObjectDetectorConfig {
                model: ModelRef::parse(&self.detector.object.model),
                runtime_asset_root: self.detector.runtime_asset_root.clone(),
                score_threshold: self.detector.object.score_threshold,
                max_results: self.detector.object.max_results,
                running_mode: self.detector.object.running_mode,
            }),
            DetectorKind::Hand => DetectorConfig::HandLandmarker(HandLandmarkerConfig {
                model: ModelRef::parse(&self.detector.hand.model),
                runtime_asset_root: self.detector.runtime_asset_root.clone(),
                num_hands: self.detector.hand.num_hands,
                min_confidence: self.detector.hand.min_confidence,
                running_mode: self.detector.hand.running_mode,
            }),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                backend: default_camera_backend(),
            },
            detector: DetectorSettings {
                mode: default_detector_mode(),
                runtime_asset_root: default_runtime_asset_root(),
                engine: default_engine_backend(),
                mock_script: None,
                object: ObjectDetectorSettings {
                    model: default_object_model(),
                    score_threshold: default_score_threshold(),
                    max_results: default_max_results(),
                    running_mode: default_object_running_mode(),
                },
                hand: HandLandmarkerSettings {
                    model: default_hand_model(),
                    num_hands: default_num_hands(),
                    min_confidence: default_score_threshold(),
                    running_mode: default_hand_running_mode(),
                },
            },
            scheduler: SchedulerConfig {
                refresh_hz: default_refresh_hz(),
                join_timeout_ms: default_join_timeout_ms(),
            },
            render: RenderConfig {
                font_path: default_font_path(),
                label_font_size: default_label_font_size(),
                box_line_width: default_box_line_width(),
                connector_line_width: default_connector_line_width(),
                landmark_radius: default_landmark_radius(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                summary_interval_ms: default_summary_interval_ms(),
            },
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}

fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}

fn default_camera_fps() -> u32 {
    30
}

fn default_camera_backend() -> CameraBackend {
    CameraBackend::Mock
}

fn default_detector_mode() -> DetectorKind {
    DetectorKind::Object
}

fn default_runtime_asset_root() -> String {
    DEFAULT_RUNTIME_ASSET_ROOT.to_string()
}

fn default_engine_backend() -> EngineBackend {
    EngineBackend::Mock
}

fn default_object_model() -> String {
    DEFAULT_OBJECT_MODEL.to_string()
}

fn default_hand_model() -> String {
    DEFAULT_HAND_MODEL.to_string()
}

fn default_score_threshold() -> f32 {
    0.5
}

fn default_max_results() -> usize {
    5
}

fn default_num_hands() -> usize {
    2
}

fn default_object_running_mode() -> RunningMode {
    RunningMode::LiveStream
}

fn default_hand_running_mode() -> RunningMode {
    RunningMode::Video
}

fn default_refresh_hz() -> u32 {
    60
}

fn default_join_timeout_ms() -> u64 {
    2000
}

fn default_font_path() -> Option<String> {
    Some(DEFAULT_FONT_PATH.to_string())
}

fn default_label_font_size() -> f32 {
    16.0
}

fn default_box_line_width() -> u32 {
    2
}

fn default_connector_line_width() -> u32 {
    5
}

fn default_landmark_radius() -> u32 {
    4
}

fn default_event_bus_capacity() -> usize {
    100
}

fn default_summary_interval_ms() -> u64 {
    1000
}
