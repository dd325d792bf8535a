use super::types::{ShutdownHandle, ShutdownReason};
use crate::capture::{CameraDevice, MockCameraDevice};
use crate::config::{CameraBackend, CameraConfig, DetectorSettings, EngineBackend, VisionConfig};
use crate::detector::{InferenceEngine, MockEngine};
use crate::error::Result;
use crate::events::EventBus;
use crate::render::{RgbaCanvas, SharedRenderTarget};
use crate::session::{ResourceLifecycleManager, SessionController};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Delay before the mock camera reports its dimensions
const MOCK_METADATA_DELAY: Duration = Duration::from_millis(200);

/// Application coordinator: wires the camera, engine and overlay canvas
/// into a session controller and owns the shutdown path
pub struct VisionApp {
    pub(super) config: VisionConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) canvas: Arc<Mutex<RgbaCanvas>>,
    pub(super) controller: Arc<SessionController>,
    pub(super) snapshot_path: Option<PathBuf>,

    // Lifecycle management
    pub(super) shutdown_handle: ShutdownHandle,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) summary_task: Option<JoinHandle<()>>,
}

impl VisionApp {
    /// Create the application from configuration, using the configured backends
    pub fn new(config: VisionConfig) -> Result<Self> {
        let camera = build_camera(&config.camera)?;
        let engine = build_engine(&config.detector)?;
        Self::with_backends(config, camera, engine)
    }

    /// Create the application around explicit camera and engine backends
    pub fn with_backends(
        config: VisionConfig,
        camera: Arc<dyn CameraDevice>,
        engine: Arc<dyn InferenceEngine>,
    ) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity.max(1)));

        let canvas = Arc::new(Mutex::new(RgbaCanvas::from_config(&config.render)?));
        let target: SharedRenderTarget = canvas.clone();

        let lifecycle = Arc::new(ResourceLifecycleManager::new(camera, engine));
        let controller = Arc::new(SessionController::new(
            config.clone(),
            lifecycle,
            target,
            Arc::clone(&event_bus),
        ));

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            event_bus,
            canvas,
            controller,
            snapshot_path: None,
            shutdown_handle: ShutdownHandle::new(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
            summary_task: None,
        })
    }

    /// Write the final overlay composite to `path` on shutdown
    pub fn set_snapshot_path(&mut self, path: Option<PathBuf>) {
        self.snapshot_path = path;
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn controller(&self) -> Arc<SessionController> {
        Arc::clone(&self.controller)
    }

    pub fn canvas(&self) -> Arc<Mutex<RgbaCanvas>> {
        Arc::clone(&self.canvas)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }
}

/// Camera device for the configured backend
pub fn build_camera(config: &CameraConfig) -> Result<Arc<dyn CameraDevice>> {
    match config.backend {
        CameraBackend::Mock => {
            info!("Using mock camera at {} fps", config.fps);
            Ok(Arc::new(MockCameraDevice::live(MOCK_METADATA_DELAY)))
        }
        #[cfg(all(target_os = "linux", feature = "gstreamer-camera"))]
        CameraBackend::Gstreamer => {
            info!("Using GStreamer camera /dev/video{}", config.index);
            Ok(Arc::new(crate::capture::GstCameraDevice::new()?))
        }
        #[cfg(not(all(target_os = "linux", feature = "gstreamer-camera")))]
        CameraBackend::Gstreamer => Err(crate::error::VisionError::component(
            "camera",
            "GStreamer backend requires the gstreamer-camera feature on Linux",
        )),
    }
}

/// Inference engine for the configured backend
pub fn build_engine(settings: &DetectorSettings) -> Result<Arc<dyn InferenceEngine>> {
    match settings.engine {
        EngineBackend::Mock => {
            let engine = match &settings.mock_script {
                Some(path) => MockEngine::from_script_file(path)?,
                None => MockEngine::new(),
            };
            info!("Using mock inference engine");
            Ok(Arc::new(engine))
        }
    }
}
