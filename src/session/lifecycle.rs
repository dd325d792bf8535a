use super::resources::{ReleaseReport, SessionResources};
use crate::capture::{CameraDevice, CaptureSource, StreamConstraints};
use crate::detector::{DetectorConfig, DetectorService, InferenceEngine};
use crate::error::SessionError;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Acquires a session's camera stream and detector, and releases them.
///
/// The camera is opened first. A detector failure tears the fresh stream
/// down before the error is returned, so a failed acquisition holds nothing.
pub struct ResourceLifecycleManager {
    camera: Arc<dyn CameraDevice>,
    detectors: DetectorService,
}

impl ResourceLifecycleManager {
    pub fn new(camera: Arc<dyn CameraDevice>, engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            camera,
            detectors: DetectorService::new(engine),
        }
    }

    pub async fn acquire(
        &self,
        constraints: &StreamConstraints,
        detector: &DetectorConfig,
    ) -> Result<SessionResources, SessionError> {
        // Reject bad configuration before touching the camera
        detector.validate()?;

        let mut capture = CaptureSource::open(self.camera.as_ref(), constraints)
            .await
            .map_err(|e| {
                error!("Camera acquisition failed: {}", e);
                e
            })?;

        match self.detectors.initialize(detector).await {
            Ok(handle) => {
                info!(
                    "Acquired camera stream and {} detector {}",
                    handle.kind(),
                    handle.id()
                );
                Ok(SessionResources::new(capture, handle))
            }
            Err(e) => {
                error!("Detector initialization failed, releasing camera: {}", e);
                for release_error in capture.stop_tracks() {
                    warn!("Error releasing camera after failed init: {}", release_error);
                }
                Err(e.into())
            }
        }
    }

    /// Idempotent release of a resource set
    pub fn release(&self, resources: &mut SessionResources) -> ReleaseReport {
        resources.release()
    }
}
