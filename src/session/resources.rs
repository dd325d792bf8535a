use crate::capture::CaptureSource;
use crate::detector::DetectorHandle;
use crate::error::ReleaseError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Resources shared between a session and its frame loop
pub type SharedResources = Arc<Mutex<SessionResources>>;

/// Everything one session holds: the camera stream, the detector handle and
/// the cancellation of the pending frame-loop tick. Released exactly once, on
/// every exit path.
#[derive(Debug, Default)]
pub struct SessionResources {
    capture: Option<CaptureSource>,
    detector: Option<DetectorHandle>,
    pending_tick: Option<CancellationToken>,
    released: bool,
}

/// Result of a release pass
#[derive(Debug, Default)]
pub struct ReleaseReport {
    pub tick_cancelled: bool,
    pub tracks_stopped: bool,
    pub detector_disposed: bool,
    pub errors: Vec<ReleaseError>,
}

impl ReleaseReport {
    /// Nothing was left to release
    pub fn is_noop(&self) -> bool {
        !self.tick_cancelled && !self.tracks_stopped && !self.detector_disposed
    }
}

impl SessionResources {
    pub fn new(capture: CaptureSource, detector: DetectorHandle) -> Self {
        Self {
            capture: Some(capture),
            detector: Some(detector),
            pending_tick: None,
            released: false,
        }
    }

    /// Placeholder until acquisition completes
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn capture(&self) -> Option<&CaptureSource> {
        self.capture.as_ref()
    }

    pub fn detector(&self) -> Option<&DetectorHandle> {
        self.detector.as_ref()
    }

    pub fn has_pending_tick(&self) -> bool {
        self.pending_tick.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stream and detector for one tick
    pub(crate) fn frame_parts(&mut self) -> Option<(&CaptureSource, &mut DetectorHandle)> {
        match (self.capture.as_ref(), self.detector.as_mut()) {
            (Some(capture), Some(detector)) => Some((capture, detector)),
            _ => None,
        }
    }

    /// Register the cancellation of the loop's next tick. Cancelled at once
    /// when the resources are already released.
    pub fn attach_tick(&mut self, tick: CancellationToken) {
        if self.released {
            tick.cancel();
            return;
        }
        if let Some(previous) = self.pending_tick.replace(tick) {
            previous.cancel();
        }
    }

    /// Release in order: cancel the pending tick, stop every camera track,
    /// dispose the detector. Safe to call repeatedly; later calls are no-ops.
    pub fn release(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::default();
        if self.released {
            debug!("Session resources already released");
            return report;
        }
        self.released = true;

        if let Some(tick) = self.pending_tick.take() {
            tick.cancel();
            report.tick_cancelled = true;
        }

        if let Some(mut capture) = self.capture.take() {
            if !capture.is_stopped() {
                report.errors.extend(capture.stop_tracks());
                report.tracks_stopped = true;
            }
        }

        if let Some(mut detector) = self.detector.take() {
            match detector.dispose() {
                Ok(disposed) => report.detector_disposed = disposed,
                Err(e) => {
                    report.detector_disposed = true;
                    report.errors.push(e);
                }
            }
        }

        for e in &report.errors {
            warn!("Resource release error: {}", e);
        }

        if !report.is_noop() {
            info!(
                "Session resources released (tick cancelled: {}, tracks stopped: {}, detector disposed: {})",
                report.tick_cancelled, report.tracks_stopped, report.detector_disposed
            );
        }

        report
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.release();
        }
    }
}
