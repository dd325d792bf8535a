use crate::error::{CaptureError, ReleaseError};
use crate::frame::Frame;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Requested stream parameters. Width, height and fps are ideals; the
/// device may deliver something else, so readiness is always polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub audio: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            fps: 30,
            audio: false,
        }
    }
}

impl From<&crate::config::CameraConfig> for StreamConstraints {
    fn from(config: &crate::config::CameraConfig) -> Self {
        Self {
            device_index: config.index,
            width: config.resolution.0,
            height: config.resolution.1,
            fps: config.fps,
            audio: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// One independently stoppable track of a stream
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;
    fn label(&self) -> String;
    fn state(&self) -> TrackState;
    fn stop(&self) -> Result<(), CaptureError>;

    fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }
}

/// A live camera stream
pub trait MediaStream: Send + Sync {
    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>>;

    /// Natural size of the current frame; (0, 0) until metadata arrives
    fn video_size(&self) -> (u32, u32);

    /// Media position of the current frame
    fn current_time(&self) -> Duration;

    /// Latest decoded frame
    fn current_frame(&self) -> Frame;
}

/// Camera boundary
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError>;
}

/// Owns the live stream handle for one session
pub struct CaptureSource {
    stream: Box<dyn MediaStream>,
    constraints: StreamConstraints,
    stopped: bool,
}

impl CaptureSource {
    /// Request a stream from the device. Success does not imply the first
    /// frame is available; poll `is_ready`.
    pub async fn open(
        device: &dyn CameraDevice,
        constraints: &StreamConstraints,
    ) -> Result<Self, CaptureError> {
        info!(
            "Requesting camera stream (device {}, ideal {}x{} @ {}fps)",
            constraints.device_index, constraints.width, constraints.height, constraints.fps
        );

        let stream = device.request_stream(constraints).await?;

        debug!("Camera stream opened with {} tracks", stream.tracks().len());

        Ok(Self {
            stream,
            constraints: constraints.clone(),
            stopped: false,
        })
    }

    /// Natural frame width and height are both known
    pub fn is_ready(&self) -> bool {
        let (width, height) = self.stream.video_size();
        !self.stopped && width > 0 && height > 0
    }

    pub fn current_timestamp(&self) -> Duration {
        self.stream.current_time()
    }

    pub fn frame(&self) -> Frame {
        self.stream.current_frame()
    }

    pub fn constraints(&self) -> &StreamConstraints {
        &self.constraints
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Every track ended without this source stopping them
    pub fn has_ended(&self) -> bool {
        let tracks = self.stream.tracks();
        !self.stopped && !tracks.is_empty() && tracks.iter().all(|t| !t.is_live())
    }

    /// Stop every live track. Tracks already ended are skipped, so repeated
    /// calls never stop a track twice.
    pub fn stop_tracks(&mut self) -> Vec<ReleaseError> {
        let mut errors = Vec::new();

        for track in self.stream.tracks() {
            if !track.is_live() {
                debug!("{} track '{}' already ended", track.kind(), track.label());
                continue;
            }

            match track.stop() {
                Ok(()) => info!("MediaStreamTrack stopped: {}", track.kind()),
                Err(e) => {
                    warn!("Failed to stop {} track: {}", track.kind(), e);
                    errors.push(ReleaseError::Track {
                        kind: track.kind().to_string(),
                        details: e.to_string(),
                    });
                }
            }
        }

        self.stopped = true;
        errors
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        if !self.stopped {
            for e in self.stop_tracks() {
                warn!("Error stopping camera track on drop: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSource")
            .field("constraints", &self.constraints)
            .field("video_size", &self.stream.video_size())
            .field("stopped", &self.stopped)
            .finish()
    }
}
