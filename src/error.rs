use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Initialization error: {0}")]
    Initialization(#[from] InitializationError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Release error: {0}")]
    Release(#[from] ReleaseError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl VisionError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether this error ends the owning session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VisionError::Capture(_) | VisionError::Initialization(_)
        )
    }
}

/// Camera acquisition and stream failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Camera permission denied: {details}")]
    PermissionDenied { details: String },

    #[error("No camera device available: {details}")]
    NoDevice { details: String },

    #[error("Failed to open camera stream: {details}")]
    DeviceOpen { details: String },

    #[error("Camera stream ended unexpectedly")]
    StreamEnded,

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },
}

/// Failures that end a session and are exposed as its `last_error`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Initialization(#[from] InitializationError),
}

impl From<SessionError> for VisionError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Capture(e) => VisionError::Capture(e),
            SessionError::Initialization(e) => VisionError::Initialization(e),
        }
    }
}

/// Model or inference runtime failed to load
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InitializationError {
    #[error("Failed to load inference runtime from '{asset_root}': {details}")]
    Runtime { asset_root: String, details: String },

    #[error("Failed to load model '{model}': {details}")]
    Model { model: String, details: String },

    #[error("Invalid detector configuration: {details}")]
    InvalidConfig { details: String },
}

/// A single `infer` call failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Detector handle already disposed")]
    Disposed,

    #[error("Non-increasing inference timestamp {timestamp_micros}us (last {last_micros}us)")]
    NonMonotonicTimestamp {
        timestamp_micros: u64,
        last_micros: u64,
    },

    #[error("Frame has no pixel data ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Inference engine failed: {details}")]
    Engine { details: String },
}

/// Best-effort teardown failures; logged, never propagated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReleaseError {
    #[error("Failed to stop {kind} track: {details}")]
    Track { kind: String, details: String },

    #[error("Failed to close detector: {details}")]
    Detector { details: String },

    #[error("Frame loop did not finish within {timeout:?}")]
    LoopJoin { timeout: Duration },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {count} events")]
    Lagged { count: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, VisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(VisionError::from(CaptureError::StreamEnded).is_fatal());
        assert!(VisionError::from(InitializationError::InvalidConfig {
            details: "num_hands".to_string()
        })
        .is_fatal());
        assert!(!VisionError::from(InferenceError::Disposed).is_fatal());
        assert!(!VisionError::from(ReleaseError::Detector {
            details: "closed twice".to_string()
        })
        .is_fatal());
    }

    #[test]
    fn test_session_error_keeps_message() {
        let error = SessionError::from(CaptureError::PermissionDenied {
            details: "denied by user".to_string(),
        });
        assert_eq!(error.to_string(), "Camera permission denied: denied by user");
        assert!(matches!(VisionError::from(error), VisionError::Capture(_)));
    }
}
