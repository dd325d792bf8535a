#[cfg(all(target_os = "linux", feature = "gstreamer-camera"))]
mod gstreamer;
mod mock;
mod source;

#[cfg(all(target_os = "linux", feature = "gstreamer-camera"))]
pub use self::gstreamer::GstCameraDevice;
pub use mock::{FeedMode, MockCameraDevice, MockStreamController, MockTrack};
pub use source::{
    CameraDevice, CaptureSource, MediaStream, MediaTrack, StreamConstraints, TrackKind,
    TrackState,
};
