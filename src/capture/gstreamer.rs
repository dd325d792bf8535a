use super::source::{
    CameraDevice, MediaStream, MediaTrack, StreamConstraints, TrackKind, TrackState,
};
use crate::error::CaptureError;
use crate::frame::{Frame, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// v4l2 camera read through a GStreamer pipeline into RGBA frames
pub struct GstCameraDevice;

impl GstCameraDevice {
    pub fn new() -> Result<Self, CaptureError> {
        gstreamer::init().map_err(|e| CaptureError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;
        Ok(Self)
    }

    fn pipeline_string(constraints: &StreamConstraints) -> String {
        format!(
            "v4l2src device=/dev/video{} do-timestamp=true ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=RGBA,width={},height={},framerate={}/1 ! \
             appsink name=sink sync=false max-buffers=1 drop=true emit-signals=false",
            constraints.device_index, constraints.width, constraints.height, constraints.fps
        )
    }
}

#[async_trait]
impl CameraDevice for GstCameraDevice {
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        let device_path = format!("/dev/video{}", constraints.device_index);
        if !std::path::Path::new(&device_path).exists() {
            return Err(CaptureError::NoDevice {
                details: format!("{} does not exist", device_path),
            });
        }

        let pipeline_desc = Self::pipeline_string(constraints);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CaptureError::DeviceOpen {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CaptureError::DeviceOpen {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CaptureError::DeviceOpen {
                details: "Failed to get appsink".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CaptureError::DeviceOpen {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        let latest = Arc::new(Mutex::new(Frame::unready()));
        let sink_latest = Arc::clone(&latest);

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    match frame_from_sample(&sample) {
                        Ok(frame) => *sink_latest.lock() = frame,
                        Err(e) => warn!("Dropping camera sample: {}", e),
                    }
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CaptureError::PermissionDenied {
                details: format!("Failed to start {}: {}", device_path, e),
            });
        }

        info!("GStreamer pipeline started for {}", device_path);

        Ok(Box::new(GstStream {
            latest,
            track: Arc::new(GstVideoTrack {
                pipeline,
                label: device_path,
                live: AtomicBool::new(true),
            }),
        }))
    }
}

fn frame_from_sample(sample: &gstreamer::Sample) -> Result<Frame, String> {
    let buffer = sample.buffer().ok_or("No buffer in sample")?;
    let caps = sample.caps().ok_or("No caps in sample")?;
    let info = VideoInfo::from_caps(caps).map_err(|e| format!("Bad caps: {}", e))?;
    let map = buffer
        .map_readable()
        .map_err(|e| format!("Failed to map buffer: {}", e))?;

    let current_time = buffer
        .pts()
        .map(|pts| Duration::from_nanos(pts.nseconds()))
        .unwrap_or_default();

    trace!(
        "Camera sample {}x{} at {:?} ({} bytes)",
        info.width(),
        info.height(),
        current_time,
        map.len()
    );

    Ok(Frame::new(
        map.as_slice().to_vec(),
        info.width(),
        info.height(),
        current_time,
        FrameFormat::Rgba8,
    ))
}

struct GstStream {
    latest: Arc<Mutex<Frame>>,
    track: Arc<GstVideoTrack>,
}

impl MediaStream for GstStream {
    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        vec![Arc::clone(&self.track) as Arc<dyn MediaTrack>]
    }

    fn video_size(&self) -> (u32, u32) {
        self.latest.lock().dimensions()
    }

    fn current_time(&self) -> Duration {
        self.latest.lock().current_time
    }

    fn current_frame(&self) -> Frame {
        self.latest.lock().clone()
    }
}

struct GstVideoTrack {
    pipeline: Pipeline,
    label: String,
    live: AtomicBool,
}

impl MediaTrack for GstVideoTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn state(&self) -> TrackState {
        if !self.live.load(Ordering::SeqCst) {
            return TrackState::Ended;
        }
        let (_, current, _) = self.pipeline.state(gstreamer::ClockTime::ZERO);
        if current == gstreamer::State::Null {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    fn stop(&self) -> Result<(), CaptureError> {
        self.live.store(false, Ordering::SeqCst);
        self.pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| CaptureError::Configuration {
                details: format!("Failed to stop pipeline: {}", e),
            })?;
        debug!("GStreamer pipeline for {} stopped", self.label);
        Ok(())
    }
}

impl Drop for GstVideoTrack {
    fn drop(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
                error!("Failed to stop GStreamer pipeline on drop: {}", e);
            }
        }
    }
}
