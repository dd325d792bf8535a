mod canvas;
mod recording;
mod renderer;
mod transform;
#[cfg(test)]
mod tests;

pub use canvas::{Color, RenderTarget, RgbaCanvas, SharedRenderTarget, GREEN, RED, TRANSPARENT};
pub use recording::{DrawOp, RecordingCanvas};
pub use renderer::{OverlayRenderer, OverlayStyle, RenderSummary};
pub use transform::{box_to_canvas, label_baseline, landmark_to_canvas, mirror_box_x, MirrorMode};
