use crate::detection::{BoundingBox, DetectorKind, Landmark};
use serde::{Deserialize, Serialize};

/// How the overlay is aligned with the horizontally mirrored video.
///
/// Exactly one mirror is applied per rendering path: either coordinates are
/// flipped while drawing, or the target is flipped at display time. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorMode {
    /// Flip X coordinates while drawing; the target is shown as-is
    Geometric,
    /// Draw raw coordinates; the target is flipped when displayed
    DisplayTransform,
}

impl MirrorMode {
    /// Boxes are flipped geometrically, landmark overlays ride the display flip
    pub fn for_kind(kind: DetectorKind) -> Self {
        match kind {
            DetectorKind::Object => MirrorMode::Geometric,
            DetectorKind::Hand => MirrorMode::DisplayTransform,
        }
    }

    pub fn flips_target(&self) -> bool {
        matches!(self, MirrorMode::DisplayTransform)
    }
}

/// Mirrored origin-X of a box `[origin_x, origin_x + width)` on a canvas of
/// `canvas_width`
pub fn mirror_box_x(canvas_width: f32, origin_x: f32, width: f32) -> f32 {
    canvas_width - (origin_x + width)
}

/// Box in canvas pixel space
pub fn box_to_canvas(bbox: &BoundingBox, canvas_width: f32, mode: MirrorMode) -> BoundingBox {
    let origin_x = match mode {
        MirrorMode::Geometric => mirror_box_x(canvas_width, bbox.origin_x, bbox.width),
        MirrorMode::DisplayTransform => bbox.origin_x,
    };
    BoundingBox::new(origin_x, bbox.origin_y, bbox.width, bbox.height)
}

/// Normalized landmark scaled to canvas pixels
pub fn landmark_to_canvas(
    landmark: &Landmark,
    canvas_size: (u32, u32),
    mode: MirrorMode,
) -> (f32, f32) {
    let width = canvas_size.0 as f32;
    let x = landmark.x * width;
    let y = landmark.y * canvas_size.1 as f32;
    match mode {
        MirrorMode::Geometric => (width - x, y),
        MirrorMode::DisplayTransform => (x, y),
    }
}

/// Label baseline for a box, kept inside the top edge
pub fn label_baseline(origin_y: f32) -> f32 {
    if origin_y > 10.0 {
        origin_y - 5.0
    } else {
        10.0
    }
}
