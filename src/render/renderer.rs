use super::canvas::{Color, RenderTarget, GREEN, RED};
use super::transform::{box_to_canvas, label_baseline, landmark_to_canvas, MirrorMode};
use crate::config::RenderConfig;
use crate::detection::{
    BoundingBox, Detection, DetectionSet, DetectorKind, Geometry, Landmark, HAND_CONNECTIONS,
};
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub box_color: Color,
    pub box_line_width: u32,
    pub label_color: Color,
    pub label_font_size: f32,
    pub connector_color: Color,
    pub connector_line_width: u32,
    pub landmark_color: Color,
    pub landmark_radius: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: RED,
            box_line_width: 2,
            label_color: RED,
            label_font_size: 16.0,
            connector_color: GREEN,
            connector_line_width: 5,
            landmark_color: RED,
            landmark_radius: 4,
        }
    }
}

impl From<&RenderConfig> for OverlayStyle {
    fn from(config: &RenderConfig) -> Self {
        Self {
            box_line_width: config.box_line_width,
            label_font_size: config.label_font_size,
            connector_line_width: config.connector_line_width,
            landmark_radius: config.landmark_radius,
            ..Self::default()
        }
    }
}

/// What one render pass drew
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub boxes: usize,
    pub labels: usize,
    pub landmark_sets: usize,
    pub connectors: usize,
}

/// Paints a detection set onto a render target
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    style: OverlayStyle,
    mode: MirrorMode,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle, mode: MirrorMode) -> Self {
        Self { style, mode }
    }

    pub fn for_kind(kind: DetectorKind, config: &RenderConfig) -> Self {
        Self::new(OverlayStyle::from(config), MirrorMode::for_kind(kind))
    }

    pub fn mode(&self) -> MirrorMode {
        self.mode
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Size the target to the frame, set its display flip, then clear it
    pub fn prepare(&self, target: &mut dyn RenderTarget, frame_size: (u32, u32)) {
        target.resize(frame_size.0, frame_size.1);
        target.set_display_mirrored(self.mode.flips_target());
        target.clear();
    }

    /// Full render pass. An empty set leaves a cleared target.
    pub fn render(
        &self,
        target: &mut dyn RenderTarget,
        frame_size: (u32, u32),
        detections: &DetectionSet,
    ) -> RenderSummary {
        self.prepare(target, frame_size);

        let mut summary = RenderSummary::default();
        for detection in detections {
            self.draw_detection(target, detection, &mut summary);
        }

        trace!(
            "Rendered {} boxes, {} landmark sets",
            summary.boxes,
            summary.landmark_sets
        );
        summary
    }

    fn draw_detection(
        &self,
        target: &mut dyn RenderTarget,
        detection: &Detection,
        summary: &mut RenderSummary,
    ) {
        match &detection.geometry {
            Geometry::Box(bbox) => self.draw_box(target, bbox, detection, summary),
            Geometry::Landmarks { points } => self.draw_landmarks(target, points, summary),
        }
    }

    fn draw_box(
        &self,
        target: &mut dyn RenderTarget,
        bbox: &BoundingBox,
        detection: &Detection,
        summary: &mut RenderSummary,
    ) {
        let canvas_width = target.size().0 as f32;
        let drawn = box_to_canvas(bbox, canvas_width, self.mode);

        target.stroke_rect(
            drawn.origin_x,
            drawn.origin_y,
            drawn.width,
            drawn.height,
            self.style.box_color,
            self.style.box_line_width,
        );
        summary.boxes += 1;

        if let Some(category) = detection.top_category() {
            target.fill_text(
                &category.label(),
                drawn.origin_x,
                label_baseline(drawn.origin_y),
                self.style.label_color,
                self.style.label_font_size,
            );
            summary.labels += 1;
        }
    }

    fn draw_landmarks(
        &self,
        target: &mut dyn RenderTarget,
        points: &[Landmark],
        summary: &mut RenderSummary,
    ) {
        let canvas_size = target.size();
        let to_canvas = |landmark: &Landmark| landmark_to_canvas(landmark, canvas_size, self.mode);

        for (start, end) in HAND_CONNECTIONS {
            // Partial landmark sets skip connectors with a missing end
            let (Some(a), Some(b)) = (points.get(start), points.get(end)) else {
                continue;
            };
            target.line(
                to_canvas(a),
                to_canvas(b),
                self.style.connector_color,
                self.style.connector_line_width,
            );
            summary.connectors += 1;
        }

        for landmark in points {
            target.fill_circle(
                to_canvas(landmark),
                self.style.landmark_radius,
                self.style.landmark_color,
            );
        }

        summary.landmark_sets += 1;
    }
}
