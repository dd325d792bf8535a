use super::canvas::{Color, RenderTarget};

/// One recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Resize { width: u32, height: u32 },
    Clear,
    StrokeRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
        line_width: u32,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        color: Color,
        size: f32,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Color,
        width: u32,
    },
    Circle {
        center: (f32, f32),
        radius: u32,
        color: Color,
    },
}

/// Render target that records draw calls instead of painting pixels
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    size: (u32, u32),
    display_mirrored: bool,
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    /// Draw calls since the most recent clear
    pub fn current_frame(&self) -> &[DrawOp] {
        let start = self
            .ops
            .iter()
            .rposition(|op| matches!(op, DrawOp::Clear))
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.ops[start..]
    }

    pub fn clear_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, DrawOp::Clear)).count()
    }

    pub fn rects(&self) -> Vec<&DrawOp> {
        self.current_frame()
            .iter()
            .filter(|op| matches!(op, DrawOp::StrokeRect { .. }))
            .collect()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.current_frame()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl RenderTarget for RecordingCanvas {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.size != (width, height) {
            self.size = (width, height);
            self.ops.push(DrawOp::Resize { width, height });
        }
    }

    fn clear(&mut self) {
        self.ops.push(DrawOp::Clear);
    }

    fn set_display_mirrored(&mut self, mirrored: bool) {
        self.display_mirrored = mirrored;
    }

    fn display_mirrored(&self) -> bool {
        self.display_mirrored
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color, line_width: u32) {
        self.ops.push(DrawOp::StrokeRect {
            x,
            y,
            width,
            height,
            color,
            line_width,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color, size: f32) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            color,
            size,
        });
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: u32) {
        self.ops.push(DrawOp::Line {
            from,
            to,
            color,
            width,
        });
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: u32, color: Color) {
        self.ops.push(DrawOp::Circle {
            center,
            radius,
            color,
        });
    }
}
