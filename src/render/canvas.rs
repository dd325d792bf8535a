use crate::config::RenderConfig;
use crate::error::{Result, VisionError};
use crate::frame::{Frame, FrameFormat};
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use parking_lot::Mutex;
use rusttype::{Font, Scale};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type Color = Rgba<u8>;

pub const RED: Color = Rgba([255, 0, 0, 255]);
pub const GREEN: Color = Rgba([0, 255, 0, 255]);
pub const TRANSPARENT: Color = Rgba([0, 0, 0, 0]);

/// Drawable surface sized to the current frame
pub trait RenderTarget: Send {
    fn size(&self) -> (u32, u32);

    /// Match the frame's natural size; a no-op when already matching
    fn resize(&mut self, width: u32, height: u32);

    fn clear(&mut self);

    /// Flag the target for a horizontal flip at display time
    fn set_display_mirrored(&mut self, mirrored: bool);
    fn display_mirrored(&self) -> bool;

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color, line_width: u32);

    /// Text with its baseline at `y`
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color, size: f32);

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: u32);

    fn fill_circle(&mut self, center: (f32, f32), radius: u32, color: Color);
}

/// Render target shared between a session's frame loop and its readers
pub type SharedRenderTarget = Arc<Mutex<dyn RenderTarget>>;

/// Overlay canvas backed by an RGBA image
pub struct RgbaCanvas {
    image: RgbaImage,
    font: Option<Font<'static>>,
    display_mirrored: bool,
}

impl RgbaCanvas {
    pub fn new() -> Self {
        Self {
            image: RgbaImage::new(0, 0),
            font: None,
            display_mirrored: false,
        }
    }

    /// Canvas with the configured label font. A missing font file only
    /// disables labels; one that cannot be read or parsed is an error.
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let canvas = Self::new();
        match config.font_path.as_deref().filter(|path| !path.is_empty()) {
            Some(path) if Path::new(path).exists() => canvas.with_font_file(path),
            Some(path) => {
                warn!("Font file '{}' not found, box labels will not be drawn", path);
                Ok(canvas)
            }
            None => {
                warn!("No render.font_path configured, box labels will not be drawn");
                Ok(canvas)
            }
        }
    }

    /// Load a TrueType font for labels
    pub fn with_font_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let font_data = std::fs::read(path).map_err(|e| {
            VisionError::component(
                "renderer",
                &format!("Failed to read font file '{}': {}", path.display(), e),
            )
        })?;

        let font = Font::try_from_vec(font_data).ok_or_else(|| {
            VisionError::component(
                "renderer",
                &format!("Failed to parse font file '{}'", path.display()),
            )
        })?;

        self.font = Some(font);
        Ok(self)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Raw overlay pixels in drawing coordinates
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Overlay as it appears on screen, display flip applied
    pub fn display_image(&self) -> RgbaImage {
        if self.display_mirrored {
            imageops::flip_horizontal(&self.image)
        } else {
            self.image.clone()
        }
    }

    /// Mirrored video frame with the displayed overlay on top
    pub fn composite(&self, frame: &Frame) -> Result<RgbaImage> {
        let mut video = frame_to_image(frame)?;
        imageops::flip_horizontal_in_place(&mut video);

        let overlay = self.display_image();
        if overlay.dimensions() == video.dimensions() {
            imageops::overlay(&mut video, &overlay, 0, 0);
        } else {
            debug!(
                "Overlay {:?} does not match frame {:?}, skipping",
                overlay.dimensions(),
                video.dimensions()
            );
        }
        Ok(video)
    }

    /// Write the composite of `frame` and the overlay to a PNG file
    pub fn save_snapshot<P: AsRef<Path>>(&self, frame: &Frame, path: P) -> Result<()> {
        let image = self.composite(frame)?;
        image.save_with_format(path.as_ref(), image::ImageFormat::Png)?;
        info!("Saved overlay snapshot to {}", path.as_ref().display());
        Ok(())
    }
}

impl Default for RgbaCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTarget for RgbaCanvas {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            debug!("Resizing overlay canvas to {}x{}", width, height);
            self.image = RgbaImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    fn set_display_mirrored(&mut self, mirrored: bool) {
        self.display_mirrored = mirrored;
    }

    fn display_mirrored(&self) -> bool {
        self.display_mirrored
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color, line_width: u32) {
        // Inset rings so the stroke stays within the box
        for inset in 0..line_width.max(1) {
            let w = width as i64 - 2 * inset as i64;
            let h = height as i64 - 2 * inset as i64;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x as i32 + inset as i32, y as i32 + inset as i32)
                .of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut self.image, rect, color);
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color, size: f32) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let top = (y - size).max(0.0);
        draw_text_mut(
            &mut self.image,
            color,
            x as i32,
            top as i32,
            Scale::uniform(size),
            font,
            text,
        );
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: u32) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let length = (dx * dx + dy * dy).sqrt();
        if length == 0.0 {
            draw_filled_circle_mut(
                &mut self.image,
                (from.0 as i32, from.1 as i32),
                (width / 2) as i32,
                color,
            );
            return;
        }

        // Parallel strokes offset along the normal
        let (nx, ny) = (-dy / length, dx / length);
        let half = (width.max(1) as f32 - 1.0) / 2.0;
        let mut offset = -half;
        while offset <= half {
            draw_line_segment_mut(
                &mut self.image,
                (from.0 + nx * offset, from.1 + ny * offset),
                (to.0 + nx * offset, to.1 + ny * offset),
                color,
            );
            offset += 0.5;
        }
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: u32, color: Color) {
        draw_filled_circle_mut(
            &mut self.image,
            (center.0 as i32, center.1 as i32),
            radius as i32,
            color,
        );
    }
}

fn frame_to_image(frame: &Frame) -> Result<RgbaImage> {
    if !frame.is_ready() || !frame.validate_size() {
        return Err(VisionError::component(
            "renderer",
            &format!(
                "Frame {}x{} has {} bytes, expected {}",
                frame.width,
                frame.height,
                frame.data.len(),
                frame.expected_size()
            ),
        ));
    }

    let data = match frame.format {
        FrameFormat::Rgba8 => frame.data.as_ref().clone(),
        FrameFormat::Rgb24 => frame
            .data
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
    };

    RgbaImage::from_raw(frame.width, frame.height, data)
        .ok_or_else(|| VisionError::component("renderer", "Frame buffer too small"))
}
