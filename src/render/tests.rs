use super::*;
use crate::config::{VisionConfig, DEFAULT_FONT_PATH};
use crate::detection::{
    BoundingBox, Category, Detection, DetectionSet, DetectorKind, Landmark, HAND_CONNECTIONS,
};
use crate::frame::{Frame, FrameFormat};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

fn cup_set() -> DetectionSet {
    DetectionSet::new(vec![Detection::boxed(
        BoundingBox::new(10.0, 20.0, 100.0, 50.0),
        vec![Category::new("cup", 0.92)],
    )])
}

fn hand(points: usize) -> Detection {
    let landmarks = (0..points)
        .map(|i| Landmark::new(0.1 + i as f32 * 0.01, 0.5))
        .collect();
    Detection::landmarks(landmarks, vec![Category::new("Right", 0.97)])
}

#[test]
fn test_mirror_box_x() {
    assert_eq!(mirror_box_x(640.0, 10.0, 100.0), 530.0);
    assert_eq!(mirror_box_x(640.0, 0.0, 640.0), 0.0);

    // Boxes stay on-canvas for every in-range origin
    for ox in (0..=540).step_by(20) {
        let x = mirror_box_x(640.0, ox as f32, 100.0);
        assert!((0.0..=540.0).contains(&x));
        assert_eq!(x + 100.0 + ox as f32, 640.0);
    }
}

#[test]
fn test_cup_scenario_draws_mirrored_box_and_label() {
    let renderer = OverlayRenderer::new(OverlayStyle::default(), MirrorMode::Geometric);
    let mut canvas = RecordingCanvas::new();

    let summary = renderer.render(&mut canvas, (640, 480), &cup_set());
    assert_eq!(summary.boxes, 1);
    assert_eq!(summary.labels, 1);
    assert!(!canvas.display_mirrored());

    assert_eq!(
        canvas.rects(),
        vec![&DrawOp::StrokeRect {
            x: 530.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
            color: RED,
            line_width: 2,
        }]
    );
    assert_eq!(canvas.texts(), vec!["cup (92.00%)"]);

    match canvas.current_frame().last() {
        Some(DrawOp::Text { x, y, size, .. }) => {
            assert_eq!(*x, 530.0);
            assert_eq!(*y, 15.0);
            assert_eq!(*size, 16.0);
        }
        other => panic!("Expected label, got {:?}", other),
    }
}

#[test]
fn test_label_clamped_near_top_edge() {
    assert_eq!(label_baseline(20.0), 15.0);
    assert_eq!(label_baseline(10.0), 10.0);
    assert_eq!(label_baseline(0.0), 10.0);
}

#[test]
fn test_empty_set_clears_and_draws_nothing() {
    let renderer = OverlayRenderer::new(OverlayStyle::default(), MirrorMode::Geometric);
    let mut canvas = RecordingCanvas::new();

    renderer.render(&mut canvas, (640, 480), &cup_set());
    let summary = renderer.render(&mut canvas, (640, 480), &DetectionSet::empty());

    assert_eq!(summary, RenderSummary::default());
    assert_eq!(canvas.clear_count(), 2);
    assert!(canvas.current_frame().is_empty());
}

#[test]
fn test_target_follows_frame_resolution() {
    let renderer = OverlayRenderer::new(OverlayStyle::default(), MirrorMode::Geometric);
    let mut canvas = RecordingCanvas::new();

    renderer.render(&mut canvas, (640, 480), &cup_set());
    renderer.render(&mut canvas, (640, 480), &cup_set());
    renderer.render(&mut canvas, (1280, 720), &cup_set());

    let resizes: Vec<_> = canvas
        .ops()
        .iter()
        .filter(|op| matches!(op, DrawOp::Resize { .. }))
        .collect();
    assert_eq!(resizes.len(), 2);
    assert_eq!(canvas.size(), (1280, 720));

    // Mirrored against the new width
    match canvas.rects()[0] {
        DrawOp::StrokeRect { x, .. } => assert_eq!(*x, 1170.0),
        other => panic!("Expected rect, got {:?}", other),
    }
}

#[test]
fn test_hand_overlay_uses_display_transform_only() {
    let renderer = OverlayRenderer::new(OverlayStyle::default(), MirrorMode::DisplayTransform);
    let mut canvas = RecordingCanvas::new();
    let set = DetectionSet::new(vec![hand(21), hand(21)]);

    let summary = renderer.render(&mut canvas, (640, 480), &set);
    assert!(canvas.display_mirrored());
    assert_eq!(summary.landmark_sets, 2);
    assert_eq!(summary.connectors, 2 * HAND_CONNECTIONS.len());

    // Raw scaled coordinates: no geometric flip on top of the display flip
    let first_circle = canvas
        .current_frame()
        .iter()
        .find_map(|op| match op {
            DrawOp::Circle { center, radius, color } => Some((*center, *radius, *color)),
            _ => None,
        })
        .unwrap();
    assert_eq!(first_circle, ((64.0, 240.0), 4, RED));

    let lines = canvas
        .current_frame()
        .iter()
        .filter(|op| matches!(op, DrawOp::Line { color, width: 5, .. } if *color == GREEN))
        .count();
    assert_eq!(lines, 2 * HAND_CONNECTIONS.len());
}

#[test]
fn test_geometric_mode_flips_landmarks_instead() {
    let landmark = Landmark::new(0.25, 0.5);
    assert_eq!(
        landmark_to_canvas(&landmark, (640, 480), MirrorMode::Geometric),
        (480.0, 240.0)
    );
    assert_eq!(
        landmark_to_canvas(&landmark, (640, 480), MirrorMode::DisplayTransform),
        (160.0, 240.0)
    );
}

#[test]
fn test_partial_landmark_set_skips_missing_connectors() {
    let renderer = OverlayRenderer::new(OverlayStyle::default(), MirrorMode::DisplayTransform);
    let mut canvas = RecordingCanvas::new();

    let summary = renderer.render(&mut canvas, (100, 100), &DetectionSet::new(vec![hand(5)]));
    // Only the thumb chain (0-1, 1-2, 2-3, 3-4) is complete
    assert_eq!(summary.connectors, 4);
}

#[test]
fn test_mirror_mode_per_kind() {
    assert_eq!(MirrorMode::for_kind(DetectorKind::Object), MirrorMode::Geometric);
    assert_eq!(
        MirrorMode::for_kind(DetectorKind::Hand),
        MirrorMode::DisplayTransform
    );

    let config = VisionConfig::default();
    let renderer = OverlayRenderer::for_kind(DetectorKind::Hand, &config.render);
    assert!(renderer.mode().flips_target());
    assert_eq!(renderer.style().connector_line_width, 5);
}

#[test]
fn test_rgba_canvas_paints_mirrored_box() {
    let renderer = OverlayRenderer::new(OverlayStyle::default(), MirrorMode::Geometric);
    let mut canvas = RgbaCanvas::new();

    renderer.render(&mut canvas, (640, 480), &cup_set());
    let image = canvas.image();
    assert_eq!(image.dimensions(), (640, 480));

    // Left edge of the mirrored box, not the source position
    assert_eq!(*image.get_pixel(530, 40), RED);
    assert_eq!(*image.get_pixel(10, 40), TRANSPARENT);

    renderer.render(&mut canvas, (640, 480), &DetectionSet::empty());
    assert!(canvas.image().pixels().all(|p| *p == TRANSPARENT));
}

#[test]
fn test_composite_aligns_overlay_with_mirrored_video() {
    let style = OverlayStyle {
        landmark_radius: 0,
        ..OverlayStyle::default()
    };
    let renderer = OverlayRenderer::new(style, MirrorMode::DisplayTransform);
    let mut canvas = RgbaCanvas::new();
    let point = Detection::landmarks(vec![Landmark::new(0.25, 0.5)], Vec::new());
    renderer.render(&mut canvas, (8, 4), &DetectionSet::new(vec![point]));

    // Raw drawing at x=2, shown flipped at x=5
    assert_eq!(*canvas.image().get_pixel(2, 2), RED);
    assert_eq!(*canvas.image().get_pixel(5, 2), TRANSPARENT);
    assert_eq!(*canvas.display_image().get_pixel(5, 2), RED);

    let frame = Frame::new(vec![255; 8 * 4 * 4], 8, 4, Duration::ZERO, FrameFormat::Rgba8);
    let composite = canvas.composite(&frame).unwrap();
    assert_eq!(composite.dimensions(), (8, 4));
    assert_eq!(*composite.get_pixel(5, 2), RED);
    assert_eq!(*composite.get_pixel(2, 2), image::Rgba([255, 255, 255, 255]));

    assert!(canvas.composite(&Frame::unready()).is_err());
}

#[test]
fn test_snapshot_written_as_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overlay.png");

    let renderer = OverlayRenderer::new(OverlayStyle::default(), MirrorMode::Geometric);
    let mut canvas = RgbaCanvas::new();
    renderer.render(&mut canvas, (16, 16), &DetectionSet::empty());

    let frame = Frame::new(vec![0; 16 * 16 * 3], 16, 16, Duration::ZERO, FrameFormat::Rgb24);
    canvas.save_snapshot(&frame, &path).unwrap();

    let written = image::open(&path).unwrap();
    assert_eq!((written.width(), written.height()), (16, 16));
}

#[test]
fn test_missing_font_file_is_component_error() {
    assert!(RgbaCanvas::new().with_font_file("/nonexistent/font.ttf").is_err());
    assert!(!RgbaCanvas::new().has_font());
}

#[test]
fn test_default_config_uses_system_font() {
    let config = VisionConfig::default();
    assert_eq!(config.render.font_path.as_deref(), Some(DEFAULT_FONT_PATH));

    let canvas = RgbaCanvas::from_config(&config.render).unwrap();
    assert_eq!(canvas.has_font(), Path::new(DEFAULT_FONT_PATH).exists());
}

#[test]
fn test_default_font_paints_box_labels() {
    if !Path::new(DEFAULT_FONT_PATH).exists() {
        return;
    }
    let config = VisionConfig::default();
    let renderer = OverlayRenderer::for_kind(DetectorKind::Object, &config.render);

    let mut labelled = RgbaCanvas::from_config(&config.render).unwrap();
    let mut plain = RgbaCanvas::new();
    renderer.render(&mut labelled, (200, 120), &cup_set());
    renderer.render(&mut plain, (200, 120), &cup_set());

    assert!(labelled.has_font());
    assert_ne!(labelled.image().as_raw(), plain.image().as_raw());
}

#[test]
fn test_font_fallback_only_for_missing_file() {
    let mut render = VisionConfig::default().render;
    render.font_path = Some("/nonexistent/font.ttf".to_string());
    assert!(!RgbaCanvas::from_config(&render).unwrap().has_font());

    render.font_path = None;
    assert!(!RgbaCanvas::from_config(&render).unwrap().has_font());

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    bad.write_all(b"not a truetype font").unwrap();
    render.font_path = Some(bad.path().to_string_lossy().to_string());
    assert!(RgbaCanvas::from_config(&render).is_err());
}
