use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of landmarks the hand landmarker emits per hand
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Fixed hand skeleton, as pairs of landmark indices
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    // thumb
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    // index finger
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    // middle finger
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    // ring finger
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    // pinky
    (13, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    // palm
    (0, 17),
];

/// Detector variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Object,
    Hand,
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorKind::Object => write!(f, "object"),
            DetectorKind::Hand => write!(f, "hand"),
        }
    }
}

impl std::str::FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "object" => Ok(DetectorKind::Object),
            "hand" => Ok(DetectorKind::Hand),
            other => Err(format!("unknown detector kind '{}'", other)),
        }
    }
}

/// Axis-aligned box in source-frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(origin_x: f32, origin_y: f32, width: f32, height: f32) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }
}

/// Normalized landmark; `x` and `y` are in [0, 1] of the source frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Geometry {
    Box(BoundingBox),
    Landmarks { points: Vec<Landmark> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub score: f32,
    #[serde(default)]
    pub index: Option<i32>,
}

impl Category {
    pub fn new<S: Into<String>>(name: S, score: f32) -> Self {
        Self {
            name: name.into(),
            score,
            index: None,
        }
    }

    /// Overlay label, e.g. `cup (92.00%)`
    pub fn label(&self) -> String {
        format!("{} ({:.2}%)", self.name, self.score * 100.0)
    }

    /// Name with underscores replaced for list display
    pub fn display_name(&self) -> String {
        self.name.replace('_', " ")
    }

    /// Score as a percentage with one decimal
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}", self.score * 100.0)
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            ConfidenceLevel::High
        } else if score >= 0.6 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceLevel::High => write!(f, "High"),
            ConfidenceLevel::Medium => write!(f, "Medium"),
            ConfidenceLevel::Low => write!(f, "Low"),
        }
    }
}

/// One labeled geometry from an inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub geometry: Geometry,
    /// Ordered by descending score
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Detection {
    pub fn boxed(bbox: BoundingBox, categories: Vec<Category>) -> Self {
        let mut detection = Self {
            geometry: Geometry::Box(bbox),
            categories,
        };
        detection.sort_categories();
        detection
    }

    pub fn landmarks(points: Vec<Landmark>, categories: Vec<Category>) -> Self {
        let mut detection = Self {
            geometry: Geometry::Landmarks { points },
            categories,
        };
        detection.sort_categories();
        detection
    }

    pub fn sort_categories(&mut self) {
        self.categories
            .sort_by(|a, b| b.score.total_cmp(&a.score));
    }

    /// Highest-scoring category
    pub fn top_category(&self) -> Option<&Category> {
        self.categories.first()
    }

    pub fn top_score(&self) -> f32 {
        self.top_category().map(|c| c.score).unwrap_or(0.0)
    }
}

/// Full output of one inference call. Immutable; replaced wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSet {
    detections: Arc<[Detection]>,
}

impl Default for DetectionSet {
    fn default() -> Self {
        Self {
            detections: Arc::from(Vec::new()),
        }
    }
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections: detections.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    /// Detector variant that produced this set, from its first geometry
    pub fn kind(&self) -> Option<DetectorKind> {
        self.detections.first().map(|d| match d.geometry {
            Geometry::Box(_) => DetectorKind::Object,
            Geometry::Landmarks { .. } => DetectorKind::Hand,
        })
    }

    /// Number of landmark sets (hands) in this result
    pub fn landmark_set_count(&self) -> usize {
        self.iter()
            .filter(|d| matches!(d.geometry, Geometry::Landmarks { .. }))
            .count()
    }

    /// Whether two sets share the same backing allocation
    pub fn ptr_eq(&self, other: &DetectionSet) -> bool {
        Arc::ptr_eq(&self.detections, &other.detections)
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<Vec<Detection>> for DetectionSet {
    fn from(detections: Vec<Detection>) -> Self {
        Self::new(detections)
    }
}

impl Serialize for DetectionSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DetectionSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Detection>::deserialize(deserializer).map(DetectionSet::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_format() {
        let category = Category::new("cup", 0.92);
        assert_eq!(category.label(), "cup (92.00%)");
    }

    #[test]
    fn test_display_helpers() {
        let category = Category::new("dining_table", 0.654);
        assert_eq!(category.display_name(), "dining table");
        assert_eq!(category.confidence_percent(), "65.4");
        assert_eq!(category.confidence_level(), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.59), ConfidenceLevel::Low);
    }

    #[test]
    fn test_categories_sorted_descending() {
        let detection = Detection::boxed(
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            vec![
                Category::new("bowl", 0.3),
                Category::new("cup", 0.9),
                Category::new("vase", 0.6),
            ],
        );
        let names: Vec<_> = detection.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["cup", "vase", "bowl"]);
        assert_eq!(detection.top_score(), 0.9);
    }

    #[test]
    fn test_hand_connections_cover_all_landmarks() {
        let mut seen = [false; HAND_LANDMARK_COUNT];
        for (a, b) in HAND_CONNECTIONS {
            assert!(a < HAND_LANDMARK_COUNT && b < HAND_LANDMARK_COUNT);
            seen[a] = true;
            seen[b] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_detection_set_json() {
        let json = r#"[
            {"geometry": {"kind": "box", "origin_x": 10, "origin_y": 20, "width": 100, "height": 50},
             "categories": [{"name": "cup", "score": 0.92}]},
            {"geometry": {"kind": "landmarks", "points": [{"x": 0.5, "y": 0.25}]}}
        ]"#;

        let set: DetectionSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.landmark_set_count(), 1);
        assert_eq!(set.kind(), Some(DetectorKind::Object));
        assert_eq!(DetectionSet::empty().kind(), None);
        assert_eq!(
            set.as_slice()[0].geometry,
            Geometry::Box(BoundingBox::new(10.0, 20.0, 100.0, 50.0))
        );
    }

    #[test]
    fn test_detector_kind_parse() {
        assert_eq!("Hand".parse::<DetectorKind>().unwrap(), DetectorKind::Hand);
        assert!("face".parse::<DetectorKind>().is_err());
        assert_eq!(DetectorKind::Object.to_string(), "object");
    }
}
