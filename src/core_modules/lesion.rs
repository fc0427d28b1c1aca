// THEORY:
// Value records shared by the lesion proposer, the classifiers and the
// aggregator. A `LesionRegion` lives for exactly one classification; what
// survives the call is the `LesionClassification` (label, confidence and the
// region's position) and the tally built from them.
//
// The tally is computed once, in `LesionAnalysisResult::from_classifications`,
// so the three counts always sum to `total_count` and `has_risk` always agrees
// with them.

use image::RgbImage;
use serde::Serialize;

/// Axis-aligned bounding box in image coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Position {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// A candidate lesion: where it is and a copy of its pixels.
#[derive(Debug, Clone)]
pub struct LesionRegion {
    pub position: Position,
    pub pixels: RgbImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LesionLabel {
    Benign,
    Suspicious,
    Malignant,
}

impl LesionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LesionLabel::Benign => "benign",
            LesionLabel::Suspicious => "suspicious",
            LesionLabel::Malignant => "malignant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LesionClassification {
    pub label: LesionLabel,
    /// Percentage in [0, 100].
    pub confidence: f64,
    pub position: Position,
}

impl LesionClassification {
    pub fn new(label: LesionLabel, confidence: f64, position: Position) -> Self {
        let confidence = if confidence.is_finite() {
            (confidence.clamp(0.0, 100.0) * 10.0).round() / 10.0
        } else {
            0.0
        };
        Self { label, confidence, position }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LesionAnalysisResult {
    total_count: usize,
    benign_count: usize,
    malignant_count: usize,
    suspicious_count: usize,
    details: Vec<LesionClassification>,
    has_risk: bool,
}

impl LesionAnalysisResult {
    pub fn from_classifications(details: Vec<LesionClassification>) -> Self {
        let count = |label: LesionLabel| details.iter().filter(|c| c.label == label).count();
        let benign_count = count(LesionLabel::Benign);
        let malignant_count = count(LesionLabel::Malignant);
        let suspicious_count = count(LesionLabel::Suspicious);
        Self {
            total_count: details.len(),
            benign_count,
            malignant_count,
            suspicious_count,
            has_risk: malignant_count > 0 || suspicious_count > 0,
            details,
        }
    }

    pub fn empty() -> Self {
        Self::from_classifications(Vec::new())
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn benign_count(&self) -> usize {
        self.benign_count
    }

    pub fn malignant_count(&self) -> usize {
        self.malignant_count
    }

    pub fn suspicious_count(&self) -> usize {
        self.suspicious_count
    }

    /// Classifications in proposal order.
    pub fn details(&self) -> &[LesionClassification] {
        &self.details
    }

    pub fn has_risk(&self) -> bool {
        self.has_risk
    }
}
