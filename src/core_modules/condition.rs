// THEORY:
// The condition analyzer turns a face photograph into four independent,
// human-readable scores on a 0-100 scale where higher is always better:
//
// 1.  **Hydration** (HSV value channel): bright, evenly lit skin reads as well
//     hydrated; dullness or blotchy brightness lowers the score.
// 2.  **Texture** (Laplacian): the second derivative responds to every edge and
//     ridge, so the mean absolute response is a direct roughness measure.
// 3.  **Pores** (equalised grayscale, top-hat): after stretching the contrast,
//     the top-hat keeps only bright structures smaller than a 3x3 element, which
//     is the scale at which pores and fine texture appear.
// 4.  **Oiliness** (HSV): shine is bright and colourless, so the share of pixels
//     with a high value and low saturation measures sebum.
//
// The four scores run over the whole image, not the skin mask. Only the tone
// classifier masks to skin first.
//
// Each score is clamped to [0, 100] and rounded to one decimal. A uniform or
// otherwise degenerate image is a valid input: it simply produces extreme but
// well-defined scores.

use crate::config::ConditionConfig;
use crate::core_modules::frame::{self, Frame};
use crate::core_modules::morphology::{self, StructuringElement};
use crate::error::Result;
use image::RgbImage;
use imageproc::contrast::equalize_histogram;
use imageproc::filter::laplacian_filter;
use serde::Serialize;
use tracing::{debug, info};

pub const MAX_SCORE: f64 = 100.0;

/// Clamps a raw score into [0, 100] and rounds it to one decimal place.
pub fn finalize_score(raw: f64) -> f64 {
    if !raw.is_finite() {
        return MAX_SCORE / 2.0;
    }
    round_one_decimal(raw.clamp(0.0, MAX_SCORE))
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Overall skin condition bucket, derived from the mean score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCategory {
    NeedsAttention,
    Fair,
    Good,
    Excellent,
}

impl ConditionCategory {
    pub fn from_score(overall_score: f64) -> Self {
        if overall_score >= 85.0 {
            ConditionCategory::Excellent
        } else if overall_score >= 70.0 {
            ConditionCategory::Good
        } else if overall_score >= 50.0 {
            ConditionCategory::Fair
        } else {
            ConditionCategory::NeedsAttention
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConditionCategory::Excellent => "Excellent",
            ConditionCategory::Good => "Good",
            ConditionCategory::Fair => "Fair",
            ConditionCategory::NeedsAttention => "Needs attention",
        }
    }
}

/// The four condition scores plus their derived summary. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkinConditionResult {
    hydration: f64,
    texture: f64,
    pores: f64,
    oiliness: f64,
    overall_score: f64,
    condition_category: ConditionCategory,
}

impl SkinConditionResult {
    /// Builds a result from four scores; each is clamped into [0, 100] first.
    pub fn new(hydration: f64, texture: f64, pores: f64, oiliness: f64) -> Self {
        let hydration = finalize_score(hydration);
        let texture = finalize_score(texture);
        let pores = finalize_score(pores);
        let oiliness = finalize_score(oiliness);
        let overall_score = round_one_decimal((hydration + texture + pores + oiliness) / 4.0);
        Self {
            hydration,
            texture,
            pores,
            oiliness,
            overall_score,
            condition_category: ConditionCategory::from_score(overall_score),
        }
    }

    pub fn hydration(&self) -> f64 {
        self.hydration
    }

    pub fn texture(&self) -> f64 {
        self.texture
    }

    /// Higher means less visible pores.
    pub fn pores(&self) -> f64 {
        self.pores
    }

    /// Higher means less oily.
    pub fn oiliness(&self) -> f64 {
        self.oiliness
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    pub fn condition_category(&self) -> ConditionCategory {
        self.condition_category
    }
}

/// Stateless analyzer for the four condition scores.
#[derive(Debug, Clone, Default)]
pub struct SkinConditionAnalyzer {
    config: ConditionConfig,
}

impl SkinConditionAnalyzer {
    pub fn new(config: ConditionConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, image: &RgbImage) -> Result<SkinConditionResult> {
        let frame = Frame::new(image)?;
        Ok(self.analyze_frame(&frame))
    }

    pub fn analyze_frame(&self, frame: &Frame) -> SkinConditionResult {
        let planes = frame.hsv_planes();
        let gray = frame.to_gray();

        let hydration = self.hydration_score(&planes.value);
        let texture = self.texture_score(&gray);
        let pores = self.pore_score(&gray);
        let oiliness = self.oiliness_score(&planes.saturation, &planes.value);

        let result = SkinConditionResult::new(hydration, texture, pores, oiliness);
        info!(
            hydration = result.hydration(),
            texture = result.texture(),
            pores = result.pores(),
            oiliness = result.oiliness(),
            overall = result.overall_score(),
            "skin condition analyzed"
        );
        result
    }

    /// Brightness level minus a penalty for brightness spread, both on the 0..1 scale.
    pub fn hydration_score(&self, value_plane: &[u8]) -> f64 {
        let (mean, std_dev) = frame::mean_and_std_dev(value_plane);
        let raw = (mean / 255.0 - self.config.hydration_std_weight * std_dev / 255.0) * MAX_SCORE;
        debug!(mean, std_dev, raw, "hydration");
        finalize_score(raw)
    }

    /// 100 minus the weighted mean absolute Laplacian response.
    pub fn texture_score(&self, gray: &image::GrayImage) -> f64 {
        let laplacian = laplacian_filter(gray);
        let count = laplacian.width() as usize * laplacian.height() as usize;
        if count == 0 {
            return MAX_SCORE / 2.0;
        }
        let total: f64 = laplacian.pixels().map(|p| (p[0] as f64).abs()).sum();
        let mean_edge = total / count as f64;
        debug!(mean_edge, "texture");
        finalize_score(MAX_SCORE - mean_edge * self.config.texture_edge_weight)
    }

    /// 100 minus the weighted mean top-hat response of the equalised image.
    pub fn pore_score(&self, gray: &image::GrayImage) -> f64 {
        let equalized = equalize_histogram(gray);
        let element = StructuringElement::square(self.config.pore_kernel_radius);
        let response = morphology::top_hat(&equalized, &element);
        let count = response.width() as usize * response.height() as usize;
        if count == 0 {
            return MAX_SCORE / 2.0;
        }
        let mean_top_hat = response.pixels().map(|p| p[0] as f64).sum::<f64>() / count as f64;
        debug!(mean_top_hat, "pores");
        finalize_score(MAX_SCORE - mean_top_hat * self.config.pore_tophat_weight)
    }

    /// 100 minus the weighted percentage of shiny (bright, colourless) pixels.
    pub fn oiliness_score(&self, saturation_plane: &[u8], value_plane: &[u8]) -> f64 {
        let total = value_plane.len();
        if total == 0 {
            return MAX_SCORE / 2.0;
        }
        let shiny = saturation_plane
            .iter()
            .zip(value_plane)
            .filter(|&(&s, &v)| v > self.config.shine_value_min && s < self.config.shine_saturation_max)
            .count();
        let oily_percent = shiny as f64 / total as f64 * MAX_SCORE;
        debug!(oily_percent, "oiliness");
        finalize_score(MAX_SCORE - oily_percent * self.config.oily_percent_weight)
    }
}
