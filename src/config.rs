// THEORY:
// Every threshold in the engine is a heuristic tunable, so none of them are
// buried as literals inside the stages. `AnalyzerConfig` groups them per stage,
// defaults to the calibrated values, and can be overridden from a JSON file in
// which any omitted field keeps its default.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for the whole analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub skin: SkinMaskConfig,
    pub condition: ConditionConfig,
    pub lesion: LesionConfig,
    pub tone: ToneConfig,
}

/// YCrCb chroma window and mask clean-up for the skin region extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinMaskConfig {
    pub cr_min: u8,
    pub cr_max: u8,
    pub cb_min: u8,
    pub cb_max: u8,
    /// Radius of the elliptical element used for the open/close passes.
    pub kernel_radius: u8,
}

impl Default for SkinMaskConfig {
    fn default() -> Self {
        Self {
            cr_min: 133,
            cr_max: 173,
            cb_min: 77,
            cb_max: 127,
            kernel_radius: 2,
        }
    }
}

/// Weights and thresholds of the four condition scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionConfig {
    /// How strongly brightness variation lowers the hydration score.
    pub hydration_std_weight: f64,
    /// Points removed from the texture score per unit of mean |Laplacian|.
    pub texture_edge_weight: f64,
    /// Points removed from the pore score per unit of mean top-hat response.
    pub pore_tophat_weight: f64,
    /// Half-size of the square element used by the top-hat filter.
    pub pore_kernel_radius: u8,
    /// Minimum HSV value for a pixel to count as shine.
    pub shine_value_min: u8,
    /// Maximum HSV saturation for a pixel to count as shine.
    pub shine_saturation_max: u8,
    /// Points removed from the oiliness score per percent of shiny pixels.
    pub oily_percent_weight: f64,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            hydration_std_weight: 10.0,
            texture_edge_weight: 5.0,
            pore_tophat_weight: 0.5,
            pore_kernel_radius: 1,
            shine_value_min: 150,
            shine_saturation_max: 70,
            oily_percent_weight: 5.0,
        }
    }
}

/// Candidate lesion proposal parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LesionConfig {
    /// Side of the square neighbourhood used by the adaptive threshold. Must be odd.
    pub block_size: u32,
    /// Constant subtracted from the local mean before thresholding.
    pub threshold_offset: f64,
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    /// Hard cap on the number of regions handed to the classifier.
    pub max_regions: usize,
}

impl Default for LesionConfig {
    fn default() -> Self {
        Self {
            block_size: 11,
            threshold_offset: 2.0,
            min_area: 50.0,
            max_area: 5000.0,
            min_aspect: 0.5,
            max_aspect: 2.0,
            max_regions: 10,
        }
    }
}

/// Dominant colour clustering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub max_iterations: usize,
    pub epsilon: f64,
    pub attempts: usize,
    /// Seed for the restart RNG so identical images give identical tones.
    pub seed: u64,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            epsilon: 1.0,
            attempts: 10,
            seed: 0x5EED_0F_5C1,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: AnalyzerConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Rejects configurations the stages cannot run with.
    pub fn validate(&self) -> Result<()> {
        let skin = &self.skin;
        if skin.cr_min > skin.cr_max || skin.cb_min > skin.cb_max {
            return Err(AnalysisError::Config(format!(
                "skin chroma window is inverted: Cr [{}, {}], Cb [{}, {}]",
                skin.cr_min, skin.cr_max, skin.cb_min, skin.cb_max
            )));
        }

        let lesion = &self.lesion;
        if lesion.block_size < 3 || lesion.block_size % 2 == 0 {
            return Err(AnalysisError::Config(format!(
                "lesion block_size must be odd and >= 3, got {}",
                lesion.block_size
            )));
        }
        if lesion.min_area >= lesion.max_area {
            return Err(AnalysisError::Config(format!(
                "lesion area window is empty: ({}, {})",
                lesion.min_area, lesion.max_area
            )));
        }
        if lesion.min_aspect >= lesion.max_aspect {
            return Err(AnalysisError::Config(format!(
                "lesion aspect window is empty: ({}, {})",
                lesion.min_aspect, lesion.max_aspect
            )));
        }
        if lesion.max_regions == 0 {
            return Err(AnalysisError::Config("lesion max_regions must be positive".into()));
        }

        if self.tone.attempts == 0 || self.tone.max_iterations == 0 {
            return Err(AnalysisError::Config(
                "tone clustering needs at least one attempt and one iteration".into(),
            ));
        }

        Ok(())
    }
}
