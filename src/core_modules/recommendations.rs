// THEORY:
// Recommendations are a fixed rule table, not a model. Each result type
// contributes its own tips, and a complete analysis concatenates them in the
// order condition, lesions, tone before dropping repeats. Because every rule
// emits a fixed string, de-duplication by exact text is enough, and keeping
// the first occurrence keeps the output order stable.

use crate::core_modules::condition::SkinConditionResult;
use crate::core_modules::lesion::LesionAnalysisResult;
use crate::core_modules::tone::SkinToneResult;
use crate::error::{AnalysisError, Result};
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::collections::HashSet;

/// Scores below this trigger the matching condition tip.
pub const CONDITION_TIP_THRESHOLD: f64 = 60.0;
/// More lesions than this trigger the regular self-check tip.
pub const MANY_LESIONS_THRESHOLD: usize = 10;

pub const HYDRATION_TIP: &str = "Increase skin hydration with moisturizing products";
pub const TEXTURE_TIP: &str = "Use gentle exfoliants to improve skin texture";
pub const PORES_TIP: &str = "Use astringent products to reduce the appearance of pores";
pub const OILINESS_TIP: &str = "Control excess oil with mattifying products";

pub const MALIGNANT_TIP: &str = "See a dermatologist immediately to evaluate potentially malignant moles";
pub const SUSPICIOUS_TIP: &str = "Schedule a specialist review to evaluate suspicious moles";
pub const MANY_LESIONS_TIP: &str = "Perform regular skin checks given the number of moles";
pub const DAILY_SUNSCREEN_TIP: &str = "Protect your skin from the sun with daily sunscreen";

pub const SPF_50_TIP: &str = "Use broad-spectrum SPF 50+ sunscreen";
pub const MIDDAY_SUN_TIP: &str = "Avoid prolonged sun exposure, especially between 10am and 4pm";
pub const PROTECTIVE_CLOTHING_TIP: &str = "Wear protective clothing and hats outdoors";
pub const SPF_30_TIP: &str = "Use broad-spectrum SPF 30+ sunscreen";
pub const LIMIT_EXPOSURE_TIP: &str = "Limit prolonged direct sun exposure";
pub const SPF_15_TIP: &str = "Use broad-spectrum SPF 15+ sunscreen";
pub const RESILIENT_SKIN_TIP: &str = "Protect your skin from sun damage even though it is more resilient";

pub const SUSPICIOUS_FLAG_TIP: &str = "Consult a dermatologist to evaluate suspicious moles";
pub const ROUTINE_TIP: &str = "Maintain a regular facial care routine";

pub fn condition_recommendations(result: &SkinConditionResult) -> Vec<String> {
    score_tips(
        Some(result.hydration()),
        Some(result.texture()),
        Some(result.pores()),
        Some(result.oiliness()),
    )
}

pub fn lesion_recommendations(result: &LesionAnalysisResult) -> Vec<String> {
    let mut tips = Vec::new();
    if result.malignant_count() > 0 {
        tips.push(MALIGNANT_TIP.to_string());
    }
    if result.suspicious_count() > 0 {
        tips.push(SUSPICIOUS_TIP.to_string());
    }
    if result.total_count() > MANY_LESIONS_THRESHOLD {
        tips.push(MANY_LESIONS_TIP.to_string());
    }
    tips.push(DAILY_SUNSCREEN_TIP.to_string());
    tips
}

pub fn tone_recommendations(result: &SkinToneResult) -> Vec<String> {
    sun_protection_tips(result.fitzpatrick_type)
}

/// Sunscreen guidance by Fitzpatrick type; type 0 is treated as the most sensitive.
pub fn sun_protection_tips(fitzpatrick_type: u8) -> Vec<String> {
    let tips: &[&str] = if fitzpatrick_type <= 2 {
        &[SPF_50_TIP, MIDDAY_SUN_TIP, PROTECTIVE_CLOTHING_TIP]
    } else if fitzpatrick_type <= 4 {
        &[SPF_30_TIP, LIMIT_EXPOSURE_TIP]
    } else {
        &[SPF_15_TIP, RESILIENT_SKIN_TIP]
    };
    tips.iter().map(|tip| tip.to_string()).collect()
}

/// Combines whichever results are present, condition first, then lesions, then tone.
pub fn complete_recommendations(
    condition: Option<&SkinConditionResult>,
    lesions: Option<&LesionAnalysisResult>,
    tone: Option<&SkinToneResult>,
) -> Vec<String> {
    let mut tips = Vec::new();
    if let Some(condition) = condition {
        tips.extend(condition_recommendations(condition));
    }
    if let Some(lesions) = lesions {
        tips.extend(lesion_recommendations(lesions));
    }
    if let Some(tone) = tone {
        tips.extend(tone_recommendations(tone));
    }
    dedup_preserving_order(tips)
}

pub fn dedup_preserving_order(tips: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tips.into_iter().filter(|tip| seen.insert(tip.clone())).collect()
}

/// Loose parameters for recommendations without a full analysis.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecommendationParameters {
    pub hydration: Option<f64>,
    pub texture: Option<f64>,
    pub pores: Option<f64>,
    pub oiliness: Option<f64>,
    pub fitzpatrick_type: Option<u8>,
    pub has_suspicious_moles: bool,
}

pub const SCORE_RANGE: RangeInclusive<f64> = 0.0..=100.0;
pub const FITZPATRICK_RANGE: RangeInclusive<u8> = 1..=6;

impl RecommendationParameters {
    /// Scores must lie in [0, 100] and the Fitzpatrick type in 1..=6.
    pub fn validate(&self) -> Result<()> {
        let scores = [
            ("hydration", self.hydration),
            ("texture", self.texture),
            ("pores", self.pores),
            ("oiliness", self.oiliness),
        ];
        for (name, score) in scores {
            if let Some(score) = score.filter(|s| !SCORE_RANGE.contains(s)) {
                return Err(AnalysisError::InvalidParameter(format!(
                    "{} must be between 0 and 100, got {}",
                    name, score
                )));
            }
        }
        if let Some(fitzpatrick_type) = self.fitzpatrick_type.filter(|t| !FITZPATRICK_RANGE.contains(t)) {
            return Err(AnalysisError::InvalidParameter(format!(
                "fitzpatrick_type must be between 1 and 6, got {}",
                fitzpatrick_type
            )));
        }
        Ok(())
    }
}

/// Sunscreen lines for a known Fitzpatrick type, without the extra advice a
/// measured tone adds.
fn parameter_sun_tips(fitzpatrick_type: u8) -> &'static [&'static str] {
    if fitzpatrick_type <= 2 {
        &[SPF_50_TIP, MIDDAY_SUN_TIP]
    } else if fitzpatrick_type <= 4 {
        &[SPF_30_TIP]
    } else {
        &[SPF_15_TIP]
    }
}

/// Tips for loose parameters. Rejects out-of-range input before any rule runs.
pub fn recommend_from_parameters(parameters: &RecommendationParameters) -> Result<Vec<String>> {
    parameters.validate()?;
    let mut tips = score_tips(
        parameters.hydration,
        parameters.texture,
        parameters.pores,
        parameters.oiliness,
    );
    if let Some(fitzpatrick_type) = parameters.fitzpatrick_type {
        tips.extend(parameter_sun_tips(fitzpatrick_type).iter().map(|tip| tip.to_string()));
    }
    if parameters.has_suspicious_moles {
        tips.push(SUSPICIOUS_FLAG_TIP.to_string());
    }
    if tips.is_empty() {
        tips.push(ROUTINE_TIP.to_string());
        tips.push(DAILY_SUNSCREEN_TIP.to_string());
    }
    Ok(dedup_preserving_order(tips))
}

fn score_tips(
    hydration: Option<f64>,
    texture: Option<f64>,
    pores: Option<f64>,
    oiliness: Option<f64>,
) -> Vec<String> {
    [
        (hydration, HYDRATION_TIP),
        (texture, TEXTURE_TIP),
        (pores, PORES_TIP),
        (oiliness, OILINESS_TIP),
    ]
    .into_iter()
    .filter(|(score, _)| score.is_some_and(|s| s < CONDITION_TIP_THRESHOLD))
    .map(|(_, tip)| tip.to_string())
    .collect()
}
