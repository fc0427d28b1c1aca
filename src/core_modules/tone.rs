// THEORY:
// The tone classifier estimates the Fitzpatrick type from the dominant skin
// colour. Unlike the condition analyzer it looks at skin pixels only: the skin
// region extractor runs first and everything outside the mask is discarded.
//
// The dominant colour is the single centroid of a k=1 clustering of the masked
// pixels. It is matched to the nearest of six reference colours by Euclidean
// distance over RGB; on a tie the lighter (lower) type wins. The reported
// colour is the measured centroid, not the reference it matched.
//
// No skin is a normal outcome: type 0, "Indeterminate", black.

use crate::config::{SkinMaskConfig, ToneConfig};
use crate::core_modules::frame::Frame;
use crate::core_modules::kmeans::KMeans;
use crate::core_modules::pixel::Pixel;
use crate::core_modules::skin_mask::SkinExtractor;
use crate::error::Result;
use image::RgbImage;
use serde::Serialize;
use tracing::{debug, info};

pub const INDETERMINATE_TYPE: u8 = 0;
pub const INDETERMINATE_NAME: &str = "Indeterminate";

/// A Fitzpatrick type with its fixed label and reference colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitzpatrickReference {
    pub fitzpatrick_type: u8,
    pub name: &'static str,
    pub color: Pixel,
}

pub static FITZPATRICK_REFERENCES: [FitzpatrickReference; 6] = [
    FitzpatrickReference { fitzpatrick_type: 1, name: "Type I - Very Light", color: Pixel { red: 255, green: 236, blue: 210 } },
    FitzpatrickReference { fitzpatrick_type: 2, name: "Type II - Light", color: Pixel { red: 241, green: 214, blue: 188 } },
    FitzpatrickReference { fitzpatrick_type: 3, name: "Type III - Medium", color: Pixel { red: 226, green: 192, blue: 166 } },
    FitzpatrickReference { fitzpatrick_type: 4, name: "Type IV - Moderate Brown", color: Pixel { red: 198, green: 160, blue: 124 } },
    FitzpatrickReference { fitzpatrick_type: 5, name: "Type V - Dark Brown", color: Pixel { red: 162, green: 120, blue: 88 } },
    FitzpatrickReference { fitzpatrick_type: 6, name: "Type VI - Very Dark", color: Pixel { red: 98, green: 64, blue: 39 } },
];

/// The reference nearest to `color`; the first one wins a tie.
pub fn nearest_reference(color: &Pixel) -> &'static FitzpatrickReference {
    let mut best = &FITZPATRICK_REFERENCES[0];
    let mut best_distance = color.distance(&best.color);
    for reference in &FITZPATRICK_REFERENCES[1..] {
        let distance = color.distance(&reference.color);
        if distance < best_distance {
            best = reference;
            best_distance = distance;
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkinToneResult {
    /// 1..=6, or 0 when no skin was found.
    pub fitzpatrick_type: u8,
    pub tone_name: String,
    pub rgb_value: (u8, u8, u8),
}

impl SkinToneResult {
    pub fn indeterminate() -> Self {
        Self {
            fitzpatrick_type: INDETERMINATE_TYPE,
            tone_name: INDETERMINATE_NAME.to_string(),
            rgb_value: (0, 0, 0),
        }
    }

    pub fn from_dominant(color: Pixel) -> Self {
        let reference = nearest_reference(&color);
        Self {
            fitzpatrick_type: reference.fitzpatrick_type,
            tone_name: reference.name.to_string(),
            rgb_value: color.as_tuple(),
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.fitzpatrick_type == INDETERMINATE_TYPE
    }
}

pub struct ToneClassifier {
    extractor: SkinExtractor,
    kmeans: KMeans,
}

impl ToneClassifier {
    pub fn new(skin: SkinMaskConfig, tone: &ToneConfig) -> Self {
        Self {
            extractor: SkinExtractor::new(skin),
            kmeans: KMeans::new(1, tone),
        }
    }

    pub fn classify(&self, image: &RgbImage) -> Result<SkinToneResult> {
        let frame = Frame::new(image)?;
        Ok(self.classify_frame(frame))
    }

    pub fn classify_frame(&self, frame: Frame) -> SkinToneResult {
        let mask = self.extractor.extract(&frame);
        let skin: Vec<Pixel> = mask.skin_pixels(frame).collect();
        debug!(skin_pixels = skin.len(), "clustering skin pixels");

        let result = match self.kmeans.fit(&skin).and_then(|c| c.dominant()) {
            Some(dominant) => SkinToneResult::from_dominant(dominant),
            None => SkinToneResult::indeterminate(),
        };
        info!(
            fitzpatrick_type = result.fitzpatrick_type,
            tone = %result.tone_name,
            "skin tone classified"
        );
        result
    }
}

impl Default for ToneClassifier {
    fn default() -> Self {
        Self::new(SkinMaskConfig::default(), &ToneConfig::default())
    }
}
