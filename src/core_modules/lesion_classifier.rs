// THEORY:
// Two interchangeable strategies label a candidate lesion as benign,
// suspicious or malignant. Which one runs is decided once, when the classifier
// is built, by whether a model handle was supplied:
//
// - `HeuristicClassifier` scores three hand-crafted features in the spirit of
//   the dermatological ABCD rule: colour irregularity (hue spread), asymmetry
//   (normalised mixed central moment of the grayscale region) and darkness
//   (mean HSV value). A fixed decision table maps them to a label with a fixed
//   confidence.
// - `ModelClassifier` resizes and normalises the region, submits it to the
//   external model and interprets the probability vector. Any model problem
//   (load failure, prediction error, empty or non-finite output) degrades to
//   the heuristic for that region; it is logged, never raised.

use crate::core_modules::frame;
use crate::core_modules::lesion::{LesionClassification, LesionLabel, LesionRegion};
use crate::core_modules::model::{ModelError, ModelHandle, ModelInput};
use crate::core_modules::moment::ImageMoments;
use std::sync::Arc;
use tracing::{debug, warn};

pub trait LesionClassifier: Send + Sync {
    fn classify(&self, region: &LesionRegion) -> LesionClassification;

    /// Short name for logs.
    fn strategy(&self) -> &'static str;

    fn classify_all(&self, regions: &[LesionRegion]) -> Vec<LesionClassification> {
        regions.iter().map(|region| self.classify(region)).collect()
    }
}

/// The model-backed strategy when a handle is given, the heuristic otherwise.
pub fn classifier_for(model: Option<Arc<ModelHandle>>) -> Box<dyn LesionClassifier> {
    match model {
        Some(handle) => Box::new(ModelClassifier::new(handle)),
        None => Box::new(HeuristicClassifier),
    }
}

/// The three colour and shape features the heuristic decides on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicFeatures {
    pub hue_std: f64,
    pub asymmetry: f64,
    pub mean_value: f64,
}

impl HeuristicFeatures {
    pub fn extract(region: &LesionRegion) -> Self {
        let planes = frame::hsv_planes(&region.pixels);
        let (_, hue_std) = frame::mean_and_std_dev(&planes.hue);
        let (mean_value, _) = frame::mean_and_std_dev(&planes.value);
        let asymmetry = ImageMoments::from_gray(&frame::to_gray(&region.pixels)).asymmetry();
        Self { hue_std, asymmetry, mean_value }
    }

    /// First matching rule wins.
    pub fn decide(&self) -> (LesionLabel, f64) {
        let asymmetry = self.asymmetry.abs();
        if self.hue_std > 20.0 && asymmetry > 0.2 && self.mean_value < 80.0 {
            (LesionLabel::Suspicious, 70.0)
        } else if self.hue_std > 15.0 || asymmetry > 0.15 || self.mean_value < 60.0 {
            (LesionLabel::Suspicious, 60.0)
        } else {
            (LesionLabel::Benign, 75.0)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl LesionClassifier for HeuristicClassifier {
    fn classify(&self, region: &LesionRegion) -> LesionClassification {
        let features = HeuristicFeatures::extract(region);
        let (label, confidence) = features.decide();
        debug!(?features, label = label.as_str(), "heuristic lesion classification");
        LesionClassification::new(label, confidence, region.position)
    }

    fn strategy(&self) -> &'static str {
        "heuristic"
    }
}

/// Maps a probability vector to a label and a percentage confidence.
///
/// Three or more entries are class probabilities (0 benign, 1 malignant, any
/// other index suspicious). A shorter vector carries the malignancy
/// probability in its first entry, which is also the reported confidence for
/// either label.
pub fn interpret_prediction(output: &[f32]) -> Result<(LesionLabel, f64), ModelError> {
    if output.is_empty() {
        return Err(ModelError::EmptyOutput);
    }
    if output.iter().any(|p| !p.is_finite()) {
        return Err(ModelError::InvalidOutput);
    }

    if output.len() >= 3 {
        let (index, probability) = output
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &p)| if p > best.1 { (i, p) } else { best });
        let label = match index {
            0 => LesionLabel::Benign,
            1 => LesionLabel::Malignant,
            _ => LesionLabel::Suspicious,
        };
        Ok((label, probability as f64 * 100.0))
    } else {
        let malignancy = output[0] as f64;
        let label = if malignancy > 0.5 { LesionLabel::Malignant } else { LesionLabel::Benign };
        Ok((label, malignancy * 100.0))
    }
}

pub struct ModelClassifier {
    handle: Arc<ModelHandle>,
    fallback: HeuristicClassifier,
}

impl ModelClassifier {
    pub fn new(handle: Arc<ModelHandle>) -> Self {
        Self {
            handle,
            fallback: HeuristicClassifier,
        }
    }

    fn predict(&self, region: &LesionRegion) -> Result<(LesionLabel, f64), ModelError> {
        let model = self
            .handle
            .get()
            .ok_or_else(|| ModelError::Unavailable("model failed to load".into()))?;
        let input = ModelInput::from_region(&region.pixels, model.input_size());
        let output = model.predict(&input)?;
        interpret_prediction(&output)
    }
}

impl LesionClassifier for ModelClassifier {
    fn classify(&self, region: &LesionRegion) -> LesionClassification {
        match self.predict(region) {
            Ok((label, confidence)) => {
                debug!(label = label.as_str(), confidence, "model lesion classification");
                LesionClassification::new(label, confidence, region.position)
            }
            Err(error) => {
                if self.handle.is_loaded() {
                    warn!(%error, position = ?region.position, "model prediction unusable, using heuristic");
                }
                self.fallback.classify(region)
            }
        }
    }

    fn strategy(&self) -> &'static str {
        "model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::lesion::Position;
    use crate::core_modules::model::LesionModel;
    use image::{Rgb, RgbImage};

    struct FixedModel(Vec<f32>);

    impl LesionModel for FixedModel {
        fn input_size(&self) -> (u32, u32) {
            (16, 16)
        }

        fn predict(&self, input: &ModelInput) -> Result<Vec<f32>, ModelError> {
            assert_eq!(input.data.len(), 16 * 16 * 3);
            Ok(self.0.clone())
        }
    }

    fn region(color: Rgb<u8>) -> LesionRegion {
        LesionRegion {
            position: Position::new(3, 4, 20, 20),
            pixels: RgbImage::from_pixel(20, 20, color),
        }
    }

    fn with_model(output: Vec<f32>) -> Box<dyn LesionClassifier> {
        classifier_for(Some(Arc::new(ModelHandle::ready(Arc::new(FixedModel(output))))))
    }

    #[test]
    fn decision_table_is_ordered() {
        let strong = HeuristicFeatures { hue_std: 25.0, asymmetry: -0.3, mean_value: 50.0 };
        assert_eq!(strong.decide(), (LesionLabel::Suspicious, 70.0));

        let irregular_but_bright = HeuristicFeatures { hue_std: 25.0, asymmetry: 0.3, mean_value: 120.0 };
        assert_eq!(irregular_but_bright.decide(), (LesionLabel::Suspicious, 60.0));

        let dark_only = HeuristicFeatures { hue_std: 0.0, asymmetry: 0.0, mean_value: 59.0 };
        assert_eq!(dark_only.decide(), (LesionLabel::Suspicious, 60.0));

        let calm = HeuristicFeatures { hue_std: 15.0, asymmetry: 0.15, mean_value: 60.0 };
        assert_eq!(calm.decide(), (LesionLabel::Benign, 75.0));
    }

    #[test]
    fn uniform_light_region_is_benign() {
        let classification = HeuristicClassifier.classify(&region(Rgb([150, 110, 90])));
        assert_eq!(classification.label, LesionLabel::Benign);
        assert_eq!(classification.confidence, 75.0);
        assert_eq!(classification.position, Position::new(3, 4, 20, 20));
    }

    #[test]
    fn uniform_dark_region_is_suspicious() {
        let classification = HeuristicClassifier.classify(&region(Rgb([40, 30, 25])));
        assert_eq!(classification.label, LesionLabel::Suspicious);
        assert_eq!(classification.confidence, 60.0);
    }

    #[test]
    fn no_model_means_heuristic() {
        assert_eq!(classifier_for(None).strategy(), "heuristic");
    }

    #[test]
    fn multi_class_output_takes_argmax() {
        let (label, confidence) = interpret_prediction(&[0.7, 0.2, 0.1]).expect("valid");
        assert_eq!(label, LesionLabel::Benign);
        assert!((confidence - 70.0).abs() < 1e-4);
        let (label, confidence) = interpret_prediction(&[0.1, 0.8, 0.1]).expect("valid");
        assert_eq!(label, LesionLabel::Malignant);
        assert!((confidence - 80.0).abs() < 1e-4);
        let (label, _) = interpret_prediction(&[0.1, 0.2, 0.3, 0.4]).expect("valid");
        assert_eq!(label, LesionLabel::Suspicious);
    }

    #[test]
    fn binary_output_is_malignancy_probability() {
        let (label, confidence) = interpret_prediction(&[0.75]).expect("valid");
        assert_eq!(label, LesionLabel::Malignant);
        assert!((confidence - 75.0).abs() < 1e-4);

        let (label, confidence) = interpret_prediction(&[0.5]).expect("valid");
        assert_eq!(label, LesionLabel::Benign);
        assert!((confidence - 50.0).abs() < 1e-4);

        // A benign verdict still reports the malignancy probability.
        let (label, confidence) = interpret_prediction(&[0.2]).expect("valid");
        assert_eq!(label, LesionLabel::Benign);
        assert!((confidence - 20.0).abs() < 1e-4);
    }

    #[test]
    fn unusable_output_is_an_error() {
        assert_eq!(interpret_prediction(&[]), Err(ModelError::EmptyOutput));
        assert_eq!(interpret_prediction(&[f32::NAN, 0.1, 0.2]), Err(ModelError::InvalidOutput));
    }

    #[test]
    fn model_classifier_uses_model_output() {
        let classifier = with_model(vec![0.05, 0.9, 0.05]);
        assert_eq!(classifier.strategy(), "model");
        let classification = classifier.classify(&region(Rgb([150, 110, 90])));
        assert_eq!(classification.label, LesionLabel::Malignant);
        assert_eq!(classification.confidence, 90.0);
    }

    #[test]
    fn empty_model_output_falls_back_to_heuristic() {
        let classification = with_model(Vec::new()).classify(&region(Rgb([150, 110, 90])));
        assert_eq!(classification.label, LesionLabel::Benign);
        assert_eq!(classification.confidence, 75.0);
    }

    #[test]
    fn failed_load_falls_back_to_heuristic() {
        let handle = ModelHandle::lazy(|| Err(ModelError::Unavailable("no weights".into())));
        let classifier = classifier_for(Some(Arc::new(handle)));
        let classifications = classifier.classify_all(&[region(Rgb([40, 30, 25])), region(Rgb([150, 110, 90]))]);
        let confidences: Vec<f64> = classifications.iter().map(|c| c.confidence).collect();
        assert_eq!(confidences, vec![60.0, 75.0]);
    }
}
