// THEORY:
// The `pipeline` module is the top-level, synchronous API of the skin engine.
// It owns one instance of every stage, configured once, and exposes one entry
// point per analysis plus `analyze_complete`, the result aggregator.
//
// Data flows one way: the caller's image is validated into a `Frame`, the
// condition, lesion and tone stages each read it independently, and the
// aggregator merges whatever they produced with the rule-based
// recommendations.
//
// Error policy: an unusable image (zero area) is the only error the complete
// analysis raises, and it is raised before any stage runs. A stage that fails
// after that point is logged and left out of the result, so the caller always
// gets a structurally complete record for a valid image.
//
// The pipeline keeps no per-call state, so one instance can serve any number of
// concurrent analyses (see `parallel_pipeline`).

use crate::config::AnalyzerConfig;
use crate::core_modules::condition::{SkinConditionAnalyzer, SkinConditionResult};
use crate::core_modules::frame::Frame;
use crate::core_modules::lesion::LesionAnalysisResult;
use crate::core_modules::lesion_classifier::{LesionClassifier, classifier_for};
use crate::core_modules::lesion_detector::LesionDetector;
use crate::core_modules::model::ModelHandle;
use crate::core_modules::recommendations;
use crate::core_modules::tone::{SkinToneResult, ToneClassifier};
use crate::error::Result;
use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Which analyses `analyze_complete` should run. All of them by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub condition: bool,
    pub lesions: bool,
    pub tone: bool,
}

impl AnalysisRequest {
    pub fn all() -> Self {
        Self { condition: true, lesions: true, tone: true }
    }

    pub fn none() -> Self {
        Self { condition: false, lesions: false, tone: false }
    }

    pub fn with_condition(mut self) -> Self {
        self.condition = true;
        self
    }

    pub fn with_lesions(mut self) -> Self {
        self.lesions = true;
        self
    }

    pub fn with_tone(mut self) -> Self {
        self.tone = true;
        self
    }
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self::all()
    }
}

/// The aggregated output of one complete analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteAnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<SkinConditionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesions: Option<LesionAnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<SkinToneResult>,
    pub recommendations: Vec<String>,
}

impl CompleteAnalysisResult {
    /// Merges the available sub-results and derives the recommendation list.
    pub fn from_parts(
        condition: Option<SkinConditionResult>,
        lesions: Option<LesionAnalysisResult>,
        tone: Option<SkinToneResult>,
    ) -> Self {
        let recommendations =
            recommendations::complete_recommendations(condition.as_ref(), lesions.as_ref(), tone.as_ref());
        Self {
            condition,
            lesions,
            tone,
            recommendations,
        }
    }
}

/// The main, top-level struct for the skin engine.
pub struct SkinAnalysisPipeline {
    config: AnalyzerConfig,
    condition_analyzer: SkinConditionAnalyzer,
    lesion_detector: LesionDetector,
    lesion_classifier: Box<dyn LesionClassifier>,
    tone_classifier: ToneClassifier,
    model: Option<Arc<ModelHandle>>,
}

impl SkinAnalysisPipeline {
    /// Builds every stage from `config`. Passing a model handle selects the
    /// model-backed lesion classifier; `None` selects the heuristic.
    pub fn new(config: AnalyzerConfig, model: Option<Arc<ModelHandle>>) -> Self {
        Self {
            condition_analyzer: SkinConditionAnalyzer::new(config.condition.clone()),
            lesion_detector: LesionDetector::new(config.lesion.clone()),
            lesion_classifier: classifier_for(model.clone()),
            tone_classifier: ToneClassifier::new(config.skin.clone(), &config.tone),
            model,
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// "model" or "heuristic".
    pub fn classifier_strategy(&self) -> &'static str {
        self.lesion_classifier.strategy()
    }

    /// Triggers the one-time model load. `false` without a model or if it failed.
    pub fn warm_up_model(&self) -> bool {
        self.model.as_ref().is_some_and(|handle| handle.warm_up())
    }

    pub fn analyze_condition(&self, image: &RgbImage) -> Result<SkinConditionResult> {
        self.condition_analyzer.analyze(image)
    }

    pub fn analyze_lesions(&self, image: &RgbImage) -> Result<LesionAnalysisResult> {
        let frame = Frame::new(image)?;
        self.analyze_lesions_in_frame(&frame)
    }

    pub fn analyze_tone(&self, image: &RgbImage) -> Result<SkinToneResult> {
        self.tone_classifier.classify(image)
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn analyze_complete(&self, image: &RgbImage, request: AnalysisRequest) -> Result<CompleteAnalysisResult> {
        let frame = Frame::new(image)?;

        let condition = request
            .condition
            .then(|| self.condition_analyzer.analyze_frame(&frame));

        let lesions = if request.lesions {
            match self.analyze_lesions_in_frame(&frame) {
                Ok(result) => Some(result),
                Err(error) => {
                    warn!(%error, "lesion analysis failed, omitting it from the result");
                    None
                }
            }
        } else {
            None
        };

        let tone = request.tone.then(|| self.tone_classifier.classify_frame(frame));

        let result = CompleteAnalysisResult::from_parts(condition, lesions, tone);
        info!(recommendations = result.recommendations.len(), "complete analysis finished");
        Ok(result)
    }

    fn analyze_lesions_in_frame(&self, frame: &Frame) -> Result<LesionAnalysisResult> {
        let regions = self.lesion_detector.propose_in_frame(frame)?;
        let classifications = self.lesion_classifier.classify_all(&regions);
        let result = LesionAnalysisResult::from_classifications(classifications);
        info!(
            strategy = self.lesion_classifier.strategy(),
            total = result.total_count(),
            suspicious = result.suspicious_count(),
            malignant = result.malignant_count(),
            "lesions analyzed"
        );
        Ok(result)
    }
}

impl Default for SkinAnalysisPipeline {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default(), None)
    }
}
