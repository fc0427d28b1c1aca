// THEORY:
// This file is the main entry point for the `derma_vision` library crate. It
// defines the public API exposed to outer layers (a web service, a batch job,
// the bundled CLI).
//
// The primary exports are `SkinAnalysisPipeline` for synchronous use and
// `ParallelPipeline` for async callers, together with the plain, serializable
// result records they produce. The stages themselves live in `core_modules`
// and stay available for callers that only need one of them.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::AnalyzerConfig;
pub use core_modules::condition::{ConditionCategory, SkinConditionResult};
pub use core_modules::frame::{decode_image, load_image};
pub use core_modules::lesion::{LesionAnalysisResult, LesionClassification, LesionLabel, Position};
pub use core_modules::model::{LesionModel, ModelError, ModelHandle, ModelInput};
pub use core_modules::recommendations::{RecommendationParameters, recommend_from_parameters};
pub use core_modules::tone::SkinToneResult;
pub use error::{AnalysisError, Result};
pub use parallel_pipeline::ParallelPipeline;
pub use pipeline::{AnalysisRequest, CompleteAnalysisResult, SkinAnalysisPipeline};
