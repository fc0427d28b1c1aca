// THEORY:
// Only one condition is ever fatal for an analysis: the image itself cannot be
// used (it failed to decode, or it has no pixels). Everything else that can go
// wrong inside the engine (no skin found, a missing model, an empty region) is
// absorbed by the stage that meets it and turned into a well-defined default.
// The remaining variants exist for the outer shell: loading configuration
// files, checking caller-supplied parameters and joining worker tasks.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The image failed to decode or has zero area.
    #[error("Image unreadable: {0}")]
    ImageUnreadable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A caller-supplied score or type outside its documented range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A background analysis task panicked or was cancelled.
    #[error("Worker failure: {0}")]
    Worker(String),
}

impl AnalysisError {
    pub fn is_image_unreadable(&self) -> bool {
        matches!(self, AnalysisError::ImageUnreadable(_))
    }
}

impl From<image::ImageError> for AnalysisError {
    fn from(error: image::ImageError) -> Self {
        AnalysisError::ImageUnreadable(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
