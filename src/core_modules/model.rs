// THEORY:
// The lesion classification model is an external collaborator. The engine
// never trains or loads weights itself; it only knows the `LesionModel` trait:
// a fixed input size and a `predict` call that turns one normalised image into
// a probability vector.
//
// `ModelHandle` is the one piece of shared mutable state in the engine. It
// owns a loader closure and runs it at most once, on first use or on an
// explicit warm-up, even when many analyses race for it. The outcome is cached
// for the life of the handle: a loaded model is then shared read-only, and a
// failed load means "unavailable" and the heuristic path from then on. The
// handle is passed into the classifier at construction, so no analysis function
// touches process globals.

use crate::core_modules::frame;
use image::RgbImage;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),
    #[error("prediction failed: {0}")]
    Prediction(String),
    #[error("model returned no probabilities")]
    EmptyOutput,
    #[error("model returned a non-finite probability")]
    InvalidOutput,
}

/// A single-sample batch: `height x width x 3` values in [0, 1], row-major, RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ModelInput {
    /// Resizes the region to `(width, height)` and scales every channel to [0, 1].
    pub fn from_region(region: &RgbImage, (width, height): (u32, u32)) -> Self {
        let resized = frame::resize(region, width, height);
        let data = resized.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Self { width, height, data }
    }
}

pub trait LesionModel: Send + Sync {
    /// `(width, height)` the model expects.
    fn input_size(&self) -> (u32, u32) {
        (224, 224)
    }

    fn predict(&self, input: &ModelInput) -> Result<Vec<f32>, ModelError>;
}

type Loader = Box<dyn Fn() -> Result<Arc<dyn LesionModel>, ModelError> + Send + Sync>;

pub struct ModelHandle {
    loader: Loader,
    model: OnceLock<Option<Arc<dyn LesionModel>>>,
}

impl ModelHandle {
    /// A handle that will call `loader` on first use.
    pub fn lazy<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn LesionModel>, ModelError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            model: OnceLock::new(),
        }
    }

    /// A handle around an already loaded model.
    pub fn ready(model: Arc<dyn LesionModel>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Some(model.clone()));
        Self {
            loader: Box::new(move || Ok(model.clone())),
            model: cell,
        }
    }

    /// The model, loading it first if nobody has yet. `None` if loading failed.
    pub fn get(&self) -> Option<Arc<dyn LesionModel>> {
        self.model
            .get_or_init(|| match (self.loader)() {
                Ok(model) => {
                    info!(input_size = ?model.input_size(), "lesion model loaded");
                    Some(model)
                }
                Err(error) => {
                    warn!(%error, "lesion model unavailable, using heuristic classifier");
                    None
                }
            })
            .clone()
    }

    /// Forces the one-time load. Returns whether a model is available.
    pub fn warm_up(&self) -> bool {
        self.get().is_some()
    }

    /// Whether the load has already been attempted and succeeded.
    pub fn is_loaded(&self) -> bool {
        matches!(self.model.get(), Some(Some(_)))
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.model.get() {
            None => "pending",
            Some(None) => "unavailable",
            Some(Some(_)) => "loaded",
        };
        f.debug_struct("ModelHandle").field("state", &state).finish()
    }
}
