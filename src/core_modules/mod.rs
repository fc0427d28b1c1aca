// Layer 1: per-pixel colour transforms and the validated frame.
pub mod pixel;
pub mod frame;

// Layer 2: spatial primitives.
pub mod morphology;
pub mod moment;
pub mod kmeans;

// Layer 3: analysis stages.
pub mod skin_mask;
pub mod condition;
pub mod lesion;
pub mod lesion_detector;
pub mod model;
pub mod lesion_classifier;
pub mod tone;

// Layer 4: aggregation.
pub mod recommendations;
