//! # tirescan core
//!
//! Core types, preprocessing and the decision rule of the tirescan tire
//! condition classifier. Nothing in this crate depends on an ML runtime: the
//! model is reached through the [`core::ScorePredictor`] trait, so everything
//! here can be exercised with a stub predictor.
//!
//! ## Modules
//!
//! * [`core`] - Errors, constants, configuration validation, tensor aliases
//! * [`domain`] - Tire condition labels and the decision rule
//! * [`processors`] - Image preprocessing
//! * [`predictors`] - The tire classifier
//! * [`utils`] - Image decoding helpers

pub mod core;
pub mod domain;
pub mod predictors;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{ClassifierError, ClassifierResult, ScorePredictor, Tensor4D, TensorLayout};
    pub use crate::domain::{Classification, TireCondition};
    pub use crate::predictors::TireClassifier;
    pub use crate::processors::{ImagePreprocessor, PreprocessConfig, ResizeFilter};
    pub use crate::utils::{decode_image, load_image};
}
