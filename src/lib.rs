//! # tirescan
//!
//! Tire condition classification ("Cracked" vs "Normal") with a MobileNetV2
//! transfer-learning model.
//!
//! ## Features
//!
//! - HTTP service that classifies uploaded tire photos
//! - Offline training job for the classification head
//! - Frozen MobileNetV2 backbone executed with ONNX Runtime
//! - Classification head built and trained with candle
//! - Layered configuration (defaults, TOML file, environment)
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration, ONNX Runtime inference, tracing setup
//! * [`models`] - Backbone, head and the combined classifier
//! * [`server`] - axum routes and the service runner
//! * [`training`] - Datasets, augmentation, callbacks and the training loop
//! * [`utils`] - Training plots
//!
//! The preprocessing pipeline, decision rule and [`TireClassifier`] live in
//! the runtime-free [`tirescan_core`] crate and are re-exported here.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tirescan::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None)?;
//! let model = MobileNetClassifier::load(&config.model, candle_core::Device::Cpu)?;
//! let classifier = TireClassifier::new(
//!     ImagePreprocessor::from_config(&config.model.preprocess),
//!     Arc::new(model),
//! );
//!
//! let bytes = std::fs::read("tire.jpg")?;
//! let result = classifier.classify(&bytes)?;
//! println!("{} ({:.3})", result.condition, result.confidence);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod models;
pub mod server;
pub mod training;
pub mod utils;

pub use tirescan_core;
pub use tirescan_core::predictors::TireClassifier;

/// Prelude module for convenient imports.
///
/// ```rust
/// use tirescan::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{AppConfig, ModelConfig, init_tracing, load_config};
    pub use crate::models::MobileNetClassifier;
    pub use crate::server::AppState;
    pub use tirescan_core::prelude::*;
}
