//! The core module of the tire classifier.
//!
//! This module contains the fundamental pieces shared by every other part of the
//! workspace:
//! - Tensor aliases and layout descriptors
//! - Configuration validation
//! - Constants
//! - Error handling
//! - The `ScorePredictor` inference capability

pub mod batch;
pub mod config;
pub mod constants;
pub mod errors;
pub mod traits;

pub use batch::{Tensor2D, Tensor4D, TensorLayout};
pub use config::{ConfigError, ConfigValidator};
pub use constants::*;
pub use errors::{ClassifierError, ClassifierResult, ProcessingStage, SimpleError};
pub use traits::ScorePredictor;
