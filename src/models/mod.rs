//! The MobileNetV2 transfer-learning model.
//!
//! * [`MobileNetBackbone`] - frozen ImageNet feature extractor run by ONNX Runtime
//! * [`ClassifierHead`] - pooling, dropout and dense layers, trained with candle
//! * [`MobileNetClassifier`] - both together, usable as a [`crate::core::ScorePredictor`]

pub mod backbone;
pub mod head;
pub mod mobilenet;

pub use backbone::{FeatureExtractor, MobileNetBackbone};
pub use head::ClassifierHead;
pub use mobilenet::MobileNetClassifier;
