//! Task predictors.

pub mod tire_classifier;

pub use tire_classifier::TireClassifier;
