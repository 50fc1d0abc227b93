//! Utilities for the tirescan binaries.

pub mod visualization;

pub use visualization::{PlotConfig, save_training_plots};
