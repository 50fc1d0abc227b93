//! Image processing utilities.

pub mod preprocess;

pub use preprocess::{ImagePreprocessor, PreprocessConfig, ResizeFilter};
