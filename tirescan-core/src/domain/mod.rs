//! Domain types for tire classification.

pub mod classification;

pub use classification::{Classification, TireCondition};
