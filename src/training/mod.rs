//! Offline training of the classification head.
//!
//! The job reads the `train`, `val` and `test` partitions, trains the head on
//! top of the frozen backbone and writes the head to the artifact path the
//! service loads.

pub mod augment;
pub mod callbacks;
pub mod dataset;
pub mod history;
pub mod trainer;

pub use augment::{AugmentParams, Augmenter};
pub use callbacks::{CallbackAction, EarlyStopping, ReduceLrOnPlateau};
pub use dataset::{Batch, DataLoader, ImageFolder};
pub use history::{EpochMetrics, TrainingHistory};
pub use trainer::{Trainer, TrainingReport};
