//! The inference capability the classifier is built on.

use crate::core::batch::Tensor4D;
use crate::core::errors::ClassifierResult;

/// A model that maps a preprocessed image batch to one probability per image.
///
/// The classifier only ever needs this single operation, which keeps the HTTP
/// contract and the decision rule independent of the runtime that executes the
/// network. Implementations must be shareable across request handlers.
pub trait ScorePredictor: Send + Sync {
    /// Runs the model on `input` and returns the sigmoid probability for each
    /// image in the batch, in batch order.
    fn predict(&self, input: &Tensor4D) -> ClassifierResult<Vec<f32>>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "model"
    }
}

impl<T: ScorePredictor + ?Sized> ScorePredictor for std::sync::Arc<T> {
    fn predict(&self, input: &Tensor4D) -> ClassifierResult<Vec<f32>> {
        (**self).predict(input)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
