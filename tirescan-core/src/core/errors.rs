//! Error types for the tire classifier.
//!
//! This module defines the errors that can occur while decoding uploaded images,
//! preparing tensors, running the model and loading configuration. The HTTP layer
//! reports these errors to clients through their `Display` text, so every variant
//! renders a message that is meaningful on its own.

use crate::core::config::ConfigError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Step of the pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Building, moving or reshaping a tensor.
    TensorOperation,
    /// Assembling or bookkeeping a training batch.
    BatchProcessing,
    /// Turning model output into a classification.
    PostProcessing,
    /// Encoding images, fonts or plots.
    Rendering,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProcessingStage::TensorOperation => "tensor operation",
            ProcessingStage::BatchProcessing => "batch processing",
            ProcessingStage::PostProcessing => "post-processing",
            ProcessingStage::Rendering => "rendering",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong between an uploaded image and a label.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The model artifact could not be loaded at startup.
    #[error("MobileNet model not loaded")]
    ModelNotLoaded,

    /// The uploaded bytes are not a decodable image.
    #[error("cannot identify image file: {0}")]
    ImageDecode(#[source] image::ImageError),

    /// A pipeline step failed.
    #[error("{kind} failed: {context}")]
    Processing {
        /// Step that failed.
        kind: ProcessingStage,
        /// What the step was working on.
        context: String,
        /// Cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred while running the model.
    #[error("inference failed for model '{model_name}': {context}")]
    Inference {
        /// Name of the model that failed.
        model_name: String,
        /// Additional context about the failure.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A model file exists but could not be opened or parsed.
    #[error("failed to load model from '{}': {reason}", path.display())]
    ModelLoad {
        /// Path of the model file.
        path: PathBuf,
        /// Short description of what went wrong.
        reason: String,
        /// The underlying error, when there is one.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The model produced a score that cannot be mapped to a class.
    #[error("model returned an invalid score: {score}")]
    InvalidScore {
        /// The offending score.
        score: f32,
    },

    /// Input with the wrong shape, size or content.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// What is wrong with the input.
        message: String,
    },

    /// Unusable settings, including an unavailable device.
    #[error("configuration: {message}")]
    ConfigError {
        /// What is wrong with the settings.
        message: String,
    },

    /// Error from tensor shape operations.
    #[error("tensor operation: {0}")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassifierError {
    /// Wraps the cause of a failed pipeline step.
    ///
    /// # Arguments
    ///
    /// * `kind` - Step that failed.
    /// * `context` - What the step was working on.
    /// * `error` - Cause.
    pub fn processing_error(
        kind: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a `ClassifierError` for tensor operations.
    pub fn tensor_operation(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_error(ProcessingStage::TensorOperation, context, error)
    }

    /// Creates a `ClassifierError` for batch assembly.
    pub fn batch_processing(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_error(ProcessingStage::BatchProcessing, context, error)
    }

    /// Creates a `ClassifierError` for a failed inference call.
    ///
    /// # Arguments
    ///
    /// * `model_name` - Name of the model that failed.
    /// * `context` - What the model was doing when it failed.
    /// * `error` - The underlying runtime error.
    pub fn inference_error(
        model_name: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a `ClassifierError` for a model file that failed to load.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the model file.
    /// * `reason` - Short description of the failure.
    /// * `error` - The underlying error, if any.
    pub fn model_load_error(
        path: &Path,
        reason: &str,
        error: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        Self::ModelLoad {
            path: path.to_path_buf(),
            reason: reason.to_string(),
            source: error.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Shorthand for [`ClassifierError::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Shorthand for [`ClassifierError::ConfigError`].
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

impl From<image::ImageError> for ClassifierError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageDecode(err)
    }
}

impl From<ConfigError> for ClassifierError {
    fn from(err: ConfigError) -> Self {
        Self::config_error(err.to_string())
    }
}

/// Convenient result alias for classifier operations.
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// A plain message error, used as the source of errors that have no underlying cause.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    /// Creates a new `SimpleError` with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_loaded_message() {
        assert_eq!(
            ClassifierError::ModelNotLoaded.to_string(),
            "MobileNet model not loaded"
        );
    }

    #[test]
    fn test_processing_error_display_includes_stage() {
        let err = ClassifierError::tensor_operation(
            "reshape input",
            SimpleError::new("shape mismatch"),
        );
        assert_eq!(err.to_string(), "tensor operation failed: reshape input");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_model_load_error_without_source() {
        let err = ClassifierError::model_load_error(
            Path::new("missing.onnx"),
            "file not found",
            None::<std::io::Error>,
        );
        assert_eq!(
            err.to_string(),
            "failed to load model from 'missing.onnx': file not found"
        );
        assert!(std::error::Error::source(&err).is_none());
    }
}
