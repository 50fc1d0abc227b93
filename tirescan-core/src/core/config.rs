//! Configuration errors and shared validation checks.
//!
//! Model files are not checked here. A missing artifact is not a
//! configuration error; the service starts without a model instead.

use thiserror::Error;

/// Smallest square input MobileNetV2 accepts.
pub const MIN_INPUT_SIZE: u32 = 32;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Batches must hold at least one image.
    #[error("batch size must be greater than 0")]
    InvalidBatchSize,

    /// A value is outside its allowed range or otherwise unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A configuration source could not be read or merged.
    #[error("failed to load configuration: {message}")]
    LoadFailed { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Validation shared by every configuration section.
///
/// Sections implement `validate` and `get_defaults` and compose the provided
/// range checks.
pub trait ConfigValidator {
    /// Checks every field of the section.
    fn validate(&self) -> Result<(), ConfigError>;

    /// The section with its built-in defaults.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Rejects empty batches.
    fn validate_batch_size(&self, batch_size: usize) -> Result<(), ConfigError> {
        match batch_size {
            0 => Err(ConfigError::InvalidBatchSize),
            _ => Ok(()),
        }
    }

    /// Rejects model input sizes MobileNetV2 cannot downsample.
    fn validate_input_size(&self, size: u32) -> Result<(), ConfigError> {
        if size < MIN_INPUT_SIZE {
            return Err(ConfigError::invalid(format!(
                "input_size must be at least {MIN_INPUT_SIZE}, got {size}"
            )));
        }
        Ok(())
    }

    /// Requires `0 <= value <= 1`.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to check.
    /// * `field_name` - Dotted field path used in the error message.
    fn validate_unit_interval(&self, value: f64, field_name: &str) -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(ConfigError::invalid(format!(
                "{field_name} must lie in [0, 1], got {value}"
            )))
        }
    }

    /// Requires a finite value above zero.
    fn validate_positive_f64(&self, value: f64, field_name: &str) -> Result<(), ConfigError> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::invalid(format!(
                "{field_name} must be a positive number, got {value}"
            )))
        }
    }

    /// Requires a count of at least one.
    fn validate_positive_usize(&self, value: usize, field_name: &str) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::invalid(format!("{field_name} must be at least 1")));
        }
        Ok(())
    }
}
