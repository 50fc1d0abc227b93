//! Configuration for the inference service and the training job.
//!
//! Settings are layered with `figment`: built-in defaults, then an optional TOML
//! file (`tirescan.toml` in the working directory unless another path is given),
//! then environment variables prefixed with `TIRESCAN_`, using `__` to reach
//! nested keys:
//!
//! ```text
//! TIRESCAN_SERVER__PORT=8080
//! TIRESCAN_MODEL__HEAD_PATH=/srv/models/tire_classifier.safetensors
//! TIRESCAN_TRAINING__EPOCHS=20
//! ```
//!
//! The service reads `[server]` and `[model]`; the training job reads
//! `[training]` and `[model]`, so both agree on where the head artifact lives.

use crate::core::{ConfigError, ConfigValidator};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tirescan_core::core::{DEFAULT_BACKBONE_FILE, DEFAULT_HEAD_FILE};
use tirescan_core::processors::PreprocessConfig;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tirescan.toml";

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "TIRESCAN_";

/// Where the model lives and how its input is prepared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Frozen MobileNetV2 backbone exported to ONNX, without the classification top.
    pub backbone_path: PathBuf,
    /// Trained classification head written by the training job.
    pub head_path: PathBuf,
    /// Backbone input tensor name. Discovered from the model when unset.
    pub input_name: Option<String>,
    /// Backbone output tensor name. The first output is used when unset.
    pub output_name: Option<String>,
    /// Number of ONNX Runtime sessions to keep for concurrent requests.
    pub session_pool_size: usize,
    /// Image preprocessing settings.
    pub preprocess: PreprocessConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::get_defaults()
    }
}

impl ConfigValidator for ModelConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_positive_usize(self.session_pool_size, "session_pool_size")?;
        self.preprocess.validate()
    }

    fn get_defaults() -> Self {
        Self {
            backbone_path: PathBuf::from(DEFAULT_BACKBONE_FILE),
            head_path: PathBuf::from(DEFAULT_HEAD_FILE),
            input_name: None,
            output_name: None,
            session_pool_size: 1,
            preprocess: PreprocessConfig::default(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Maximum request body size in bytes. Unlimited when unset.
    pub body_limit_bytes: Option<usize>,
    /// Origins allowed by CORS. Every origin is allowed when empty.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::get_defaults()
    }
}

impl ConfigValidator for ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "server.host must not be empty".to_string(),
            });
        }
        if let Some(limit) = self.body_limit_bytes {
            self.validate_positive_usize(limit, "server.body_limit_bytes")?;
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            body_limit_bytes: None,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// The `host:port` string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Random transformations applied to training images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Maximum rotation in degrees, sampled uniformly in `[-r, r]`.
    pub rotation_range: f32,
    /// Maximum horizontal shift as a fraction of the width.
    pub width_shift_range: f32,
    /// Maximum vertical shift as a fraction of the height.
    pub height_shift_range: f32,
    /// Zoom factors are sampled independently per axis in `[1 - z, 1 + z]`.
    pub zoom_range: f32,
    /// Mirror images left-right with probability 0.5.
    pub horizontal_flip: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_range: 10.0,
            width_shift_range: 0.1,
            height_shift_range: 0.1,
            zoom_range: 0.1,
            horizontal_flip: true,
        }
    }
}

impl AugmentationConfig {
    /// A configuration that leaves images untouched.
    pub fn disabled() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [
            ("rotation_range", self.rotation_range, 180.0),
            ("width_shift_range", self.width_shift_range, 1.0),
            ("height_shift_range", self.height_shift_range, 1.0),
            ("zoom_range", self.zoom_range, 0.99),
        ];
        for (name, value, max) in ranges {
            if !value.is_finite() || !(0.0..=max).contains(&value) {
                return Err(ConfigError::InvalidConfig {
                    message: format!("augmentation.{name} must be in [0, {max}], got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Stop training once the validation loss stops improving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    /// Epochs without improvement before stopping.
    pub patience: usize,
    /// Minimum decrease that counts as an improvement.
    pub min_delta: f64,
    /// Restore the weights of the best epoch when stopping.
    pub restore_best_weights: bool,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            patience: 3,
            min_delta: 0.0,
            restore_best_weights: true,
        }
    }
}

/// Reduce the learning rate once the validation loss plateaus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceLrConfig {
    /// Epochs without improvement before reducing.
    pub patience: usize,
    /// Multiplier applied to the learning rate.
    pub factor: f64,
    /// Lower bound of the learning rate.
    pub min_lr: f64,
    /// Minimum decrease that counts as an improvement.
    pub min_delta: f64,
}

impl Default for ReduceLrConfig {
    fn default() -> Self {
        Self {
            patience: 2,
            factor: 0.5,
            min_lr: 1e-6,
            min_delta: 1e-4,
        }
    }
}

/// Settings of the offline training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Dataset root containing the three partitions.
    pub data_dir: PathBuf,
    /// Training partition, relative to `data_dir`.
    pub train_subdir: String,
    /// Validation partition, relative to `data_dir`.
    pub val_subdir: String,
    /// Test partition, relative to `data_dir`.
    pub test_subdir: String,
    /// Images per batch.
    pub batch_size: usize,
    /// Seed for shuffling, augmentation and dropout.
    pub seed: u64,
    /// Maximum number of epochs.
    pub epochs: usize,
    /// Initial Adam learning rate.
    pub learning_rate: f64,
    /// Dropout rate applied to the pooled features.
    pub dropout: f32,
    /// Width of the hidden dense layer.
    pub hidden_units: usize,
    /// Training-set augmentation.
    pub augmentation: AugmentationConfig,
    /// Early stopping on validation loss.
    pub early_stopping: EarlyStoppingConfig,
    /// Learning-rate reduction on validation-loss plateau.
    pub reduce_lr: ReduceLrConfig,
    /// Directory that receives the accuracy/loss plots and the history file.
    pub plots_dir: PathBuf,
    /// TrueType font used for plot titles. Titles are skipped when unset.
    pub plot_font_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::get_defaults()
    }
}

impl ConfigValidator for TrainingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_batch_size(self.batch_size)?;
        self.validate_positive_usize(self.epochs, "training.epochs")?;
        self.validate_positive_usize(self.hidden_units, "training.hidden_units")?;
        self.validate_positive_f64(self.learning_rate, "training.learning_rate")?;
        self.validate_unit_interval(f64::from(self.dropout), "training.dropout")?;
        if self.dropout >= 1.0 {
            return Err(ConfigError::InvalidConfig {
                message: "training.dropout must be below 1.0".to_string(),
            });
        }
        self.validate_positive_usize(self.early_stopping.patience, "early_stopping.patience")?;
        self.validate_positive_usize(self.reduce_lr.patience, "reduce_lr.patience")?;
        if !(self.reduce_lr.factor > 0.0 && self.reduce_lr.factor < 1.0) {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "reduce_lr.factor must be in (0, 1), got {}",
                    self.reduce_lr.factor
                ),
            });
        }
        if self.reduce_lr.min_lr < 0.0 {
            return Err(ConfigError::InvalidConfig {
                message: "reduce_lr.min_lr must not be negative".to_string(),
            });
        }
        self.augmentation.validate()
    }

    fn get_defaults() -> Self {
        Self {
            data_dir: PathBuf::from("split_data"),
            train_subdir: "train".to_string(),
            val_subdir: "val".to_string(),
            test_subdir: "test".to_string(),
            batch_size: 16,
            seed: 42,
            epochs: 10,
            learning_rate: 1e-4,
            dropout: 0.3,
            hidden_units: 64,
            augmentation: AugmentationConfig::default(),
            early_stopping: EarlyStoppingConfig::default(),
            reduce_lr: ReduceLrConfig::default(),
            plots_dir: PathBuf::from("training_plots"),
            plot_font_path: None,
        }
    }
}

impl TrainingConfig {
    /// Path of the training partition.
    pub fn train_dir(&self) -> PathBuf {
        self.data_dir.join(&self.train_subdir)
    }

    /// Path of the validation partition.
    pub fn val_dir(&self) -> PathBuf {
        self.data_dir.join(&self.val_subdir)
    }

    /// Path of the test partition.
    pub fn test_dir(&self) -> PathBuf {
        self.data_dir.join(&self.test_subdir)
    }
}

/// Complete configuration shared by all binaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Model location and preprocessing.
    pub model: ModelConfig,
    /// Training job settings.
    pub training: TrainingConfig,
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.model.validate()?;
        self.training.validate()
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Loads the layered configuration.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `TIRESCAN_`)
/// 2. The config file: `config_file` when given, otherwise `tirescan.toml`
///    in the working directory if it exists
/// 3. Built-in defaults
///
/// # Errors
///
/// Returns `ConfigError::InvalidConfig` when an explicitly requested file is
/// missing, `ConfigError::LoadFailed` when a source cannot be parsed, and any
/// validation error of the merged result.
pub fn load_config(config_file: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    match config_file {
        Some(path) => {
            if !path.is_file() {
                return Err(ConfigError::InvalidConfig {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: AppConfig = figment.extract().map_err(|e| ConfigError::LoadFailed {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tirescan_core::core::TensorLayout;
    use tirescan_core::processors::ResizeFilter;

    #[test]
    fn test_training_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.training.batch_size, 16);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.epochs, 10);
        assert_eq!(config.training.learning_rate, 1e-4);
        assert_eq!(config.training.dropout, 0.3);
        assert_eq!(config.training.hidden_units, 64);
        assert_eq!(config.training.early_stopping.patience, 3);
        assert_eq!(config.training.reduce_lr.patience, 2);
        assert_eq!(config.training.reduce_lr.factor, 0.5);
        assert_eq!(config.training.reduce_lr.min_lr, 1e-6);
        assert_eq!(config.model.head_path, PathBuf::from(DEFAULT_HEAD_FILE));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[model]
head_path = "models/head.safetensors"

[model.preprocess]
resize_filter = "bilinear"
layout = "nchw"

[training]
epochs = 3
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.model.head_path, PathBuf::from("models/head.safetensors"));
        assert_eq!(config.model.preprocess.resize_filter, ResizeFilter::Bilinear);
        assert_eq!(config.model.preprocess.layout, TensorLayout::Nchw);
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.batch_size, 16);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("no/such/tirescan.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { .. }));
    }

    #[test]
    fn test_invalid_training_values_rejected() {
        let mut config = TrainingConfig::default();
        config.reduce_lr.factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.dropout = 1.0;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.augmentation.zoom_range = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overridden_host_is_revalidated() {
        let mut config = AppConfig::default();
        config.server.host = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.host must not be empty"));
    }

    #[test]
    fn test_partition_paths() {
        let config = TrainingConfig {
            data_dir: PathBuf::from("/data"),
            ..TrainingConfig::default()
        };
        assert_eq!(config.train_dir(), PathBuf::from("/data/train"));
        assert_eq!(config.val_dir(), PathBuf::from("/data/val"));
        assert_eq!(config.test_dir(), PathBuf::from("/data/test"));
    }
}
