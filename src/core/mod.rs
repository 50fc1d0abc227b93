//! The core module of the tirescan service.
//!
//! Re-exports the framework-free core from `tirescan-core` and adds the pieces
//! that need a runtime:
//! - Layered configuration
//! - ONNX Runtime inference
//! - Candle device selection
//! - Tracing setup

pub mod config;
pub mod device;
pub mod inference;

pub use config::{
    AppConfig, AugmentationConfig, EarlyStoppingConfig, ModelConfig, ReduceLrConfig,
    ServerConfig, TrainingConfig, load_config,
};
pub use device::parse_candle_device;
pub use inference::OrtInfer;
pub use tirescan_core::core::*;

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
