//! Tire Classification Service
//!
//! Serves the MobileNet tire classifier over HTTP.
//!
//! Usage:
//! ```
//! tirescan-serve [--config tirescan.toml] [--port 5000] [--head tire_classifier.safetensors]
//! ```
//!
//! When the model cannot be loaded the service still starts: `/health` reports
//! `"model_status": "not loaded"` and `/classify` answers with a 500.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tirescan::core::{ConfigValidator, init_tracing, load_config, parse_candle_device};
use tirescan::models::MobileNetClassifier;
use tirescan::server::{self, AppState};
use tirescan::tirescan_core::processors::ImagePreprocessor;
use tirescan::TireClassifier;
use tracing::{error, info};

/// Command-line arguments for the classification service
#[derive(Parser)]
#[command(name = "tirescan-serve")]
#[command(about = "HTTP API that classifies tire images as Cracked or Normal")]
struct Args {
    /// Configuration file (defaults to ./tirescan.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// Backbone ONNX file
    #[arg(long)]
    backbone: Option<PathBuf>,

    /// Trained head weights
    #[arg(long)]
    head: Option<PathBuf>,

    /// Device for the head: cpu, cuda, or cuda:N
    #[arg(long, default_value = "cpu")]
    device: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backbone) = args.backbone {
        config.model.backbone_path = backbone;
    }
    if let Some(head) = args.head {
        config.model.head_path = head;
    }
    config.validate()?;
    let device = parse_candle_device(&args.device)?;

    let preprocessor = ImagePreprocessor::from_config(&config.model.preprocess);
    info!(
        "Loading MobileNet model from: {} + {}",
        config.model.backbone_path.display(),
        config.model.head_path.display()
    );
    let classifier = match MobileNetClassifier::load(&config.model, device) {
        Ok(model) => {
            info!("MobileNet model loaded successfully");
            TireClassifier::new(preprocessor, Arc::new(model))
        }
        Err(e) => {
            error!("Error loading MobileNet model: {e}");
            TireClassifier::unloaded(preprocessor)
        }
    };

    server::run(&config.server, AppState::new(classifier)).await
}
