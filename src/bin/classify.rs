//! Tire Classification CLI
//!
//! Classifies local tire images with the same model and decision rule as the
//! HTTP service.
//!
//! Usage:
//! ```
//! tirescan-classify [--head tire_classifier.safetensors] [--json] <image_paths>...
//! ```

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tirescan::TireClassifier;
use tirescan::core::{init_tracing, load_config, parse_candle_device};
use tirescan::models::MobileNetClassifier;
use tirescan::tirescan_core::processors::ImagePreprocessor;
use tracing::{error, info};

/// Command-line arguments for the classification CLI
#[derive(Parser)]
#[command(name = "tirescan-classify")]
#[command(about = "Classifies tire images as Cracked or Normal")]
struct Args {
    /// Configuration file (defaults to ./tirescan.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backbone ONNX file
    #[arg(long)]
    backbone: Option<PathBuf>,

    /// Trained head weights
    #[arg(long)]
    head: Option<PathBuf>,

    /// Device for the head: cpu, cuda, or cuda:N
    #[arg(long, default_value = "cpu")]
    device: String,

    /// Print the results as a JSON array on stdout
    #[arg(long)]
    json: bool,

    /// Image file paths to process
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(backbone) = args.backbone {
        config.model.backbone_path = backbone;
    }
    if let Some(head) = args.head {
        config.model.head_path = head;
    }
    let device = parse_candle_device(&args.device)?;

    let existing_images: Vec<&Path> = args
        .images
        .iter()
        .map(PathBuf::as_path)
        .filter(|path| {
            let exists = path.is_file();
            if !exists {
                error!("Image file not found: {}", path.display());
            }
            exists
        })
        .collect();
    if existing_images.is_empty() {
        error!("No valid image files found");
        return Err("No valid image files found".into());
    }

    let model = MobileNetClassifier::load(&config.model, device)?;
    let classifier = TireClassifier::new(
        ImagePreprocessor::from_config(&config.model.preprocess),
        Arc::new(model),
    );

    let mut results = Vec::with_capacity(existing_images.len());
    for (i, path) in existing_images.iter().enumerate() {
        let bytes = std::fs::read(path)?;
        let result = classifier.classify(&bytes)?;
        info!("{}. {}", i + 1, path.display());
        info!("   {} (confidence: {:.3})", result.condition, result.confidence);
        results.push(result);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}
