//! Tire Classifier Training
//!
//! Trains the classification head on a `train`/`val`/`test` split and writes
//! the weights to the path the service loads.
//!
//! Usage:
//! ```
//! tirescan-train --data-dir split_data [--epochs 10] [--device cuda]
//! ```

use clap::Parser;
use std::path::PathBuf;
use tirescan::core::{ConfigValidator, init_tracing, load_config, parse_candle_device};
use tirescan::models::MobileNetBackbone;
use tirescan::training::Trainer;
use tirescan::utils::{PlotConfig, save_training_plots};
use tracing::info;

/// Command-line arguments for the training job
#[derive(Parser)]
#[command(name = "tirescan-train")]
#[command(about = "Fine-tunes the MobileNetV2 tire classifier head")]
struct Args {
    /// Configuration file (defaults to ./tirescan.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset root containing train/, val/ and test/
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Maximum number of epochs
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Images per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Initial learning rate
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Backbone ONNX file
    #[arg(long)]
    backbone: Option<PathBuf>,

    /// Output path of the trained head
    #[arg(long)]
    head: Option<PathBuf>,

    /// Directory for the accuracy/loss plots
    #[arg(long)]
    plots_dir: Option<PathBuf>,

    /// Device for the head: cpu, cuda, or cuda:N
    #[arg(long, default_value = "cpu")]
    device: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    let training = &mut config.training;
    if let Some(dir) = args.data_dir {
        training.data_dir = dir;
    }
    if let Some(epochs) = args.epochs {
        training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        training.batch_size = batch_size;
    }
    if let Some(lr) = args.learning_rate {
        training.learning_rate = lr;
    }
    if let Some(seed) = args.seed {
        training.seed = seed;
    }
    if let Some(dir) = args.plots_dir {
        training.plots_dir = dir;
    }
    if let Some(backbone) = args.backbone {
        config.model.backbone_path = backbone;
    }
    if let Some(head) = args.head {
        config.model.head_path = head;
    }
    config.validate()?;
    let device = parse_candle_device(&args.device)?;

    info!("Loading backbone from {}", config.model.backbone_path.display());
    let backbone = MobileNetBackbone::load(
        &config.model.backbone_path,
        config.model.input_name.as_deref(),
        config.model.output_name.as_deref(),
        config.model.session_pool_size,
        config.model.preprocess.layout,
        config.model.preprocess.input_size,
    )?;

    let trainer = Trainer::new(config.training.clone(), config.model.clone(), device);
    let report = trainer.run(&backbone)?;

    let plot_config = PlotConfig::from_optional_path(config.training.plot_font_path.as_deref());
    save_training_plots(&report.history, &config.training.plots_dir, &plot_config)?;

    info!(
        epochs = report.history.epochs(),
        best_epoch = report.best_epoch.map(|e| e + 1),
        test_accuracy = report.test_accuracy,
        "training finished"
    );
    Ok(())
}
