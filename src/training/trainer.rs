//! Transfer-learning loop for the classification head.
//!
//! The backbone stays frozen: each batch is pushed through it to get the
//! feature map, and only the head's variables are handed to the optimizer.

use super::augment::Augmenter;
use super::callbacks::{CallbackAction, EarlyStopping, ReduceLrOnPlateau};
use super::dataset::{DataLoader, ImageFolder};
use super::history::{EpochMetrics, TrainingHistory};
use crate::core::{ClassifierError, ClassifierResult, ModelConfig, SimpleError, TrainingConfig};
use crate::models::FeatureExtractor;
use crate::models::head::{ClassifierHead, candle_error};
use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use std::collections::HashMap;
use std::path::PathBuf;
use tirescan_core::core::DECISION_THRESHOLD;
use tirescan_core::processors::ImagePreprocessor;
use tracing::{debug, info};

/// Epsilon of the Adam update.
const ADAM_EPSILON: f64 = 1e-7;

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub history: TrainingHistory,
    pub test_loss: f64,
    pub test_accuracy: f64,
    /// Epoch (zero-based) after which early stopping ended training.
    pub stopped_epoch: Option<usize>,
    /// Epoch (zero-based) with the lowest validation loss.
    pub best_epoch: Option<usize>,
    /// Where the head weights were written.
    pub head_path: PathBuf,
}

/// Loss and accuracy over one pass of a loader.
#[derive(Debug, Clone, Copy, Default)]
struct PassMetrics {
    loss: f64,
    accuracy: f64,
}

/// Trains the head on top of a frozen feature extractor.
pub struct Trainer {
    config: TrainingConfig,
    model: ModelConfig,
    device: Device,
}

impl Trainer {
    /// Creates a trainer.
    ///
    /// # Arguments
    ///
    /// * `config` - Dataset location and hyperparameters
    /// * `model` - Preprocessing settings and the head output path
    /// * `device` - Device that holds the head and its gradients
    pub fn new(config: TrainingConfig, model: ModelConfig, device: Device) -> Self {
        Self {
            config,
            model,
            device,
        }
    }

    /// Runs the whole job: fit, evaluate on the test partition, save the head.
    ///
    /// Plots are left to the caller, which gets the history in the report.
    ///
    /// # Errors
    ///
    /// Any failure aborts the run. The head file is only written at the end.
    pub fn run(&self, extractor: &dyn FeatureExtractor) -> ClassifierResult<TrainingReport> {
        let cfg = &self.config;
        let preprocessor = ImagePreprocessor::from_config(&self.model.preprocess);

        let train_set = ImageFolder::open_binary(cfg.train_dir())?;
        let val_set = ImageFolder::open_binary(cfg.val_dir())?;
        let test_set = ImageFolder::open_binary(cfg.test_dir())?;
        info!(
            "Found {} training, {} validation and {} test images belonging to {} classes",
            train_set.len(),
            val_set.len(),
            test_set.len(),
            train_set.classes().len()
        );

        let mut train_loader = DataLoader::new(&train_set, preprocessor.clone(), cfg.batch_size)
            .shuffled(cfg.seed)
            .with_augmenter(Augmenter::new(cfg.augmentation.clone()));
        let mut val_loader = DataLoader::new(&val_set, preprocessor.clone(), cfg.batch_size);
        let mut test_loader = DataLoader::new(&test_set, preprocessor, cfg.batch_size);

        if let Err(e) = self.device.set_seed(cfg.seed) {
            debug!("device generator not seeded: {e}");
        }

        let feature_dim = extractor.feature_dim()?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let head = ClassifierHead::new(
            feature_dim,
            cfg.hidden_units,
            cfg.dropout,
            self.model.preprocess.layout,
            vb,
        )?;
        info!(
            feature_dim,
            hidden_units = cfg.hidden_units,
            dropout = cfg.dropout,
            "built classification head"
        );

        let mut optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: cfg.learning_rate,
                weight_decay: 0.0,
                eps: ADAM_EPSILON,
                ..Default::default()
            },
        )
        .map_err(|e| candle_error("create optimizer", e))?;

        let mut early_stopping =
            EarlyStopping::new(cfg.early_stopping.patience, cfg.early_stopping.min_delta);
        let mut reduce_lr = ReduceLrOnPlateau::new(
            cfg.reduce_lr.patience,
            cfg.reduce_lr.factor,
            cfg.reduce_lr.min_lr,
            cfg.reduce_lr.min_delta,
        );

        let mut history = TrainingHistory::default();
        let mut best_weights: Option<HashMap<String, Tensor>> = None;
        let mut stopped_epoch = None;

        for epoch in 0..cfg.epochs {
            let learning_rate = optimizer.learning_rate();
            let train = self.train_epoch(&mut train_loader, extractor, &head, &mut optimizer)?;
            let val = self.evaluate(&mut val_loader, extractor, &head)?;
            history.push(EpochMetrics {
                loss: train.loss,
                accuracy: train.accuracy,
                val_loss: val.loss,
                val_accuracy: val.accuracy,
                learning_rate,
            });
            info!(
                "Epoch {}/{} - loss: {:.4} - accuracy: {:.4} - val_loss: {:.4} - val_accuracy: {:.4} - learning_rate: {:.2e}",
                epoch + 1,
                cfg.epochs,
                train.loss,
                train.accuracy,
                val.loss,
                val.accuracy,
                learning_rate
            );

            let action = early_stopping.on_epoch_end(epoch, val.loss);
            if action == CallbackAction::Improved && cfg.early_stopping.restore_best_weights {
                best_weights = Some(snapshot(&varmap)?);
            }
            if let Some(new_lr) = reduce_lr.on_epoch_end(val.loss, learning_rate) {
                optimizer.set_learning_rate(new_lr);
                info!("Epoch {}: reducing learning rate to {new_lr:.2e}", epoch + 1);
            }
            if action == CallbackAction::Stop {
                stopped_epoch = Some(epoch);
                if let Some(weights) = &best_weights {
                    if let Some(best) = early_stopping.best_epoch() {
                        info!("Restoring model weights from the end of the best epoch: {}", best + 1);
                    }
                    restore(&varmap, weights)?;
                }
                info!("Epoch {}: early stopping", epoch + 1);
                break;
            }
        }

        let test = self.evaluate(&mut test_loader, extractor, &head)?;
        info!("Test Accuracy: {:.4}", test.accuracy);
        info!("Test Loss: {:.4}", test.loss);

        let head_path = self.model.head_path.clone();
        if let Some(parent) = head_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        varmap.save(&head_path).map_err(|e| {
            ClassifierError::model_load_error(&head_path, "failed to save head weights", Some(e))
        })?;
        info!("Model saved as {}", head_path.display());

        Ok(TrainingReport {
            history,
            test_loss: test.loss,
            test_accuracy: test.accuracy,
            stopped_epoch,
            best_epoch: early_stopping.best_epoch(),
            head_path,
        })
    }

    fn train_epoch(
        &self,
        loader: &mut DataLoader<'_>,
        extractor: &dyn FeatureExtractor,
        head: &ClassifierHead,
        optimizer: &mut AdamW,
    ) -> ClassifierResult<PassMetrics> {
        let mut totals = Totals::default();
        for indices in loader.epoch_batches() {
            let batch = loader.load_batch(&indices)?;
            let features = extractor.extract(&batch.images, &self.device)?;
            let labels = self.labels(&batch.labels)?;
            let logits = head.logits(&features, true)?;
            let loss = bce_with_logits(&logits, &labels)
                .map_err(|e| candle_error("binary cross-entropy", e))?;
            optimizer
                .backward_step(&loss)
                .map_err(|e| candle_error("optimizer step", e))?;
            totals.add(&logits, &loss, &batch.labels)?;
        }
        totals.finish()
    }

    fn evaluate(
        &self,
        loader: &mut DataLoader<'_>,
        extractor: &dyn FeatureExtractor,
        head: &ClassifierHead,
    ) -> ClassifierResult<PassMetrics> {
        let mut totals = Totals::default();
        for indices in loader.epoch_batches() {
            let batch = loader.load_batch(&indices)?;
            let features = extractor.extract(&batch.images, &self.device)?;
            let labels = self.labels(&batch.labels)?;
            let logits = head.logits(&features, false)?;
            let loss = bce_with_logits(&logits, &labels)
                .map_err(|e| candle_error("binary cross-entropy", e))?;
            totals.add(&logits, &loss, &batch.labels)?;
        }
        totals.finish()
    }

    fn labels(&self, labels: &[f32]) -> ClassifierResult<Tensor> {
        Tensor::from_slice(labels, labels.len(), &self.device)
            .map_err(|e| candle_error("build label tensor", e))
    }
}

/// Sample-weighted running loss and accuracy.
#[derive(Debug, Default)]
struct Totals {
    loss_sum: f64,
    correct: usize,
    seen: usize,
}

impl Totals {
    fn add(&mut self, logits: &Tensor, loss: &Tensor, labels: &[f32]) -> ClassifierResult<()> {
        let loss = loss
            .to_scalar::<f32>()
            .map_err(|e| candle_error("read loss", e))?;
        let probs = candle_nn::ops::sigmoid(logits)
            .and_then(|p| p.to_vec1::<f32>())
            .map_err(|e| candle_error("read predictions", e))?;
        self.loss_sum += f64::from(loss) * labels.len() as f64;
        self.correct += probs
            .iter()
            .zip(labels)
            .filter(|(p, label)| f32::from(u8::from(**p > DECISION_THRESHOLD)) == **label)
            .count();
        self.seen += labels.len();
        Ok(())
    }

    fn finish(self) -> ClassifierResult<PassMetrics> {
        if self.seen == 0 {
            return Err(ClassifierError::invalid_input("cannot compute metrics over an empty dataset"));
        }
        Ok(PassMetrics {
            loss: self.loss_sum / self.seen as f64,
            accuracy: self.correct as f64 / self.seen as f64,
        })
    }
}

/// Mean binary cross-entropy on raw logits.
///
/// Uses `relu(x) - x * t + ln(1 + exp(-|x|))`, which stays finite where the
/// sigmoid saturates to exactly 0 or 1 in `f32`.
fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> candle_core::Result<Tensor> {
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    logits
        .relu()?
        .sub(&logits.mul(targets)?)?
        .add(&softplus)?
        .mean_all()
}

/// Copies the current value of every variable.
fn snapshot(varmap: &VarMap) -> ClassifierResult<HashMap<String, Tensor>> {
    let data = varmap.data().lock().map_err(|_| {
        ClassifierError::batch_processing("snapshot weights", SimpleError::new("variable map lock poisoned"))
    })?;
    data.iter()
        .map(|(name, var)| {
            var.as_tensor()
                .copy()
                .map(|t| (name.clone(), t))
                .map_err(|e| candle_error("copy weights", e))
        })
        .collect()
}

/// Writes a snapshot back into the variables.
fn restore(varmap: &VarMap, weights: &HashMap<String, Tensor>) -> ClassifierResult<()> {
    let data = varmap.data().lock().map_err(|_| {
        ClassifierError::batch_processing("restore weights", SimpleError::new("variable map lock poisoned"))
    })?;
    for (name, var) in data.iter() {
        if let Some(saved) = weights.get(name) {
            var.set(saved).map_err(|e| candle_error("restore weights", e))?;
        }
    }
    Ok(())
}
