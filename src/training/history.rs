//! Per-epoch training metrics.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tirescan_core::core::ClassifierResult;

/// Metrics of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Learning rate used during the epoch.
    pub learning_rate: f64,
}

/// Metric curves over all epochs, one entry per epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub loss: Vec<f64>,
    pub accuracy: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub val_accuracy: Vec<f64>,
    pub learning_rate: Vec<f64>,
}

impl TrainingHistory {
    pub fn push(&mut self, metrics: EpochMetrics) {
        self.loss.push(metrics.loss);
        self.accuracy.push(metrics.accuracy);
        self.val_loss.push(metrics.val_loss);
        self.val_accuracy.push(metrics.val_accuracy);
        self.learning_rate.push(metrics.learning_rate);
    }

    /// Number of completed epochs.
    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    /// Writes the history as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> ClassifierResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_save() {
        let mut history = TrainingHistory::default();
        history.push(EpochMetrics {
            loss: 0.7,
            accuracy: 0.5,
            val_loss: 0.6,
            val_accuracy: 0.55,
            learning_rate: 1e-4,
        });
        assert_eq!(history.epochs(), 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        history.save_json(&path).unwrap();
        let loaded: TrainingHistory =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, history);
    }
}
