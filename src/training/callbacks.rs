//! Epoch-end callbacks: early stopping and learning-rate reduction on plateau.
//!
//! Both watch the validation loss.

/// What the trainer should do after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Keep training.
    Continue,
    /// Keep training; this epoch is the best so far.
    Improved,
    /// Stop training.
    Stop,
}

/// Stops training after `patience` epochs without improvement.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    pub patience: usize,
    pub min_delta: f64,
    wait: usize,
    best: Option<f64>,
    best_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            wait: 0,
            best: None,
            best_epoch: None,
        }
    }

    /// Records the validation loss of `epoch`.
    ///
    /// A loss improves when it is lower than the best one by more than
    /// `min_delta`. The first epoch always improves.
    pub fn on_epoch_end(&mut self, epoch: usize, loss: f64) -> CallbackAction {
        let improved = match self.best {
            None => !loss.is_nan(),
            Some(best) => loss - self.min_delta < best,
        };
        if improved {
            self.best = Some(loss);
            self.best_epoch = Some(epoch);
            self.wait = 0;
            return CallbackAction::Improved;
        }
        self.wait += 1;
        if self.wait >= self.patience {
            CallbackAction::Stop
        } else {
            CallbackAction::Continue
        }
    }

    /// Lowest loss seen so far.
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Epoch that produced [`EarlyStopping::best`].
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

/// Multiplies the learning rate by `factor` after `patience` epochs without
/// improvement, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    pub patience: usize,
    pub factor: f64,
    pub min_lr: f64,
    pub min_delta: f64,
    wait: usize,
    best: Option<f64>,
}

impl ReduceLrOnPlateau {
    pub fn new(patience: usize, factor: f64, min_lr: f64, min_delta: f64) -> Self {
        Self {
            patience,
            factor,
            min_lr,
            min_delta,
            wait: 0,
            best: None,
        }
    }

    /// Records the validation loss and returns the new learning rate if it
    /// should change.
    pub fn on_epoch_end(&mut self, loss: f64, current_lr: f64) -> Option<f64> {
        let improved = match self.best {
            None => !loss.is_nan(),
            Some(best) => loss < best - self.min_delta,
        };
        if improved {
            self.best = Some(loss);
            self.wait = 0;
            return None;
        }
        self.wait += 1;
        if self.wait < self.patience {
            return None;
        }
        self.wait = 0;
        if current_lr > self.min_lr {
            Some((current_lr * self.factor).max(self.min_lr))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_stopping() {
        let mut cb = EarlyStopping::new(3, 0.0);
        assert_eq!(cb.on_epoch_end(0, 0.5), CallbackAction::Improved);
        assert_eq!(cb.on_epoch_end(1, 0.4), CallbackAction::Improved);
        assert_eq!(cb.on_epoch_end(2, 0.4), CallbackAction::Continue); // equal is no improvement
        assert_eq!(cb.on_epoch_end(3, 0.45), CallbackAction::Continue);
        assert_eq!(cb.on_epoch_end(4, 0.41), CallbackAction::Stop);
        assert_eq!(cb.best(), Some(0.4));
        assert_eq!(cb.best_epoch(), Some(1));
    }

    #[test]
    fn test_early_stopping_resets_on_improvement() {
        let mut cb = EarlyStopping::new(2, 0.0);
        cb.on_epoch_end(0, 1.0);
        assert_eq!(cb.on_epoch_end(1, 1.1), CallbackAction::Continue);
        assert_eq!(cb.on_epoch_end(2, 0.9), CallbackAction::Improved);
        assert_eq!(cb.on_epoch_end(3, 0.95), CallbackAction::Continue);
        assert_eq!(cb.on_epoch_end(4, 0.95), CallbackAction::Stop);
    }

    #[test]
    fn test_reduce_lr_halves_after_patience() {
        let mut cb = ReduceLrOnPlateau::new(2, 0.5, 1e-6, 1e-4);
        assert_eq!(cb.on_epoch_end(0.5, 1e-4), None);
        assert_eq!(cb.on_epoch_end(0.49995, 1e-4), None); // below min_delta
        assert_eq!(cb.on_epoch_end(0.5, 1e-4), Some(5e-5));
        assert_eq!(cb.on_epoch_end(0.5, 5e-5), None);
        assert_eq!(cb.on_epoch_end(0.5, 5e-5), Some(2.5e-5));
    }

    #[test]
    fn test_reduce_lr_respects_floor() {
        let mut cb = ReduceLrOnPlateau::new(1, 0.5, 1e-6, 0.0);
        cb.on_epoch_end(1.0, 1.5e-6);
        assert_eq!(cb.on_epoch_end(1.0, 1.5e-6), Some(1e-6));
        assert_eq!(cb.on_epoch_end(1.0, 1e-6), None);
    }
}
