//! Epoch bookkeeping and early stopping.
//!
//! The tracker records per-epoch metrics into a `TrainingHistory`, decides
//! whether validation loss improved and tells the training loop when to
//! stop. Improvement means strictly lower validation loss than the best seen
//! so far. Training stops once `patience` consecutive epochs pass without
//! improvement.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vision_core::{EpochRecord, TrainingHistory};

/// Early-stopping state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingState {
    pub epoch: usize,
    pub best_loss: f64,
    pub best_epoch: Option<usize>,
    pub patience_counter: usize,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            epoch: 0,
            best_loss: f64::INFINITY,
            best_epoch: None,
            patience_counter: 0,
        }
    }
}

/// Records epochs and decides when to stop
pub struct Trainer {
    patience: Option<usize>,
    max_epochs: usize,
    state: TrainingState,
    history: TrainingHistory,
}

impl Trainer {
    pub fn new(max_epochs: usize, patience: Option<usize>) -> Self {
        Self {
            patience,
            max_epochs,
            state: TrainingState::default(),
            history: TrainingHistory::new(),
        }
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// Records an epoch. Returns `true` when validation loss improved.
    ///
    /// Epochs without validation metrics never count as improvements and
    /// never consume patience.
    pub fn update_epoch(&mut self, record: EpochRecord) -> bool {
        self.state.epoch = record.epoch;

        let improved = match record.val_loss {
            Some(val_loss) if val_loss < self.state.best_loss => {
                debug!(
                    "Validation loss improved from {:.4} to {:.4}",
                    self.state.best_loss, val_loss
                );
                self.state.best_loss = val_loss;
                self.state.best_epoch = Some(record.epoch);
                self.state.patience_counter = 0;
                true
            }
            Some(_) => {
                self.state.patience_counter += 1;
                debug!(
                    "No improvement. Patience: {}/{:?}",
                    self.state.patience_counter, self.patience
                );
                false
            }
            None => false,
        };

        match (record.val_loss, record.val_accuracy) {
            (Some(val_loss), Some(val_acc)) => info!(
                "Epoch {}/{}: loss={:.4}, acc={:.4}, val_loss={:.4}, val_acc={:.4}",
                record.epoch, self.max_epochs, record.train_loss, record.train_accuracy, val_loss, val_acc
            ),
            _ => info!(
                "Epoch {}/{}: loss={:.4}, acc={:.4}",
                record.epoch, self.max_epochs, record.train_loss, record.train_accuracy
            ),
        }

        self.history.push(record);
        improved
    }

    /// Check if early stopping should trigger
    pub fn should_stop(&self) -> bool {
        match self.patience {
            Some(patience) => self.state.patience_counter > 0 && self.state.patience_counter >= patience,
            None => false,
        }
    }

    /// Finalizes the history. `stopped` marks an early stop at the current epoch.
    pub fn finish(mut self, stopped: bool) -> TrainingHistory {
        self.history.best_epoch = self.state.best_epoch;
        if stopped {
            info!(
                "Early stopping at epoch {} (best epoch {:?}, val_loss {:.4})",
                self.state.epoch, self.state.best_epoch, self.state.best_loss
            );
            self.history.stopped_epoch = Some(self.state.epoch);
        }
        self.history
    }
}
