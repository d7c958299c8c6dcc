// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the training core can report. None of these are
// retried: configuration and checkpoint problems stop the run
// before the first epoch, everything else halts it where it
// happens. Recovery is resuming from the last checkpoint.

use std::path::PathBuf;

use thiserror::Error;

pub type TrainingResult<T> = Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    /// Invalid run configuration (unknown split method, unknown model kind,
    /// out-of-range hyperparameter). Raised before the loop starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("checkpoint not found at '{}'", .0.display())]
    CheckpointNotFound(PathBuf),

    #[error("checkpoint at '{}' is unreadable: {reason}", path.display())]
    CheckpointCorrupt { path: PathBuf, reason: String },

    /// Checkpoints are immutable; a second write for the same
    /// (model kind, run, epoch) triple is refused.
    #[error("checkpoint already exists at '{}'", .0.display())]
    CheckpointExists(PathBuf),

    /// A mean over zero elements was requested.
    #[error("cannot average {metric}: {phase} produced no batches")]
    DegenerateMetric {
        metric: &'static str,
        phase: &'static str,
    },

    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl TrainingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_metric_message_names_phase() {
        let err = TrainingError::DegenerateMetric {
            metric: "valid/loss",
            phase:  "validation",
        };
        let msg = err.to_string();
        assert!(msg.contains("valid/loss"));
        assert!(msg.contains("validation"));
    }

    #[test]
    fn test_checkpoint_not_found_shows_path() {
        let err = TrainingError::CheckpointNotFound(PathBuf::from("checkpoints/CNN/run_epoch3.mpk"));
        assert!(err.to_string().contains("run_epoch3.mpk"));
    }
}
