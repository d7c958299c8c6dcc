// ============================================================
// Layer 2 — CheckpointsUseCase
// ============================================================
// Lists the checkpoint artifacts one run has produced, so an
// operator can pick the file to resume from.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::domain::selector::ModelKind;
use crate::infra::checkpoint::{CheckpointStore, RunScope};

pub struct CheckpointsUseCase {
    store: CheckpointStore,
}

impl CheckpointsUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self { store: CheckpointStore::new(checkpoint_dir) }
    }

    /// `(epoch, path)` for every checkpoint of the run, oldest first.
    pub fn list(&self, model: ModelKind, run_name: &str) -> Result<Vec<(usize, PathBuf)>> {
        self.store
            .list(&RunScope::new(model, run_name))
            .with_context(|| format!("Cannot list checkpoints for {model}/{run_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lists_only_the_requested_run() {
        let dir = tempfile::tempdir().unwrap();
        let cnn = dir.path().join("CNN");
        fs::create_dir_all(&cnn).unwrap();
        for name in ["a_epoch1.mpk", "a_epoch0.mpk", "b_epoch0.mpk", "a_epoch2.json"] {
            fs::write(cnn.join(name), b"").unwrap();
        }

        let found = CheckpointsUseCase::new(dir.path()).list(ModelKind::Cnn, "a").unwrap();
        let epochs: Vec<usize> = found.iter().map(|(e, _)| *e).collect();
        assert_eq!(epochs, vec![0, 1]);
        assert!(CheckpointsUseCase::new(dir.path()).list(ModelKind::Rnn, "a").unwrap().is_empty());
    }
}
