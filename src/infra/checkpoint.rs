// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// One immutable artifact per (model kind, run name, epoch):
//
//   {root}/
//     RNN/
//       baseline_epoch0.mpk
//       baseline_epoch1.mpk
//     CNN/
//       ...
//
// Each artifact holds {epoch, model record, optimizer record},
// serialised with Burn's named MessagePack recorder at full
// precision.
//
// Writes are atomic: the bytes go to a hidden `.partial` file in
// the same directory, are synced, and the file is renamed into
// place. A killed process leaves at most a stray partial file;
// the previous checkpoint stays authoritative.
//
// `load` deserialises onto the backend's default device and does
// not migrate anything. Moving the record onto the run's device
// is the orchestrator's job (see TrainingOrchestrator::resume).

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, PrecisionSettings, Record, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::domain::error::{TrainingError, TrainingResult};
use crate::domain::selector::ModelKind;

const EXTENSION: &str = "mpk";

type CheckpointRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

// ─── Checkpoint record ───────────────────────────────────────────────────────
/// A complete training snapshot taken at the end of an epoch.
#[derive(Debug, Clone)]
pub struct Checkpoint<MR, OR> {
    pub epoch:     usize,
    pub model:     MR,
    pub optimizer: OR,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize   = "MI: Serialize, OI: Serialize",
    deserialize = "MI: DeserializeOwned, OI: DeserializeOwned"
))]
pub struct CheckpointItem<MI, OI> {
    epoch:     usize,
    model:     MI,
    optimizer: OI,
}

impl<B, MR, OR> Record<B> for Checkpoint<MR, OR>
where
    B:  Backend,
    MR: Record<B>,
    OR: Record<B>,
{
    type Item<S: PrecisionSettings> = CheckpointItem<MR::Item<S>, OR::Item<S>>;

    fn into_item<S: PrecisionSettings>(self) -> Self::Item<S> {
        CheckpointItem {
            epoch:     self.epoch,
            model:     self.model.into_item(),
            optimizer: self.optimizer.into_item(),
        }
    }

    fn from_item<S: PrecisionSettings>(item: Self::Item<S>, device: &B::Device) -> Self {
        Checkpoint {
            epoch:     item.epoch,
            model:     MR::from_item(item.model, device),
            optimizer: OR::from_item(item.optimizer, device),
        }
    }
}

// ─── Run scope ───────────────────────────────────────────────────────────────
/// The (model kind, run name) pair a run's checkpoints are filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunScope {
    pub model_kind: ModelKind,
    pub run_name:   String,
}

impl RunScope {
    pub fn new(model_kind: ModelKind, run_name: impl Into<String>) -> Self {
        Self { model_kind, run_name: run_name.into() }
    }

    fn file_name(&self, epoch: usize) -> String {
        format!("{}_epoch{epoch}.{EXTENSION}", self.run_name)
    }

    /// Inverse of `file_name`: the epoch of one of this run's artifacts.
    fn epoch_of(&self, file_name: &str) -> Option<usize> {
        file_name
            .strip_prefix(self.run_name.as_str())?
            .strip_prefix("_epoch")?
            .strip_suffix(&format!(".{EXTENSION}"))?
            .parse()
            .ok()
    }
}

// ─── Store ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scope_dir(&self, scope: &RunScope) -> PathBuf {
        self.root.join(scope.model_kind.as_str())
    }

    pub fn path_for(&self, scope: &RunScope, epoch: usize) -> PathBuf {
        self.scope_dir(scope).join(scope.file_name(epoch))
    }

    pub fn exists(&self, scope: &RunScope, epoch: usize) -> bool {
        self.path_for(scope, epoch).exists()
    }

    /// Write a new checkpoint and return its path. Refuses to replace an
    /// existing artifact for the same epoch.
    pub fn save<B, MR, OR>(
        &self,
        scope:     &RunScope,
        epoch:     usize,
        model:     MR,
        optimizer: OR,
    ) -> TrainingResult<PathBuf>
    where
        B:  Backend,
        MR: Record<B>,
        OR: Record<B>,
    {
        let path = self.path_for(scope, epoch);
        if path.exists() {
            return Err(TrainingError::CheckpointExists(path));
        }

        let checkpoint = Checkpoint { epoch, model, optimizer };
        let bytes = Recorder::<B>::record(&CheckpointRecorder::default(), checkpoint, ())
            .map_err(|err| TrainingError::CheckpointCorrupt {
                path:   path.clone(),
                reason: format!("{err:?}"),
            })?;

        let dir = self.scope_dir(scope);
        fs::create_dir_all(&dir)?;

        let partial = dir.join(format!(".{}.partial", scope.file_name(epoch)));
        {
            let mut file = File::create(&partial)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&partial, &path)?;

        tracing::debug!("Saved checkpoint '{}' ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Read a checkpoint onto the backend's default device.
    pub fn load<B, MR, OR>(&self, path: &Path) -> TrainingResult<Checkpoint<MR, OR>>
    where
        B:  Backend,
        MR: Record<B>,
        OR: Record<B>,
    {
        if !path.is_file() {
            return Err(TrainingError::CheckpointNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;

        let device = B::Device::default();
        let checkpoint: Checkpoint<MR, OR> = Recorder::<B>::load(&CheckpointRecorder::default(), bytes, &device)
            .map_err(|err| TrainingError::CheckpointCorrupt {
                path:   path.to_path_buf(),
                reason: format!("{err:?}"),
            })?;

        tracing::debug!("Loaded checkpoint '{}' (epoch {})", path.display(), checkpoint.epoch);
        Ok(checkpoint)
    }

    /// Existing checkpoints of one run, sorted by epoch.
    pub fn list(&self, scope: &RunScope) -> TrainingResult<Vec<(usize, PathBuf)>> {
        let dir = self.scope_dir(scope);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let epoch = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| scope.epoch_of(name));
            if let Some(epoch) = epoch {
                found.push((epoch, path));
            }
        }
        found.sort_by_key(|(epoch, _)| *epoch);
        Ok(found)
    }
}
