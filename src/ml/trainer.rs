// ============================================================
// Layer 5 — Training Orchestrator
// ============================================================
// Drives one training run:
//
//   Idle ─► Resuming? ─► { TrainPhase ─► ValidationPhase ─► Checkpoint } × N ─► Finished
//
// TrainPhase (mixup on, autodiff backend), per batch:
//   1. forward → ModelOutputs
//   2. loss = BCE(leitmotif)
//      + ramp(adv_step) × (CE(version) [+ BCE(singing)])   if train_adv
//   3. backward → clip global grad norm to 1.0 → grouped Adam step
//   4. log step metrics under the global step, then advance it
//
// ValidationPhase (mixup off, model.valid() on the inner backend):
//   primary loss + precision/recall/F1 per batch, averaged over
//   the epoch. Always computed; logged only when the sink is on.
//
// Checkpoint: written unconditionally after every validation.
//
// Key Burn insight (same as any Burn trainer):
//   - Training runs on B (Autodiff<..>) for gradients
//   - model.valid() yields the model on B::InnerBackend, so the
//     validation batches must already live on the inner backend
//   - Gradients come from a fresh backward pass each step; nothing
//     accumulates between steps, so there is nothing to zero

use std::path::{Path, PathBuf};

use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, Record},
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::LeitmotifBatch;
use crate::data::dataset::MixupSwitch;
use crate::data::epoch_loader::BatchSource;
use crate::domain::error::{TrainingError, TrainingResult};
use crate::domain::state::TrainingState;
use crate::domain::traits::{metric_record, LogKey, MetricRecord, MetricsSink};
use crate::infra::checkpoint::{Checkpoint, CheckpointStore, RunScope};
use crate::ml::grouping::{FrozenBackbone, GroupedOptimizer};
use crate::ml::loss::{
    auxiliary_loss, binary_cross_entropy, class_first, compose_loss, scalar, AdversarialTerms, LossBreakdown,
};
use crate::ml::metrics::{
    binary_f1, multiclass_accuracy, ValidationAccumulator, ValidationSummary, DECISION_THRESHOLD,
};
use crate::ml::model::{LeitmotifDetector, ModelOutputs};
use crate::ml::schedule::RampSchedule;

/// Run-level settings the loop consults; resolved once before training.
#[derive(Debug, Clone)]
pub struct TrainingSettings {
    pub scope:         RunScope,
    pub num_epochs:    usize,
    pub train_adv:     bool,
    pub train_singing: bool,
    pub adv_grad_iter: usize,
}

/// Batch streams for both phases plus the dataset's mixup toggle.
pub struct Loaders<B: AutodiffBackend> {
    pub train: Box<dyn BatchSource<B>>,
    pub valid: Box<dyn BatchSource<B::InnerBackend>>,
    pub mixup: MixupSwitch,
}

#[derive(Debug, Default)]
pub struct FitReport {
    pub validation:  Vec<ValidationSummary>,
    pub checkpoints: Vec<PathBuf>,
}

pub struct TrainingOrchestrator<B: AutodiffBackend, M, O> {
    model:    M,
    optim:    GroupedOptimizer<O>,
    loaders:  Loaders<B>,
    sink:     Box<dyn MetricsSink>,
    store:    CheckpointStore,
    settings: TrainingSettings,
    ramp:     RampSchedule,
    state:    TrainingState,
    device:   B::Device,
}

/// Re-materialise every tensor of `record` on `device`.
fn to_device<B: Backend, R: Record<B>>(record: R, device: &B::Device) -> R {
    R::from_item::<FullPrecisionSettings>(record.into_item::<FullPrecisionSettings>(), device)
}

impl<B, M, O> TrainingOrchestrator<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + LeitmotifDetector<B>,
    M::InnerModule: LeitmotifDetector<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    pub fn new(
        model:    M,
        optim:    GroupedOptimizer<O>,
        loaders:  Loaders<B>,
        sink:     Box<dyn MetricsSink>,
        store:    CheckpointStore,
        settings: TrainingSettings,
        device:   B::Device,
    ) -> Self {
        let ramp = RampSchedule::new(settings.adv_grad_iter);
        Self {
            model,
            optim,
            loaders,
            sink,
            store,
            settings,
            ramp,
            state: TrainingState::default(),
            device,
        }
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    // ─── Resume ──────────────────────────────────────────────────────────────
    /// Restore model and optimizer from a checkpoint and continue with the
    /// epoch after it. Step counters start again from zero.
    ///
    /// The store loads onto the default device; both records are moved
    /// onto this run's device here, optimizer moments included.
    pub fn resume(mut self, path: &Path) -> TrainingResult<Self> {
        let checkpoint: Checkpoint<M::Record, O::Record> = self.store.load::<B, _, _>(path)?;
        let checkpoint = to_device::<B, _>(checkpoint, &self.device);

        self.model = self.model.load_record(checkpoint.model);
        self.optim = self.optim.load_record::<B, M>(checkpoint.optimizer);
        self.optim.regroup::<B, M>(&self.model);
        self.state = TrainingState::resumed_after(checkpoint.epoch);

        tracing::info!(
            "Resumed from '{}' (epoch {}); continuing at epoch {}",
            path.display(),
            checkpoint.epoch,
            self.state.epoch
        );
        Ok(self)
    }

    // ─── Auxiliary head pretraining ──────────────────────────────────────────
    /// Train only the auxiliary heads against the version loss (plus the
    /// singing loss when enabled), backbone frozen throughout. The backbone
    /// is unfrozen again on every exit path, errors included.
    pub fn pretrain_auxiliary_heads(&mut self, epochs: usize) -> TrainingResult<()> {
        if epochs == 0 {
            return Ok(());
        }
        let groups    = self.optim.groups().clone();
        let mut model = FrozenBackbone::<B, M>::new(&mut self.model, &groups);
        self.loaders.mixup.enable_mixup();

        for epoch in 0..epochs {
            let mut loss_sum = 0.0;
            let mut batches  = 0usize;

            for batch in self.loaders.train.batches() {
                let batch = batch?;
                batch.validate()?;

                let outputs = model.detect(batch.features.clone());
                let losses  = auxiliary_loss(&outputs, &batch, self.settings.train_singing);
                loss_sum += scalar(&losses.combined);
                batches  += 1;

                let (updated, _norm) = self.optim.apply((*model).clone(), losses.combined);
                *model = updated;
            }

            tracing::info!(
                "Head pretraining {:>3}/{} | aux_loss={:.4}",
                epoch + 1,
                epochs,
                if batches > 0 { loss_sum / batches as f64 } else { 0.0 },
            );
        }
        Ok(())
    }

    // ─── Main loop ───────────────────────────────────────────────────────────
    pub fn fit(&mut self) -> TrainingResult<FitReport> {
        self.ensure_fresh_epochs()?;

        let mut report = FitReport::default();
        let first = self.state.epoch;
        if first >= self.settings.num_epochs {
            tracing::warn!("Nothing to train: epoch {} ≥ num_epochs {}", first, self.settings.num_epochs);
        } else {
            tracing::info!(
                "Epochs {}..{}: {} training / {} validation batches each",
                first,
                self.settings.num_epochs,
                self.loaders.train.num_batches(),
                self.loaders.valid.num_batches(),
            );
        }

        for epoch in first..self.settings.num_epochs {
            self.state.epoch = epoch;

            let train_loss = self.train_epoch()?;
            let summary    = self.validate()?;
            self.log_validation(epoch, &summary)?;
            let path = self.save_checkpoint()?;

            tracing::info!(
                "Epoch {:>3}/{} | train_loss={:.4} | valid_loss={:.4} | valid_f1={:.3}",
                epoch + 1,
                self.settings.num_epochs,
                train_loss,
                summary.loss,
                summary.f1,
            );

            report.validation.push(summary);
            report.checkpoints.push(path);
        }

        self.sink.finish()?;
        tracing::info!("Training complete!");
        Ok(report)
    }

    /// Checkpoints are immutable: refuse to start if any epoch this run
    /// is about to write already has one.
    pub fn ensure_fresh_epochs(&self) -> TrainingResult<()> {
        match (self.state.epoch..self.settings.num_epochs).find(|&e| self.store.exists(&self.settings.scope, e)) {
            Some(epoch) => Err(TrainingError::CheckpointExists(self.store.path_for(&self.settings.scope, epoch))),
            None        => Ok(()),
        }
    }

    /// One pass over the training stream. Returns the mean total loss.
    fn train_epoch(&mut self) -> TrainingResult<f64> {
        self.loaders.train.start_epoch(self.state.epoch);
        self.loaders.mixup.enable_mixup();
        let logging = self.sink.is_enabled();

        let mut loss_sum = 0.0;
        let mut batches  = 0usize;

        for batch in self.loaders.train.batches() {
            let batch = batch?;
            batch.validate()?;

            let outputs     = self.model.detect(batch.features.clone());
            let adversarial = self.settings.train_adv.then(|| AdversarialTerms {
                multiplier:    self.ramp.multiplier(self.state.adversarial_step),
                train_singing: self.settings.train_singing,
            });
            let losses = compose_loss(&outputs, &batch, adversarial);
            if adversarial.is_some() {
                self.state.adversarial_step += 1;
            }

            let record = logging.then(|| step_metrics(&outputs, &batch, &losses, adversarial));
            loss_sum += scalar(&losses.total);
            batches  += 1;

            let (model, norm) = self.optim.apply(self.model.clone(), losses.total);
            self.model = model;
            tracing::trace!("step {} grad_norm={:.4}", self.state.global_step, norm);

            if let Some(record) = record {
                self.sink.log(&record, LogKey::Step(self.state.global_step))?;
            }
            self.state.global_step += 1;
        }

        Ok(if batches > 0 { loss_sum / batches as f64 } else { 0.0 })
    }

    /// Evaluate the current model on the validation stream. Never touches
    /// parameters or step counters.
    pub fn validate(&self) -> TrainingResult<ValidationSummary> {
        self.loaders.mixup.disable_mixup();
        let model = self.model.valid();

        let mut acc = ValidationAccumulator::default();
        for batch in self.loaders.valid.batches() {
            let batch = batch?;
            batch.validate()?;

            let outputs = model.detect(batch.features);
            let loss    = binary_cross_entropy(outputs.leitmotif.clone(), batch.leitmotifs.clone());
            let scores  = binary_f1(outputs.leitmotif, batch.leitmotifs, DECISION_THRESHOLD);
            acc.add(scalar(&loss), scores);
        }
        acc.finish()
    }

    fn log_validation(&mut self, epoch: usize, summary: &ValidationSummary) -> TrainingResult<()> {
        if !self.sink.is_enabled() {
            return Ok(());
        }
        let record = metric_record([
            ("valid/loss",      summary.loss),
            ("valid/precision", summary.precision),
            ("valid/recall",    summary.recall),
            ("valid/f1",        summary.f1),
        ]);
        self.sink.log(&record, LogKey::Epoch(epoch))
    }

    fn save_checkpoint(&self) -> TrainingResult<PathBuf> {
        self.store.save::<B, _, _>(
            &self.settings.scope,
            self.state.epoch,
            self.model.clone().into_record(),
            self.optim.to_record::<B, M>(),
        )
    }
}

/// Scalars logged for one training step.
fn step_metrics<B: Backend>(
    outputs:     &ModelOutputs<B>,
    batch:       &LeitmotifBatch<B>,
    losses:      &LossBreakdown<B>,
    adversarial: Option<AdversarialTerms>,
) -> MetricRecord {
    let scores = binary_f1(outputs.leitmotif.clone(), batch.leitmotifs.clone(), DECISION_THRESHOLD);
    let mut record = metric_record([
        ("train/loss",       scalar(&losses.leitmotif)),
        ("train/precision",  scores.precision),
        ("train/recall",     scores.recall),
        ("train/f1",         scores.f1),
        ("train/total_loss", scalar(&losses.total)),
    ]);

    let (Some(terms), Some(auxiliary)) = (adversarial, &losses.auxiliary) else {
        return record;
    };
    let accuracy = multiclass_accuracy(class_first(outputs.version.clone()), batch.versions.clone());
    record.extend(metric_record([
        ("adv/loss_multiplier", terms.multiplier),
        ("adv/version_loss",    scalar(&auxiliary.version)),
        ("adv/version_acc",     accuracy),
    ]));

    if let Some(singing) = &auxiliary.singing {
        let singing_scores = binary_f1(outputs.singing.clone(), batch.singing.clone(), DECISION_THRESHOLD);
        record.extend(metric_record([
            ("adv/singing_loss",     scalar(singing)),
            ("adv/singing_train_f1", singing_scores.f1),
        ]));
    }
    record
}
