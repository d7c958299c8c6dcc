// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load feature files            (Layer 4 - data)
//   Step 2: Index versions                (Layer 4 - data)
//   Step 3: Segment into windows          (Layer 4 - data)
//   Step 4: Build dataset + split         (Layer 4 - data)
//   Step 5: Build epoch loaders           (Layer 4 - data)
//   Step 6: Build model + grouped Adam    (Layer 5 - ml)
//   Step 7: Open metrics sink             (Layer 6 - infra)
//   Step 8: Resume / pretrain heads / fit (Layer 5 - ml)
//
// The configuration is validated in `new`, so every configuration
// error surfaces before any file is read.

use anyhow::{Context, Result};
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::application::config::RunConfig;
use crate::data::{
    dataset::{SegmentDataset, SegmentSample, VersionVocabulary},
    epoch_loader::EpochLoader,
    loader::FeatureLoader,
    segmenter::Segmenter,
    splitter::split,
};
use crate::domain::{
    error::TrainingError,
    selector::ModelKind,
    traits::{MetricsSink, RecordingSource},
};
use crate::infra::{
    checkpoint::{CheckpointStore, RunScope},
    metrics::{JsonlSink, NoopSink},
};
use crate::ml::{
    grouping::build_optimizer,
    model::{CnnDetectorConfig, LeitmotifDetector, RnnDetectorConfig},
    trainer::{FitReport, Loaders, TrainingOrchestrator, TrainingSettings},
};

/// Training backend: WGPU with autodiff.
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Shapes the model is built for, read off the segmented data.
#[derive(Debug, Clone, Copy)]
struct DataShape {
    n_bins:       usize,
    num_motifs:   usize,
    num_versions: usize,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: RunConfig,
}

impl TrainUseCase {
    /// Validate `config` and wrap it in a use case.
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate().context("Invalid run configuration")?;
        Ok(Self { config })
    }

    /// Run on the default WGPU device.
    pub fn execute(&self) -> Result<FitReport> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_on::<TrainBackend>(device)
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<FitReport> {
        let cfg = &self.config;
        let h   = &cfg.hyperparams;

        // ── Step 1: Load recordings ──────────────────────────────────────────
        tracing::info!("Loading recordings from '{}'", cfg.data_dir.display());
        let recordings = FeatureLoader::new(&cfg.data_dir)
            .load_all()
            .with_context(|| format!("Cannot load recordings from '{}'", cfg.data_dir.display()))?;
        tracing::info!("Loaded {} recordings", recordings.len());

        // ── Step 2: Dense version indices (sorted identifiers) ──────────────
        let vocabulary = VersionVocabulary::from_recordings(&recordings);

        // ── Step 3: Cut recordings into fixed-length windows ────────────────
        let segmenter = Segmenter::new(cfg.segment_frames, cfg.segment_hop)?;
        let mut segments: Vec<SegmentSample> = Vec::new();
        for recording in &recordings {
            let index = vocabulary.index_of(&recording.version).ok_or_else(|| {
                TrainingError::Dataset(format!("version '{}' missing from vocabulary", recording.version))
            })?;
            segments.extend(segmenter.segment(recording, index));
        }
        let shape = {
            let first = segments.first().ok_or_else(|| {
                TrainingError::Dataset(format!(
                    "no recording is at least {} frames long",
                    cfg.segment_frames
                ))
            })?;
            DataShape { n_bins: first.bins, num_motifs: first.motifs, num_versions: vocabulary.num_versions() }
        };
        tracing::info!("Created {} segments of {} frames", segments.len(), cfg.segment_frames);

        // ── Step 4: Dataset + train / valid split ───────────────────────────
        let dataset = SegmentDataset::new(segments, h.mixup_prob, h.mixup_alpha)?;
        let (train_set, valid_set) = split(&dataset, cfg.split, cfg.split_lists())?;
        tracing::info!(
            "Split by {}: {} train, {} validation segments",
            cfg.split,
            train_set.segments().count(),
            valid_set.segments().count()
        );

        // ── Step 5: Burn DataLoaders (training shuffled, validation in order)
        // Validation runs through model.valid(), so its batches live on
        // the inner backend.
        let loaders = Loaders::<B> {
            mixup: dataset.mixup_switch(),
            train: Box::new(EpochLoader::<B>::new(
                train_set,
                device.clone(),
                cfg.batch_size,
                cfg.num_workers,
                Some(cfg.random_seed),
            )?),
            valid: Box::new(EpochLoader::<B::InnerBackend>::new(
                valid_set,
                device.clone(),
                cfg.batch_size,
                cfg.num_workers,
                None,
            )?),
        };

        // ── Step 6–8: Model-specific run ────────────────────────────────────
        match cfg.model {
            ModelKind::Rnn => {
                let model = RnnDetectorConfig::new(shape.n_bins, shape.num_motifs, shape.num_versions)
                    .with_hidden_size(h.hidden_size)
                    .with_num_layers(h.num_layers)
                    .with_mlp_hidden_size(h.mlp_hidden_size)
                    .init::<B>(&device);
                self.run(model, loaders, device)
            }
            ModelKind::Cnn => {
                let model = CnnDetectorConfig::new(shape.n_bins, shape.num_motifs, shape.num_versions)
                    .with_hidden_size(h.hidden_size)
                    .with_num_layers(h.num_layers)
                    .with_mlp_hidden_size(h.mlp_hidden_size)
                    .init::<B>(&device);
                self.run(model, loaders, device)
            }
        }
    }

    fn run<B, M>(&self, model: M, loaders: Loaders<B>, device: B::Device) -> Result<FitReport>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + LeitmotifDetector<B>,
        M::InnerModule: LeitmotifDetector<B::InnerBackend>,
    {
        let cfg = &self.config;
        let h   = &cfg.hyperparams;

        let optim = build_optimizer::<B, M>(&model, h.lr, h.adv_lr_multiplier);
        tracing::info!(
            "Model ready: {} ({} auxiliary / {} backbone tensors), lr={} aux_lr={}",
            cfg.model,
            optim.groups().auxiliary.len(),
            optim.groups().backbone.len(),
            optim.backbone_lr(),
            optim.auxiliary_lr(),
        );

        if optim.groups().auxiliary.is_empty() {
            tracing::warn!("No auxiliary `mlp` parameters found; adv_lr_multiplier has no effect");
        }

        let sink: Box<dyn MetricsSink> = if cfg.log_metrics {
            Box::new(JsonlSink::new(&cfg.metrics_dir, &cfg.run_name)?)
        } else {
            Box::new(NoopSink)
        };

        let settings = TrainingSettings {
            scope:         RunScope::new(cfg.model, cfg.run_name.clone()),
            num_epochs:    h.num_epochs,
            train_adv:     h.train_adv,
            train_singing: cfg.train_singing,
            adv_grad_iter: h.adv_grad_iter,
        };
        let store = CheckpointStore::new(&cfg.checkpoint_dir);

        let mut orchestrator = TrainingOrchestrator::new(model, optim, loaders, sink, store, settings, device);
        if let Some(path) = &cfg.load_checkpoint {
            orchestrator = orchestrator
                .resume(path)
                .with_context(|| format!("Cannot resume from '{}'", path.display()))?;
        }

        // Fail before any pretraining if this run would overwrite checkpoints
        orchestrator.ensure_fresh_epochs()?;
        orchestrator.pretrain_auxiliary_heads(h.pretrain_heads_epochs)?;

        let report = orchestrator.fit()?;
        let state  = orchestrator.state();
        tracing::info!(
            "Run '{}' stopped at epoch {} after {} training steps",
            cfg.run_name,
            state.epoch,
            state.global_step
        );
        Ok(report)
    }
}
