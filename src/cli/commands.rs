// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `checkpoints`, and
// their flags.
//
// `train` starts from a JSON config file (or the defaults) and
// lets individual flags override it, so a sweep can share one
// file and vary a single setting per invocation.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::application::config::RunConfig;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a leitmotif detector
    Train(TrainArgs),

    /// List the checkpoints a run has written
    Checkpoints(CheckpointsArgs),
}

/// All arguments for the `train` command.
/// Every flag is optional and overrides the config file value.
#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// JSON run configuration; defaults are used for missing fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Name of the run (checkpoint and metrics file prefix)
    #[arg(long)]
    pub run_name: Option<String>,

    /// Detector architecture: RNN or CNN
    #[arg(long)]
    pub model: Option<String>,

    /// Train/valid split method: version or act
    #[arg(long)]
    pub split: Option<String>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory of JSON feature files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    #[arg(long)]
    pub metrics_dir: Option<PathBuf>,

    /// Resume from this checkpoint file
    #[arg(long)]
    pub load_checkpoint: Option<PathBuf>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// DataLoader worker threads
    #[arg(long)]
    pub num_workers: Option<usize>,

    #[arg(long)]
    pub epochs: Option<usize>,

    #[arg(long)]
    pub lr: Option<f64>,

    /// Enable the ramped adversarial version loss
    #[arg(long)]
    pub train_adv: bool,

    /// Add the singing-presence loss to the adversarial term
    #[arg(long)]
    pub train_singing: bool,

    /// Adversarial steps until the loss weight reaches 1
    #[arg(long)]
    pub adv_grad_iter: Option<usize>,

    /// Learning-rate factor for the auxiliary heads
    #[arg(long)]
    pub adv_lr_multiplier: Option<f64>,

    /// Head-only pretraining epochs before the main loop
    #[arg(long)]
    pub pretrain_heads_epochs: Option<usize>,

    /// Disable metric logging
    #[arg(long)]
    pub no_log: bool,
}

impl TrainArgs {
    /// Config file (or defaults) overlaid with every flag given.
    pub fn resolve(self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None       => RunConfig::default(),
        };

        if let Some(v) = self.run_name        { cfg.run_name = v; }
        if let Some(v) = self.model           { cfg.model = v.parse()?; }
        if let Some(v) = self.split           { cfg.split = v.parse()?; }
        if let Some(v) = self.seed            { cfg.random_seed = v; }
        if let Some(v) = self.data_dir        { cfg.data_dir = v; }
        if let Some(v) = self.checkpoint_dir  { cfg.checkpoint_dir = v; }
        if let Some(v) = self.metrics_dir     { cfg.metrics_dir = v; }
        if let Some(v) = self.load_checkpoint { cfg.load_checkpoint = Some(v); }
        if let Some(v) = self.batch_size      { cfg.batch_size = v; }
        if let Some(v) = self.num_workers     { cfg.num_workers = v; }

        let h = &mut cfg.hyperparams;
        if let Some(v) = self.epochs                { h.num_epochs = v; }
        if let Some(v) = self.lr                    { h.lr = v; }
        if let Some(v) = self.adv_grad_iter         { h.adv_grad_iter = v; }
        if let Some(v) = self.adv_lr_multiplier     { h.adv_lr_multiplier = v; }
        if let Some(v) = self.pretrain_heads_epochs { h.pretrain_heads_epochs = v; }
        h.train_adv |= self.train_adv;

        cfg.train_singing |= self.train_singing;
        if self.no_log {
            cfg.log_metrics = false;
        }
        Ok(cfg)
    }
}

/// All arguments for the `checkpoints` command
#[derive(Args, Debug)]
pub struct CheckpointsArgs {
    /// Detector architecture the run used: RNN or CNN
    #[arg(long)]
    pub model: String,

    #[arg(long)]
    pub run_name: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::TrainingError;
    use crate::domain::selector::{ModelKind, SplitMethod};
    use std::fs;

    #[test]
    fn test_flags_override_config_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{ "run_name": "file", "model": "CNN", "hyperparams": { "lr": 0.5 } }"#).unwrap();

        let cfg = TrainArgs {
            config:    Some(path),
            model:     Some("RNN".into()),
            split:     Some("act".into()),
            epochs:    Some(3),
            num_workers: Some(0),
            train_adv: true,
            no_log:    true,
            ..TrainArgs::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(cfg.run_name, "file");
        assert_eq!(cfg.model, ModelKind::Rnn);
        assert_eq!(cfg.split, SplitMethod::Act);
        assert_eq!(cfg.hyperparams.lr, 0.5);
        assert_eq!(cfg.hyperparams.num_epochs, 3);
        assert_eq!(cfg.num_workers, 0);
        assert!(cfg.hyperparams.train_adv);
        assert!(!cfg.log_metrics);
    }

    #[test]
    fn test_unknown_model_flag_is_a_configuration_error() {
        let err = TrainArgs { model: Some("LSTM".into()), ..TrainArgs::default() }
            .resolve()
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainingError>(), Some(TrainingError::Configuration(_))));
    }
}
