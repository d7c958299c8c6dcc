// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// A run is fully described by one RunConfig, resolved once before
// anything else happens:
//
//   RunConfig::default()
//     └── overlaid by --config <file.json>   (serde, every field optional)
//           └── overlaid by individual CLI flags
//                 └── validate()  → Configuration error, or a run
//
// The split into run settings and a `hyperparams` section follows
// the usual experiment layout: the former says what to run and
// where, the latter how to optimise it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::data::splitter::SplitLists;
use crate::domain::error::{TrainingError, TrainingResult};
use crate::domain::selector::{ModelKind, SplitMethod};

// ─── Hyperparameters ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparams {
    pub num_epochs:        usize,
    pub lr:                f64,
    /// Add the ramped version (and singing) loss to the primary loss
    pub train_adv:         bool,
    /// Adversarial steps until the ramp reaches full weight
    pub adv_grad_iter:     usize,
    /// Learning-rate factor for the auxiliary `mlp` heads
    pub adv_lr_multiplier: f64,
    pub mixup_prob:        f64,
    /// Beta(α, α) parameter for the mixup weight
    pub mixup_alpha:       f64,
    pub hidden_size:       usize,
    pub num_layers:        usize,
    /// Width of the auxiliary heads; `None` uses the architecture default
    pub mlp_hidden_size:   Option<usize>,
    /// Epochs of head-only pretraining before the main loop (0 = skip)
    pub pretrain_heads_epochs: usize,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            num_epochs:        10,
            lr:                1e-3,
            train_adv:         false,
            adv_grad_iter:     1000,
            adv_lr_multiplier: 1.0,
            mixup_prob:        0.0,
            mixup_alpha:       0.2,
            hidden_size:       128,
            num_layers:        2,
            mlp_hidden_size:   None,
            pretrain_heads_epochs: 0,
        }
    }
}

// ─── RunConfig ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub run_name:        String,
    pub model:           ModelKind,
    pub split:           SplitMethod,
    pub random_seed:     u64,
    pub log_metrics:     bool,
    /// Checkpoint to resume from
    pub load_checkpoint: Option<PathBuf>,
    /// Include the singing-presence loss in the adversarial term
    pub train_singing:   bool,

    pub data_dir:        PathBuf,
    pub checkpoint_dir:  PathBuf,
    pub metrics_dir:     PathBuf,

    pub batch_size:      usize,
    /// DataLoader worker threads (0 = load on the training thread)
    pub num_workers:     usize,
    pub segment_frames:  usize,
    pub segment_hop:     usize,

    pub train_versions:  Vec<String>,
    pub valid_versions:  Vec<String>,
    pub train_acts:      Vec<String>,
    pub valid_acts:      Vec<String>,

    pub hyperparams:     Hyperparams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_name:        "baseline".to_string(),
            model:           ModelKind::Cnn,
            split:           SplitMethod::Version,
            random_seed:     42,
            log_metrics:     true,
            load_checkpoint: None,
            train_singing:   false,
            data_dir:        PathBuf::from("data/features"),
            checkpoint_dir:  PathBuf::from("checkpoints"),
            metrics_dir:     PathBuf::from("metrics"),
            batch_size:      32,
            num_workers:     1,
            segment_frames:  256,
            segment_hop:     128,
            train_versions:  Vec::new(),
            valid_versions:  Vec::new(),
            train_acts:      Vec::new(),
            valid_acts:      Vec::new(),
            hyperparams:     Hyperparams::default(),
        }
    }
}

impl RunConfig {
    /// Read a JSON config file. Missing fields keep their defaults; a
    /// file that does not describe a run (unknown model kind or split
    /// method included) is a configuration error.
    pub fn load(path: &Path) -> TrainingResult<Self> {
        let json = fs::read_to_string(path).map_err(|err| {
            TrainingError::config(format!("cannot read config '{}': {err}", path.display()))
        })?;
        serde_json::from_str(&json).map_err(|err| {
            TrainingError::config(format!("invalid config '{}': {err}", path.display()))
        })
    }

    /// The id lists for the configured split method.
    pub fn split_lists(&self) -> SplitLists<'_> {
        match self.split {
            SplitMethod::Version => SplitLists { train: &self.train_versions, valid: &self.valid_versions },
            SplitMethod::Act     => SplitLists { train: &self.train_acts, valid: &self.valid_acts },
        }
    }

    /// Reject any setting the run could not start with.
    pub fn validate(&self) -> TrainingResult<()> {
        let h = &self.hyperparams;
        let fail = |msg: String| Err(TrainingError::config(msg));

        if self.run_name.is_empty() || self.run_name.contains(['/', '\\']) {
            return fail(format!("run_name '{}' must be a non-empty file name", self.run_name));
        }
        if self.batch_size == 0 {
            return fail("batch_size must be positive".into());
        }
        if self.segment_frames == 0 || self.segment_hop == 0 {
            return fail("segment_frames and segment_hop must be positive".into());
        }
        if h.num_epochs == 0 {
            return fail("num_epochs must be positive".into());
        }
        if !(h.lr.is_finite() && h.lr > 0.0) {
            return fail(format!("lr must be positive, got {}", h.lr));
        }
        if !(h.adv_lr_multiplier.is_finite() && h.adv_lr_multiplier > 0.0) {
            return fail(format!("adv_lr_multiplier must be positive, got {}", h.adv_lr_multiplier));
        }
        if !(0.0..=1.0).contains(&h.mixup_prob) {
            return fail(format!("mixup_prob must lie in [0, 1], got {}", h.mixup_prob));
        }
        if !(h.mixup_alpha.is_finite() && h.mixup_alpha > 0.0) {
            return fail(format!("mixup_alpha must be positive, got {}", h.mixup_alpha));
        }
        if h.hidden_size == 0 || h.num_layers == 0 || h.mlp_hidden_size == Some(0) {
            return fail("hidden_size, num_layers and mlp_hidden_size must be positive".into());
        }

        let lists = self.split_lists();
        if lists.train.is_empty() || lists.valid.is_empty() {
            return fail(format!("split by {} needs non-empty train and valid id lists", self.split));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RunConfig {
        RunConfig {
            train_versions: vec!["Ba1966".into()],
            valid_versions: vec!["Ka1992".into()],
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "run_name": "adv",
            "model": "RNN",
            "split": "act",
            "train_acts": ["A", "B"],
            "valid_acts": ["C"],
            "hyperparams": { "train_adv": true, "adv_grad_iter": 100 }
        }"#;
        let cfg: RunConfig = serde_json::from_str(json).unwrap();

        assert_eq!(cfg.model, ModelKind::Rnn);
        assert_eq!(cfg.split, SplitMethod::Act);
        assert!(cfg.hyperparams.train_adv);
        assert_eq!(cfg.hyperparams.adv_grad_iter, 100);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.num_workers, 1);
        assert_eq!(cfg.hyperparams.mlp_hidden_size, None);
        assert_eq!(cfg.split_lists().valid, ["C".to_string()]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unknown_selectors_in_a_file_are_configuration_errors() {
        let dir = tempfile::tempdir().unwrap();
        for (name, json, bad) in [
            ("model.json", r#"{ "model": "GRU" }"#, "GRU"),
            ("split.json", r#"{ "split": "singer" }"#, "singer"),
        ] {
            let path = dir.path().join(name);
            fs::write(&path, json).unwrap();

            match RunConfig::load(&path) {
                Err(TrainingError::Configuration(msg)) => assert!(msg.contains(bad), "{msg}"),
                other => panic!("{name}: expected a configuration error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_malformed_config_file_is_a_configuration_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ \"run_name\": ").unwrap();
        assert!(matches!(RunConfig::load(&path), Err(TrainingError::Configuration(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{ "run_name": "from-file", "batch_size": 4 }"#).unwrap();

        let cfg = RunConfig::load(&path).unwrap();
        assert_eq!(cfg.run_name, "from-file");
        assert_eq!(cfg.batch_size, 4);

        let missing = RunConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, TrainingError::Configuration(_)));
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        assert!(valid_config().validate().is_ok());

        let cases: Vec<fn(&mut RunConfig)> = vec![
            |c| c.batch_size = 0,
            |c| c.hyperparams.num_epochs = 0,
            |c| c.hyperparams.lr = 0.0,
            |c| c.hyperparams.lr = f64::NAN,
            |c| c.hyperparams.mixup_prob = 1.5,
            |c| c.hyperparams.mixup_alpha = 0.0,
            |c| c.hyperparams.mlp_hidden_size = Some(0),
            |c| c.segment_hop = 0,
            |c| c.run_name = "a/b".into(),
            |c| c.valid_versions.clear(),
            |c| c.split = SplitMethod::Act,
        ];
        for (i, mutate) in cases.into_iter().enumerate() {
            let mut cfg = valid_config();
            mutate(&mut cfg);
            assert!(
                matches!(cfg.validate(), Err(TrainingError::Configuration(_))),
                "case {i} should be rejected"
            );
        }
    }
}
