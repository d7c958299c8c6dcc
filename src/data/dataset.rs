// ============================================================
// Layer 4 — Segment Dataset
// ============================================================
// Implements Burn's Dataset trait over fixed-length segments.
//
// A SegmentDataset is a view: it shares the underlying segment
// storage and the mixup switch with every subset cut from it,
// so toggling augmentation on the base set reaches the train
// and validation subsets alike.
//
// Mixup (when switched on):
//   with probability p, blend sample i with a random partner j
//   λ ~ Beta(α, α)
//   x = λ·x_i + (1-λ)·x_j          for features, leitmotifs, singing
//   version = version_i if λ ≥ 0.5, else version_j

use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use burn::data::dataset::Dataset;
use rand::Rng;
use rand_distr::{Beta, Distribution};

use crate::domain::error::{TrainingError, TrainingResult};
use crate::domain::recording::Recording;

// ─── SegmentSample ────────────────────────────────────────────────────────────
/// One fixed-length window of a recording, flattened row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSample {
    /// frames × bins
    pub features: Vec<f32>,
    /// frames × motifs
    pub leitmotifs: Vec<f32>,
    /// frames
    pub singing: Vec<f32>,
    /// Dense class index of `version`
    pub version_index: usize,
    pub version: String,
    pub act: String,
    pub frames: usize,
    pub bins: usize,
    pub motifs: usize,
}

impl SegmentSample {
    fn blend(&self, other: &SegmentSample, lambda: f32) -> SegmentSample {
        let mix = |a: &[f32], b: &[f32]| -> Vec<f32> {
            a.iter().zip(b).map(|(x, y)| lambda * x + (1.0 - lambda) * y).collect()
        };
        let dominant = if lambda >= 0.5 { self } else { other };
        SegmentSample {
            features:      mix(&self.features, &other.features),
            leitmotifs:    mix(&self.leitmotifs, &other.leitmotifs),
            singing:       mix(&self.singing, &other.singing),
            version_index: dominant.version_index,
            version:       dominant.version.clone(),
            act:           dominant.act.clone(),
            ..self.clone()
        }
    }
}

// ─── VersionVocabulary ────────────────────────────────────────────────────────
/// Maps version identifiers to dense class indices, in sorted order.
#[derive(Debug, Clone, Default)]
pub struct VersionVocabulary {
    index: BTreeMap<String, usize>,
}

impl VersionVocabulary {
    pub fn from_recordings(recordings: &[Recording]) -> Self {
        let mut names: Vec<&str> = recordings.iter().map(|r| r.version.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        let index = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Self { index }
    }

    pub fn index_of(&self, version: &str) -> Option<usize> {
        self.index.get(version).copied()
    }

    /// Number of version classes the model's version head predicts.
    pub fn num_versions(&self) -> usize {
        self.index.len()
    }
}

// ─── MixupSwitch ──────────────────────────────────────────────────────────────
/// Shared on/off toggle for mixup. Changes apply to subsequent
/// `get` calls only.
#[derive(Debug, Clone, Default)]
pub struct MixupSwitch(Arc<AtomicBool>);

impl MixupSwitch {
    pub fn enable_mixup(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn disable_mixup(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── SegmentDataset ───────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SegmentDataset {
    segments: Arc<Vec<SegmentSample>>,
    /// Positions in `segments` visible through this view
    indices: Vec<usize>,
    mixup_prob: f64,
    mixup_beta: Option<Beta<f64>>,
    switch: MixupSwitch,
}

impl SegmentDataset {
    /// Build the base dataset. Mixup starts switched off.
    pub fn new(segments: Vec<SegmentSample>, mixup_prob: f64, mixup_alpha: f64) -> TrainingResult<Self> {
        if !(0.0..=1.0).contains(&mixup_prob) {
            return Err(TrainingError::config(format!(
                "mixup_prob must lie in [0, 1], got {mixup_prob}"
            )));
        }
        let mixup_beta = if mixup_prob > 0.0 {
            let beta = Beta::new(mixup_alpha, mixup_alpha).map_err(|e| {
                TrainingError::config(format!("invalid mixup_alpha {mixup_alpha}: {e}"))
            })?;
            Some(beta)
        } else {
            None
        };

        let indices = (0..segments.len()).collect();
        Ok(Self {
            segments: Arc::new(segments),
            indices,
            mixup_prob,
            mixup_beta,
            switch: MixupSwitch::default(),
        })
    }

    /// A view over the given positions of this dataset, sharing
    /// storage and the mixup switch.
    pub fn subset(&self, indices: Vec<usize>) -> Self {
        let indices = indices.into_iter().map(|i| self.indices[i]).collect();
        Self {
            indices,
            ..self.clone()
        }
    }

    pub fn mixup_switch(&self) -> MixupSwitch {
        self.switch.clone()
    }

    /// Segments visible through this view, without augmentation.
    pub fn segments(&self) -> impl Iterator<Item = &SegmentSample> + '_ {
        self.indices.iter().map(move |&i| &self.segments[i])
    }

    fn raw(&self, index: usize) -> Option<&SegmentSample> {
        self.indices.get(index).map(|&i| &self.segments[i])
    }
}

impl Dataset<SegmentSample> for SegmentDataset {
    fn get(&self, index: usize) -> Option<SegmentSample> {
        let sample = self.raw(index)?;

        let beta = match &self.mixup_beta {
            Some(beta) if self.switch.is_enabled() && self.indices.len() > 1 => beta,
            _ => return Some(sample.clone()),
        };

        let mut rng = rand::thread_rng();
        if !rng.gen_bool(self.mixup_prob) {
            return Some(sample.clone());
        }
        let partner = self.raw(rng.gen_range(0..self.indices.len()))?;
        let lambda  = beta.sample(&mut rng) as f32;
        Some(sample.blend(partner, lambda))
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample(version_index: usize, version: &str, act: &str, value: f32) -> SegmentSample {
        SegmentSample {
            features:      vec![value; 2 * 3],
            leitmotifs:    vec![value; 2 * 2],
            singing:       vec![value; 2],
            version_index,
            version:       version.into(),
            act:           act.into(),
            frames:        2,
            bins:          3,
            motifs:        2,
        }
    }

    #[test]
    fn test_get_without_mixup_returns_exact_sample() {
        let ds = SegmentDataset::new(vec![sample(0, "a", "A", 0.0), sample(1, "b", "A", 1.0)], 1.0, 0.4).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(1).unwrap().features, vec![1.0; 6]);
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_mixup_blends_when_enabled() {
        let ds = SegmentDataset::new(vec![sample(0, "a", "A", 0.0), sample(1, "b", "A", 1.0)], 1.0, 0.4).unwrap();
        ds.mixup_switch().enable_mixup();

        for _ in 0..20 {
            let mixed = ds.get(0).unwrap();
            let x = mixed.features[0];
            assert!((0.0..=1.0).contains(&x));
            // the dominant side decides the version label
            let expected = if mixed.version == "a" { 0 } else { 1 };
            assert_eq!(mixed.version_index, expected);
        }

        ds.mixup_switch().disable_mixup();
        assert_eq!(ds.get(0).unwrap().features, vec![0.0; 6]);
    }

    #[test]
    fn test_subset_shares_switch_and_remaps_indices() {
        let base = SegmentDataset::new(
            vec![sample(0, "a", "A", 0.0), sample(1, "b", "B-1", 1.0), sample(2, "c", "A", 2.0)],
            0.5,
            0.4,
        )
        .unwrap();
        let sub = base.subset(vec![2, 0]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.get(0).unwrap().version, "c");

        let nested = sub.subset(vec![1]);
        assert_eq!(nested.get(0).unwrap().version, "a");

        base.mixup_switch().enable_mixup();
        assert!(sub.mixup_switch().is_enabled());
    }

    #[test]
    fn test_invalid_mixup_settings_are_rejected() {
        assert!(SegmentDataset::new(Vec::new(), 1.5, 0.4).is_err());
        assert!(SegmentDataset::new(Vec::new(), 0.5, 0.0).is_err());
        assert!(SegmentDataset::new(Vec::new(), 0.0, 0.0).is_ok());
    }

    #[test]
    fn test_vocabulary_is_sorted_and_dense() {
        let rec = |v: &str| Recording {
            version:    v.into(),
            act:        "A".into(),
            features:   Vec::new(),
            leitmotifs: Vec::new(),
            singing:    Vec::new(),
        };
        let vocab = VersionVocabulary::from_recordings(&[rec("Sa1982"), rec("Ka1998"), rec("Sa1982")]);
        assert_eq!(vocab.num_versions(), 2);
        assert_eq!(vocab.index_of("Ka1998"), Some(0));
        assert_eq!(vocab.index_of("Sa1982"), Some(1));
        assert_eq!(vocab.index_of("Ba1996"), None);
    }
}
