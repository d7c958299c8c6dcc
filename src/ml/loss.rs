// ============================================================
// Layer 5 — Loss Composition
// ============================================================
// Three outputs, three label types:
//
//   leitmotif  sigmoid [B,T,M]  vs  multi-label [B,T,M]  → BCE
//   singing    sigmoid [B,T]    vs  binary      [B,T]    → BCE
//   version    scores  [B,T,V]  vs  class index [B,T]    → CE
//
// Cross-entropy reduces over the class axis, which must sit at
// position 1, so version scores go through `class_first` first:
//
//   [B, T, V] ──swap_dims(1, 2)──► [B, V, T]
//
// Total loss:
//   primary                         = BCE(leitmotif)
//   adversarial                     = CE(version) [+ BCE(singing)]
//   total = primary + ramp × adversarial    (adversarial training on)
//   total = primary                          (off)

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::data::batcher::LeitmotifBatch;
use crate::ml::model::ModelOutputs;

/// Probabilities are clamped into [ε, 1 − ε] before taking logs.
const BCE_EPSILON: f64 = 1e-7;

/// Mean binary cross-entropy between probabilities and (soft) labels.
pub fn binary_cross_entropy<B: Backend, const D: usize>(
    predictions: Tensor<B, D>,
    targets:     Tensor<B, D>,
) -> Tensor<B, 1> {
    let p = predictions.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);

    // y·log(p) + (1 − y)·log(1 − p)
    let positive = targets.clone() * p.clone().log();
    let negative = targets.neg().add_scalar(1.0) * p.neg().add_scalar(1.0).log();

    (positive + negative).mean().neg()
}

/// Move the class dimension of per-frame scores to position 1:
/// `[batch, time, classes]` → `[batch, classes, time]`.
pub fn class_first<B: Backend>(scores: Tensor<B, 3>) -> Tensor<B, 3> {
    scores.swap_dims(1, 2)
}

/// Mean cross-entropy of class-first scores `[B, C, T]` against
/// class indices `[B, T]`.
pub fn cross_entropy_class_first<B: Backend>(
    scores:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
) -> Tensor<B, 1> {
    let log_probs = log_softmax(scores, 1);
    let picked    = log_probs.gather(1, targets.unsqueeze_dim::<3>(1));
    picked.mean().neg()
}

// ─── Composition ─────────────────────────────────────────────────────────────
/// How the adversarial heads contribute to one training batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdversarialTerms {
    /// Ramp multiplier in [0, 1]
    pub multiplier:    f64,
    pub train_singing: bool,
}

/// Losses of the auxiliary heads alone.
#[derive(Debug, Clone)]
pub struct AuxiliaryLosses<B: Backend> {
    pub version:  Tensor<B, 1>,
    pub singing:  Option<Tensor<B, 1>>,
    /// version [+ singing]
    pub combined: Tensor<B, 1>,
}

pub fn auxiliary_loss<B: Backend>(
    outputs:       &ModelOutputs<B>,
    batch:         &LeitmotifBatch<B>,
    train_singing: bool,
) -> AuxiliaryLosses<B> {
    let version = cross_entropy_class_first(class_first(outputs.version.clone()), batch.versions.clone());
    let singing = train_singing
        .then(|| binary_cross_entropy(outputs.singing.clone(), batch.singing.clone()));

    let combined = match &singing {
        Some(singing) => version.clone() + singing.clone(),
        None          => version.clone(),
    };
    AuxiliaryLosses { version, singing, combined }
}

#[derive(Debug, Clone)]
pub struct LossBreakdown<B: Backend> {
    pub leitmotif: Tensor<B, 1>,
    /// Present only when adversarial training is on
    pub auxiliary: Option<AuxiliaryLosses<B>>,
    pub total:     Tensor<B, 1>,
}

/// Build the training loss for one batch.
pub fn compose_loss<B: Backend>(
    outputs:     &ModelOutputs<B>,
    batch:       &LeitmotifBatch<B>,
    adversarial: Option<AdversarialTerms>,
) -> LossBreakdown<B> {
    let leitmotif = binary_cross_entropy(outputs.leitmotif.clone(), batch.leitmotifs.clone());

    let Some(terms) = adversarial else {
        return LossBreakdown { total: leitmotif.clone(), leitmotif, auxiliary: None };
    };

    let auxiliary = auxiliary_loss(outputs, batch, terms.train_singing);
    let total     = leitmotif.clone() + auxiliary.combined.clone().mul_scalar(terms.multiplier);
    LossBreakdown { leitmotif, auxiliary: Some(auxiliary), total }
}

/// Scalar value of a single-element loss tensor.
pub fn scalar<B: Backend>(loss: &Tensor<B, 1>) -> f64 {
    loss.clone().into_scalar().elem::<f64>()
}
