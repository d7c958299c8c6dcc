// ============================================================
// Layer 5 — Metric Computation
// ============================================================
// Pure functions from prediction/label tensors to scalar scores,
// plus the per-epoch validation accumulator.
//
//   binary_f1           → (f1, precision, recall) at a threshold
//   multiclass_accuracy → fraction of frames where argmax == label
//
// Degenerate counts score 0, never NaN:
//   precision = TP / (TP + FP)     0 when nothing predicted positive
//   recall    = TP / (TP + FN)     0 when nothing labelled positive
//   f1        = 2PR / (P + R)      0 when P + R = 0

use burn::prelude::*;

use crate::domain::error::{TrainingError, TrainingResult};

/// Labels at or above this value count as positive (mixup makes them soft).
pub const LABEL_POSITIVE: f64 = 0.5;

/// Decision threshold for predictions in every logged F1 score.
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BinaryScores {
    pub f1:        f64,
    pub precision: f64,
    pub recall:    f64,
}

impl BinaryScores {
    pub fn from_counts(true_pos: usize, false_pos: usize, false_neg: usize) -> Self {
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let precision = ratio(true_pos, true_pos + false_pos);
        let recall    = ratio(true_pos, true_pos + false_neg);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self { f1, precision, recall }
    }
}

fn count<B: Backend, const D: usize>(mask: Tensor<B, D>) -> usize {
    mask.sum().into_scalar().elem::<f64>().round() as usize
}

/// Elementwise binary scores. A prediction is positive when it exceeds
/// `threshold`; a label is positive at `LABEL_POSITIVE` or above.
pub fn binary_f1<B: Backend, const D: usize>(
    predictions: Tensor<B, D>,
    labels:      Tensor<B, D>,
    threshold:   f64,
) -> BinaryScores {
    let predicted = predictions.greater_elem(threshold).float();
    let actual    = labels.greater_equal_elem(LABEL_POSITIVE).float();

    let true_pos       = count(predicted.clone() * actual.clone());
    let predicted_pos  = count(predicted);
    let actual_pos     = count(actual);

    BinaryScores::from_counts(true_pos, predicted_pos - true_pos, actual_pos - true_pos)
}

/// Fraction of frames whose highest-scoring class equals the label.
/// `scores` is class-first `[B, C, T]`; `labels` is `[B, T]`.
pub fn multiclass_accuracy<B: Backend>(scores: Tensor<B, 3>, labels: Tensor<B, 2, Int>) -> f64 {
    let [batch, _, time] = scores.dims();
    let total = batch * time;
    if total == 0 {
        return 0.0;
    }

    // argmax keeps the reduced axis: [B, 1, T] → [B, T]
    let predicted = scores.argmax(1).reshape([batch, time]);
    let correct   = predicted.equal(labels).int().sum().into_scalar().elem::<i64>();
    correct as f64 / total as f64
}

// ─── Validation aggregation ──────────────────────────────────────────────────
/// Per-epoch validation means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationSummary {
    pub loss:      f64,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    pub batches:   usize,
}

#[derive(Debug, Default)]
pub struct ValidationAccumulator {
    loss:      f64,
    precision: f64,
    recall:    f64,
    f1:        f64,
    batches:   usize,
}

impl ValidationAccumulator {
    pub fn add(&mut self, loss: f64, scores: BinaryScores) {
        self.loss      += loss;
        self.precision += scores.precision;
        self.recall    += scores.recall;
        self.f1        += scores.f1;
        self.batches   += 1;
    }

    /// Arithmetic mean over batches. An empty validation stream has no
    /// mean and is reported as `DegenerateMetric`.
    pub fn finish(self) -> TrainingResult<ValidationSummary> {
        if self.batches == 0 {
            return Err(TrainingError::DegenerateMetric { metric: "valid/loss", phase: "validation" });
        }
        let n = self.batches as f64;
        Ok(ValidationSummary {
            loss:      self.loss / n,
            precision: self.precision / n,
            recall:    self.recall / n,
            f1:        self.f1 / n,
            batches:   self.batches,
        })
    }
}
