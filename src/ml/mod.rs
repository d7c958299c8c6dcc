// ============================================================
// Layer 5 — ML Layer (Burn)
// ============================================================
// Everything that touches tensors, autodiff, and optimizers.
//
//   model.rs    → Detector contract + RNN / CNN reference models
//                 (shared backbone, leitmotif head, two `mlp`
//                 auxiliary heads for singing and version)
//
//   loss.rs     → BCE / class-first CE and the composed loss
//                 with the ramped adversarial term
//
//   metrics.rs  → Binary F1, multi-class accuracy, validation
//                 averaging
//
//   schedule.rs → Linear ramp for the adversarial loss weight
//
//   grouping.rs → auxiliary / backbone parameter groups,
//                 freezing, global-norm clipping, grouped Adam
//
//   trainer.rs  → The orchestrator: epoch loop, head
//                 pretraining, resume, checkpoint cadence
//
// Reference: Burn Book §5 (Training)
//            Kingma & Ba (2015) Adam

/// Detector contract and reference architectures
pub mod model;

/// Loss functions and loss composition
pub mod loss;

/// Scalar metrics from prediction tensors
pub mod metrics;

/// Adversarial ramp schedule
pub mod schedule;

/// Parameter groups, freezing, clipping, grouped optimizer
pub mod grouping;

/// Training orchestrator
pub mod trainer;
