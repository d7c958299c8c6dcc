// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence the training core writes to but does not own:
//
//   checkpoint.rs → One immutable {epoch, model, optimizer}
//                   artifact per (model kind, run, epoch),
//                   written atomically with Burn's recorder.
//
//   metrics.rs    → MetricsSink implementations: a JSON-lines
//                   file per run, or a no-op when logging is off.

/// Checkpoint save / load / list
pub mod checkpoint;

/// Metric log sinks
pub mod metrics;
