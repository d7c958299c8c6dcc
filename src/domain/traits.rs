// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The collaborator contracts the training core is written
// against. The data and infra layers provide the concrete
// implementations; tests provide in-memory ones.

use std::collections::BTreeMap;

use crate::domain::error::TrainingResult;
use crate::domain::recording::Recording;

// ─── RecordingSource ──────────────────────────────────────────────────────────
/// Any component that can produce annotated recordings.
///
/// Implementations:
///   - FeatureLoader → JSON feature files in a directory
pub trait RecordingSource {
    fn load_all(&self) -> TrainingResult<Vec<Recording>>;
}

// ─── MetricsSink ──────────────────────────────────────────────────────────────
/// Scalar metrics for one log call, keyed by metric name
/// (`train/loss`, `adv/version_acc`, `valid/f1`, ...).
pub type MetricRecord = BTreeMap<String, f64>;

/// Where a log call sits on the run's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKey {
    /// Training step, from the orchestrator's global step counter
    Step(usize),
    /// End of an epoch's validation phase
    Epoch(usize),
}

/// Receives scalar metric logs from the orchestrator.
///
/// Implementations:
///   - JsonlSink → appends one JSON object per call to a file
///   - NoopSink  → logging disabled
pub trait MetricsSink {
    fn log(&mut self, metrics: &MetricRecord, key: LogKey) -> TrainingResult<()>;

    /// Whether calls to `log` have any effect. The orchestrator skips
    /// computing log-only metrics when this is false.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Flush and close the sink at the end of a run.
    fn finish(&mut self) -> TrainingResult<()> {
        Ok(())
    }
}

/// Small helper so call sites can build records inline.
pub fn metric_record<const N: usize>(entries: [(&str, f64); N]) -> MetricRecord {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
