// ============================================================
// Layer 6 — Metrics Sinks
// ============================================================
// Implementations of the MetricsSink contract.
//
//   JsonlSink → appends one JSON object per log call to
//               <metrics_dir>/<run_name>.jsonl
//   NoopSink  → logging disabled; every call is a no-op
//
// Each line carries the metrics plus exactly one of `step`
// (training logs) or `epoch` (validation summaries):
//
//   {"step":0,"train/f1":0.41,"train/loss":0.69,...}
//   {"epoch":0,"valid/f1":0.38,"valid/loss":0.71,...}
//
// Lines are appended, so a resumed run continues the same file.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde_json::{Map, Number, Value};

use crate::domain::error::TrainingResult;
use crate::domain::traits::{LogKey, MetricRecord, MetricsSink};

// ─── JsonlSink ───────────────────────────────────────────────────────────────
pub struct JsonlSink {
    path:   PathBuf,
    writer: BufWriter<File>,
    lines:  usize,
}

impl JsonlSink {
    /// Open (or create) `<dir>/<run_name>.jsonl` for appending.
    pub fn new(dir: impl AsRef<Path>, run_name: &str) -> TrainingResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = dir.join(format!("{run_name}.jsonl"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!("Logging metrics to '{}'", path.display());

        Ok(Self { path, writer: BufWriter::new(file), lines: 0 })
    }
}

fn to_json(metrics: &MetricRecord, key: LogKey) -> Value {
    let mut object = Map::new();
    match key {
        LogKey::Step(step)   => object.insert("step".into(), Value::from(step)),
        LogKey::Epoch(epoch) => object.insert("epoch".into(), Value::from(epoch)),
    };
    for (name, value) in metrics {
        // NaN / inf have no JSON form
        let value = Number::from_f64(*value).map_or(Value::Null, Value::Number);
        object.insert(name.clone(), value);
    }
    Value::Object(object)
}

impl MetricsSink for JsonlSink {
    fn log(&mut self, metrics: &MetricRecord, key: LogKey) -> TrainingResult<()> {
        serde_json::to_writer(&mut self.writer, &to_json(metrics, key))?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    fn finish(&mut self) -> TrainingResult<()> {
        self.writer.flush()?;
        tracing::info!("Wrote {} metric lines to '{}'", self.lines, self.path.display());
        Ok(())
    }
}

// ─── NoopSink ────────────────────────────────────────────────────────────────
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn log(&mut self, _metrics: &MetricRecord, _key: LogKey) -> TrainingResult<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::metric_record;

    #[test]
    fn test_jsonl_lines_carry_step_or_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::new(dir.path(), "run").unwrap();

        sink.log(&metric_record([("train/loss", 0.5)]), LogKey::Step(3)).unwrap();
        sink.log(&metric_record([("valid/f1", 0.25)]), LogKey::Epoch(1)).unwrap();
        sink.finish().unwrap();

        let text  = fs::read_to_string(dir.path().join("run.jsonl")).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["step"], 3);
        assert_eq!(lines[0]["train/loss"], 0.5);
        assert!(lines[0].get("epoch").is_none());
        assert_eq!(lines[1]["epoch"], 1);
        assert_eq!(lines[1]["valid/f1"], 0.25);
    }

    #[test]
    fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        for step in 0..2 {
            let mut sink = JsonlSink::new(dir.path(), "run").unwrap();
            sink.log(&metric_record([("train/loss", 1.0)]), LogKey::Step(step)).unwrap();
            sink.finish().unwrap();
        }
        let text = fs::read_to_string(dir.path().join("run.jsonl")).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_non_finite_values_become_null() {
        let value = to_json(&metric_record([("train/loss", f64::NAN)]), LogKey::Step(0));
        assert!(value["train/loss"].is_null());
    }

    #[test]
    fn test_noop_sink_is_disabled() {
        let mut sink = NoopSink;
        assert!(!sink.is_enabled());
        assert!(sink.log(&metric_record([("x", 1.0)]), LogKey::Epoch(0)).is_ok());
    }
}
