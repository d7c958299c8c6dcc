// ============================================================
// Layer 4 — Segment Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<SegmentSample>
// into device tensors. The DataLoader calls it once per batch and
// hands over the device the loader was built for.
//
//   Input:  N samples, each `frames` long
//   Output: LeitmotifBatch
//             features   [N, frames, bins]
//             leitmotifs [N, frames, motifs]
//             singing    [N, frames]
//             versions   [N, frames]  (Int, one class index per frame)
//
// Every sample in a batch must share frames/bins/motifs, which the
// segmenter guarantees for segments cut from the same dataset. A
// batch that breaks this comes out of the loader as `Err`, since
// the DataLoader itself has no error channel.

use burn::{data::dataloader::batcher::Batcher, prelude::*, tensor::TensorData};

use crate::data::dataset::SegmentSample;
use crate::domain::error::{TrainingError, TrainingResult};

// ─── LeitmotifBatch ───────────────────────────────────────────────────────────
/// A batch ready for the model forward pass. All four tensors share the
/// same leading (batch, time) shape.
#[derive(Debug, Clone)]
pub struct LeitmotifBatch<B: Backend> {
    pub features: Tensor<B, 3>,
    pub leitmotifs: Tensor<B, 3>,
    pub singing: Tensor<B, 2>,
    pub versions: Tensor<B, 2, Int>,
}

impl<B: Backend> LeitmotifBatch<B> {
    /// Check the shared (batch, time) leading shape.
    pub fn validate(&self) -> TrainingResult<()> {
        let [n, t, _] = self.features.dims();
        let [ln, lt, _] = self.leitmotifs.dims();
        let singing = self.singing.dims();
        let versions = self.versions.dims();

        if [ln, lt] != [n, t] || singing != [n, t] || versions != [n, t] {
            return Err(TrainingError::MalformedBatch(format!(
                "leading shapes disagree: features [{n}, {t}], leitmotifs [{ln}, {lt}], \
                 singing {singing:?}, versions {versions:?}"
            )));
        }
        if n == 0 || t == 0 {
            return Err(TrainingError::MalformedBatch(format!("empty batch [{n}, {t}]")));
        }
        Ok(())
    }
}

/// What the DataLoader yields per batch. The error is the reason the
/// samples could not be stacked.
pub type BatchOutput<B> = Result<LeitmotifBatch<B>, String>;

// ─── SegmentBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Copy, Debug, Default)]
pub struct SegmentBatcher;

impl SegmentBatcher {
    pub fn stack<B: Backend>(
        &self,
        items:  Vec<SegmentSample>,
        device: &B::Device,
    ) -> TrainingResult<LeitmotifBatch<B>> {
        let first = items
            .first()
            .ok_or_else(|| TrainingError::MalformedBatch("no samples to batch".into()))?;
        let (frames, bins, motifs) = (first.frames, first.bins, first.motifs);

        if let Some(odd) = items
            .iter()
            .find(|s| (s.frames, s.bins, s.motifs) != (frames, bins, motifs))
        {
            return Err(TrainingError::MalformedBatch(format!(
                "segment {}/{} is {}x{}x{}, batch expects {frames}x{bins}x{motifs}",
                odd.version, odd.act, odd.frames, odd.bins, odd.motifs
            )));
        }

        let n = items.len();
        let mut features   = Vec::with_capacity(n * frames * bins);
        let mut leitmotifs = Vec::with_capacity(n * frames * motifs);
        let mut singing    = Vec::with_capacity(n * frames);
        let mut versions   = Vec::with_capacity(n * frames);

        for item in &items {
            features.extend_from_slice(&item.features);
            leitmotifs.extend_from_slice(&item.leitmotifs);
            singing.extend_from_slice(&item.singing);
            versions.extend(std::iter::repeat(item.version_index as i32).take(frames));
        }

        Ok(LeitmotifBatch {
            features:   Tensor::from_data(TensorData::new(features, [n, frames, bins]), device),
            leitmotifs: Tensor::from_data(TensorData::new(leitmotifs, [n, frames, motifs]), device),
            singing:    Tensor::from_data(TensorData::new(singing, [n, frames]), device),
            versions:   Tensor::from_data(TensorData::new(versions, [n, frames]), device),
        })
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<B, SegmentSample, BatchOutput<B>> for SegmentBatcher {
    fn batch(&self, items: Vec<SegmentSample>, device: &B::Device) -> BatchOutput<B> {
        self.stack(items, device).map_err(|err| match err {
            TrainingError::MalformedBatch(reason) => reason,
            other                                 => other.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::sample;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes() {
        let batch = SegmentBatcher
            .stack::<TestBackend>(vec![sample(0, "a", "A", 0.0), sample(3, "b", "A", 1.0)], &Default::default())
            .unwrap();

        assert_eq!(batch.features.dims(), [2, 2, 3]);
        assert_eq!(batch.leitmotifs.dims(), [2, 2, 2]);
        assert_eq!(batch.singing.dims(), [2, 2]);
        assert_eq!(batch.versions.dims(), [2, 2]);
        assert!(batch.validate().is_ok());

        let versions = batch.versions.to_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(versions, vec![0, 0, 3, 3]);
    }

    #[test]
    fn test_mismatched_segments_are_malformed() {
        let mut odd = sample(1, "b", "A", 1.0);
        odd.frames = 3;
        let items = vec![sample(0, "a", "A", 0.0), odd];

        let err = SegmentBatcher.stack::<TestBackend>(items.clone(), &Default::default()).unwrap_err();
        assert!(matches!(err, TrainingError::MalformedBatch(_)));

        // through the Burn trait the reason survives as text
        let output: BatchOutput<TestBackend> = Batcher::batch(&SegmentBatcher, items, &Default::default());
        assert!(output.unwrap_err().contains("batch expects 2x3x2"));
    }

    #[test]
    fn test_validate_rejects_misaligned_labels() {
        let device = Default::default();
        let batch = LeitmotifBatch::<TestBackend> {
            features:   Tensor::zeros([2, 4, 3], &device),
            leitmotifs: Tensor::zeros([2, 4, 5], &device),
            singing:    Tensor::zeros([2, 3], &device),
            versions:   Tensor::zeros([2, 4], &device),
        };
        assert!(matches!(batch.validate(), Err(TrainingError::MalformedBatch(_))));
    }

    #[test]
    fn test_empty_batch_is_malformed() {
        assert!(SegmentBatcher.stack::<TestBackend>(Vec::new(), &Default::default()).is_err());
    }
}
