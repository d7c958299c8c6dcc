// ============================================================
// Layer 4 — Epoch Loader
// ============================================================
// Wraps Burn's DataLoader behind the BatchSource seam the
// orchestrator consumes.
//
//   training loader   → DataLoaderBuilder.shuffle(seed + epoch)
//   validation loader → built once, dataset order
//
// Burn's loader reshuffles on every `iter()` from one RNG stream
// that starts at the build seed. Rebuilding the shuffled loader at
// each epoch ties the order to the epoch number, so a resumed run
// sees the same order for epoch N as an uninterrupted one.
//
// Samples are fetched through Dataset::get while a pass runs, so a
// mixup toggle made before `batches()` applies to that whole pass.

use std::sync::Arc;

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};

use crate::data::batcher::{BatchOutput, LeitmotifBatch, SegmentBatcher};
use crate::data::dataset::{SegmentDataset, SegmentSample};
use crate::domain::error::{TrainingError, TrainingResult};

/// A restartable, finite stream of batches. Each call to `batches`
/// starts a new pass from the beginning.
pub trait BatchSource<B: Backend> {
    fn num_batches(&self) -> usize;

    /// Position the stream at `epoch` before its pass.
    fn start_epoch(&mut self, _epoch: usize) {}

    fn batches(&self) -> Box<dyn Iterator<Item = TrainingResult<LeitmotifBatch<B>>> + '_>;
}

/// Pre-built batches, replayed in order on every pass.
#[cfg(test)]
impl<B: Backend> BatchSource<B> for Vec<LeitmotifBatch<B>> {
    fn num_batches(&self) -> usize {
        self.len()
    }

    fn batches(&self) -> Box<dyn Iterator<Item = TrainingResult<LeitmotifBatch<B>>> + '_> {
        Box::new(self.iter().cloned().map(Ok))
    }
}

// ─── EpochLoader ──────────────────────────────────────────────────────────────
pub struct EpochLoader<B: Backend> {
    dataset:     SegmentDataset,
    device:      B::Device,
    batch_size:  usize,
    num_workers: usize,
    /// Base seed for shuffling; `None` keeps dataset order
    seed:        Option<u64>,
    loader:      Arc<dyn DataLoader<B, BatchOutput<B>>>,
}

impl<B: Backend> EpochLoader<B> {
    pub fn new(
        dataset:     SegmentDataset,
        device:      B::Device,
        batch_size:  usize,
        num_workers: usize,
        seed:        Option<u64>,
    ) -> TrainingResult<Self> {
        if batch_size == 0 {
            return Err(TrainingError::config("batch_size must be positive"));
        }
        let loader = build_loader(&dataset, &device, batch_size, num_workers, seed);
        Ok(Self { dataset, device, batch_size, num_workers, seed, loader })
    }
}

fn build_loader<B: Backend>(
    dataset:     &SegmentDataset,
    device:      &B::Device,
    batch_size:  usize,
    num_workers: usize,
    seed:        Option<u64>,
) -> Arc<dyn DataLoader<B, BatchOutput<B>>> {
    let builder = DataLoaderBuilder::<B, SegmentSample, BatchOutput<B>>::new(SegmentBatcher)
        .batch_size(batch_size)
        .num_workers(num_workers)
        .set_device(device.clone());

    match seed {
        Some(seed) => builder.shuffle(seed).build(dataset.clone()),
        None       => builder.build(dataset.clone()),
    }
}

impl<B: Backend> BatchSource<B> for EpochLoader<B> {
    fn num_batches(&self) -> usize {
        self.loader.num_items().div_ceil(self.batch_size)
    }

    fn start_epoch(&mut self, epoch: usize) {
        if let Some(seed) = self.seed {
            self.loader = build_loader(
                &self.dataset,
                &self.device,
                self.batch_size,
                self.num_workers,
                Some(seed.wrapping_add(epoch as u64)),
            );
        }
    }

    fn batches(&self) -> Box<dyn Iterator<Item = TrainingResult<LeitmotifBatch<B>>> + '_> {
        Box::new(self.loader.iter().map(|batch| batch.map_err(TrainingError::MalformedBatch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::sample;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn dataset(n: usize) -> SegmentDataset {
        let samples = (0..n).map(|i| sample(i, "v", "A", i as f32)).collect();
        SegmentDataset::new(samples, 0.0, 1.0).unwrap()
    }

    fn loader(n: usize, batch_size: usize, seed: Option<u64>) -> EpochLoader<TestBackend> {
        EpochLoader::new(dataset(n), Default::default(), batch_size, 0, seed).unwrap()
    }

    /// First feature value of every sample in one pass, in yield order.
    fn pass_order(loader: &EpochLoader<TestBackend>) -> Vec<f32> {
        loader
            .batches()
            .flat_map(|batch| {
                let features = batch.unwrap().features;
                let [n, _, _] = features.dims();
                let values = features.to_data().to_vec::<f32>().unwrap();
                (0..n).map(move |i| values[i * 6]).collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_last_batch_may_be_short() {
        let loader = loader(5, 2, None);

        assert_eq!(loader.num_batches(), 3);
        let sizes: Vec<usize> = loader.batches().map(|b| b.unwrap().features.dims()[0]).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_unshuffled_order_is_stable_across_passes() {
        let mut loader = loader(4, 3, None);

        let first = pass_order(&loader);
        loader.start_epoch(5);
        assert_eq!(first, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(pass_order(&loader), first);
    }

    #[test]
    fn test_shuffled_passes_cover_every_sample() {
        let mut loader = loader(16, 5, Some(7));
        loader.start_epoch(0);

        let mut seen = pass_order(&loader);
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, (0..16).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_epoch_order_does_not_depend_on_earlier_passes() {
        // a run that went through epochs 0..3 in this process
        let mut uninterrupted = loader(16, 4, Some(7));
        let mut orders = Vec::new();
        for epoch in 0..3 {
            uninterrupted.start_epoch(epoch);
            orders.push(pass_order(&uninterrupted));
        }

        // a fresh process resuming at epoch 2
        let mut resumed = loader(16, 4, Some(7));
        resumed.start_epoch(2);
        let resumed_order = pass_order(&resumed);

        assert_eq!(resumed_order, orders[2]);
        assert_ne!(resumed_order, orders[0]);
    }

    #[test]
    fn test_malformed_batches_surface_as_errors() {
        let mut odd = sample(1, "v", "A", 1.0);
        odd.frames = 3;
        let ds = SegmentDataset::new(vec![sample(0, "v", "A", 0.0), odd], 0.0, 1.0).unwrap();
        let loader = EpochLoader::<TestBackend>::new(ds, Default::default(), 2, 0, None).unwrap();

        let results: Vec<_> = loader.batches().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(TrainingError::MalformedBatch(_))));
    }

    #[test]
    fn test_worker_thread_yields_the_same_batches() {
        let threaded = EpochLoader::<TestBackend>::new(dataset(6), Default::default(), 4, 1, None).unwrap();
        assert_eq!(pass_order(&threaded), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let result = EpochLoader::<TestBackend>::new(dataset(2), Default::default(), 0, 0, None);
        assert!(result.is_err());
    }
}
