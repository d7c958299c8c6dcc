// ============================================================
// Layer 4 — Data Layer
// ============================================================
// Everything between feature files on disk and tensor batches:
//
//   loader       → read annotated recordings
//   segmenter    → cut them into fixed-length windows
//   dataset      → Burn Dataset over the windows, with mixup
//   splitter     → train/valid subsets by version or act
//   batcher      → stack samples into device tensors
//   epoch_loader → one restartable pass of batches per epoch

pub mod loader;

pub mod segmenter;

pub mod dataset;

pub mod splitter;

pub mod batcher;

pub mod epoch_loader;
