// ============================================================
// Layer 4 — Frame Segmenter
// ============================================================
// Cuts recordings into fixed-length windows of frames so every
// model input has the same time dimension.
//
// Sliding window with hop:
//   frames=4, hop=2, recording of 9 frames
//   window 1: 0..4
//   window 2: 2..6
//   window 3: 4..8
//   window 4: 5..9   ← aligned to the end so frame 8 is covered
//
// Recordings shorter than one window produce no segments.

use crate::data::dataset::SegmentSample;
use crate::domain::error::{TrainingError, TrainingResult};
use crate::domain::recording::Recording;

pub struct Segmenter {
    /// Frames per segment
    frames: usize,
    /// Frames advanced between consecutive segments
    hop: usize,
}

impl Segmenter {
    pub fn new(frames: usize, hop: usize) -> TrainingResult<Self> {
        if frames == 0 || hop == 0 {
            return Err(TrainingError::config(format!(
                "segment_frames ({frames}) and segment_hop ({hop}) must both be positive"
            )));
        }
        Ok(Self { frames, hop })
    }

    /// Start frame of every window for a sequence of `num_frames` frames.
    pub fn window_starts(&self, num_frames: usize) -> Vec<usize> {
        if num_frames < self.frames {
            return Vec::new();
        }
        let last = num_frames - self.frames;
        let mut starts: Vec<usize> = (0..=last).step_by(self.hop).collect();
        if starts.last() != Some(&last) {
            starts.push(last);
        }
        starts
    }

    /// Cut one recording into segments labelled with `version_index`.
    pub fn segment(&self, recording: &Recording, version_index: usize) -> Vec<SegmentSample> {
        let bins   = recording.num_bins();
        let motifs = recording.num_motifs();

        self.window_starts(recording.num_frames())
            .into_iter()
            .map(|start| {
                let window = start..start + self.frames;
                SegmentSample {
                    features:      recording.features[window.clone()].concat(),
                    leitmotifs:    recording.leitmotifs[window.clone()].concat(),
                    singing:       recording.singing[window].to_vec(),
                    version_index,
                    version:       recording.version.clone(),
                    act:           recording.act.clone(),
                    frames:        self.frames,
                    bins,
                    motifs,
                }
            })
            .collect()
    }
}
