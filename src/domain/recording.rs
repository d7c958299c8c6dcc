// ============================================================
// Layer 3 — Recording Domain Type
// ============================================================
// One performance of one act, already reduced to a frame-level
// spectral representation with aligned annotations.
//
// All three sequences are indexed by frame:
//   features[t]   → spectral bins for frame t
//   leitmotifs[t] → one activation per leitmotif class
//   singing[t]    → 1.0 while a singer is audible
//
// `version` identifies the recording (conductor/year) and
// `act` identifies the part of the cycle it covers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Recording identifier, e.g. the conductor/year code
    pub version: String,

    /// Act identifier, shared across versions
    pub act: String,

    pub features: Vec<Vec<f32>>,

    pub leitmotifs: Vec<Vec<f32>>,

    pub singing: Vec<f32>,
}

impl Recording {
    /// Number of frames in the recording
    pub fn num_frames(&self) -> usize {
        self.features.len()
    }

    /// Number of spectral bins per frame (0 for an empty recording)
    pub fn num_bins(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Number of leitmotif classes per frame (0 for an empty recording)
    pub fn num_motifs(&self) -> usize {
        self.leitmotifs.first().map_or(0, Vec::len)
    }

    /// Returns a description of the first alignment problem, if any.
    ///
    /// The three frame sequences must have equal length and every
    /// frame must have the same width as the first one.
    pub fn alignment_error(&self) -> Option<String> {
        let frames = self.num_frames();
        if self.leitmotifs.len() != frames || self.singing.len() != frames {
            return Some(format!(
                "frame counts differ: features={}, leitmotifs={}, singing={}",
                frames,
                self.leitmotifs.len(),
                self.singing.len()
            ));
        }
        let (bins, motifs) = (self.num_bins(), self.num_motifs());
        if let Some(t) = self.features.iter().position(|f| f.len() != bins) {
            return Some(format!("frame {t} has {} bins, expected {bins}", self.features[t].len()));
        }
        if let Some(t) = self.leitmotifs.iter().position(|l| l.len() != motifs) {
            return Some(format!("frame {t} has {} motif labels, expected {motifs}", self.leitmotifs[t].len()));
        }
        None
    }
}
