// ============================================================
// Layer 4 — Recording Loader
// ============================================================
// Loads annotated recordings from a directory of JSON feature
// files, one recording per file:
//
//   {
//     "version":    "Ka1998",
//     "act":        "B-1",
//     "features":   [[f32; bins]; frames],
//     "leitmotifs": [[f32; motifs]; frames],
//     "singing":    [f32; frames]
//   }
//
// The spectral features are computed upstream; this loader only
// parses and sanity-checks them. Files are read in sorted order
// so the resulting recording list is deterministic.

use std::{fs, path::{Path, PathBuf}};

use crate::domain::error::{TrainingError, TrainingResult};
use crate::domain::recording::Recording;
use crate::domain::traits::RecordingSource;

/// Loads all `.json` recordings from a given directory.
pub struct FeatureLoader {
    dir: PathBuf,
}

impl FeatureLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RecordingSource for FeatureLoader {
    fn load_all(&self) -> TrainingResult<Vec<Recording>> {
        if !self.dir.is_dir() {
            return Err(TrainingError::Dataset(format!(
                "feature directory '{}' does not exist",
                self.dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut recordings = Vec::with_capacity(paths.len());
        for path in paths {
            match load_single_recording(&path) {
                Ok(recording) => {
                    tracing::debug!(
                        "Loaded: {} ({} / {}, {} frames)",
                        path.display(),
                        recording.version,
                        recording.act,
                        recording.num_frames()
                    );
                    recordings.push(recording);
                }
                // One unreadable file does not abort the load
                Err(e) => {
                    tracing::warn!("Skipping '{}': {}", path.display(), e);
                }
            }
        }

        if recordings.is_empty() {
            return Err(TrainingError::Dataset(format!(
                "no readable recordings in '{}'",
                self.dir.display()
            )));
        }

        tracing::info!(
            "Loaded {} recordings from '{}'",
            recordings.len(),
            self.dir.display()
        );
        Ok(recordings)
    }
}

fn load_single_recording(path: &Path) -> TrainingResult<Recording> {
    let json = fs::read_to_string(path)?;
    let recording: Recording = serde_json::from_str(&json)?;

    if let Some(problem) = recording.alignment_error() {
        return Err(TrainingError::Dataset(problem));
    }
    Ok(recording)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_recording(dir: &Path, name: &str, version: &str, frames: usize) {
        let recording = Recording {
            version:    version.into(),
            act:        "A".into(),
            features:   vec![vec![0.5; 6]; frames],
            leitmotifs: vec![vec![0.0; 2]; frames],
            singing:    vec![1.0; frames],
        };
        fs::write(dir.join(name), serde_json::to_string(&recording).unwrap()).unwrap();
    }

    #[test]
    fn test_loads_json_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        write_recording(dir.path(), "b.json", "Sa1982", 8);
        write_recording(dir.path(), "a.json", "Ka1998", 4);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let recordings = FeatureLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(recordings.len(), 2);
        assert_eq!(recordings[0].version, "Ka1998");
        assert_eq!(recordings[1].num_frames(), 8);
    }

    #[test]
    fn test_skips_unreadable_and_misaligned_files() {
        let dir = tempfile::tempdir().unwrap();
        write_recording(dir.path(), "good.json", "Ka1998", 4);
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let mut bad = Recording {
            version:    "Ba1996".into(),
            act:        "A".into(),
            features:   vec![vec![0.0; 6]; 4],
            leitmotifs: vec![vec![0.0; 2]; 3],
            singing:    vec![0.0; 4],
        };
        bad.singing.push(0.0);
        fs::write(dir.path().join("bad.json"), serde_json::to_string(&bad).unwrap()).unwrap();

        let recordings = FeatureLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(recordings.len(), 1);
    }

    #[test]
    fn test_directory_without_readable_recordings_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        match FeatureLoader::new(dir.path()).load_all() {
            Err(TrainingError::Dataset(msg)) => assert!(msg.contains("no readable recordings"), "{msg}"),
            other => panic!("expected a dataset error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let err = FeatureLoader::new("/definitely/not/here").load_all().unwrap_err();
        assert!(matches!(err, TrainingError::Dataset(_)));
    }
}
