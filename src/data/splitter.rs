// ============================================================
// Layer 4 — Train / Validation Subsets
// ============================================================
// Recordings are held out as whole groups so validation measures
// generalisation to unseen performances:
//
//   split=version → hold out complete recordings (versions)
//   split=act     → hold out complete acts across all versions
//
// `subset_indices` answers the dataset's subset query; `split`
// applies it twice to produce the (train, valid) index sets.

use crate::data::dataset::SegmentDataset;
use crate::domain::error::{TrainingError, TrainingResult};
use crate::domain::selector::SplitMethod;

/// Which identifier a subset query filters on.
#[derive(Debug, Clone, Copy)]
pub enum Selector<'a> {
    Versions(&'a [String]),
    Acts(&'a [String]),
}

impl<'a> Selector<'a> {
    pub fn for_method(method: SplitMethod, ids: &'a [String]) -> Self {
        match method {
            SplitMethod::Version => Selector::Versions(ids),
            SplitMethod::Act => Selector::Acts(ids),
        }
    }
}

/// Positions of every segment whose version (or act) is listed.
pub fn subset_indices(dataset: &SegmentDataset, selector: Selector<'_>) -> Vec<usize> {
    dataset
        .segments()
        .enumerate()
        .filter(|(_, segment)| match selector {
            Selector::Versions(ids) => ids.iter().any(|id| *id == segment.version),
            Selector::Acts(ids) => ids.iter().any(|id| *id == segment.act),
        })
        .map(|(i, _)| i)
        .collect()
}

/// Identifier lists for both sides of a split.
#[derive(Debug, Clone, Copy)]
pub struct SplitLists<'a> {
    pub train: &'a [String],
    pub valid: &'a [String],
}

/// Split `dataset` into (train, valid) subsets.
///
/// Fails if either side selects no segments, since an empty
/// training or validation stream cannot produce a meaningful run.
pub fn split(
    dataset: &SegmentDataset,
    method:  SplitMethod,
    lists:   SplitLists<'_>,
) -> TrainingResult<(SegmentDataset, SegmentDataset)> {
    let train_idx = subset_indices(dataset, Selector::for_method(method, lists.train));
    let valid_idx = subset_indices(dataset, Selector::for_method(method, lists.valid));

    for (side, idx, ids) in [("train", &train_idx, lists.train), ("valid", &valid_idx, lists.valid)] {
        if idx.is_empty() {
            return Err(TrainingError::config(format!(
                "{side} split by {method} selects no segments (ids: {ids:?})"
            )));
        }
    }

    tracing::debug!(
        "Dataset split by {}: {} training, {} validation segments",
        method,
        train_idx.len(),
        valid_idx.len(),
    );

    Ok((dataset.subset(train_idx), dataset.subset(valid_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::sample;
    use burn::data::dataset::Dataset;

    fn dataset() -> SegmentDataset {
        SegmentDataset::new(
            vec![
                sample(0, "Ba1996", "A", 0.0),
                sample(1, "Ka1998", "A", 1.0),
                sample(0, "Ba1996", "B-1", 2.0),
                sample(2, "Sa1982", "B-1", 3.0),
            ],
            0.0,
            1.0,
        )
        .unwrap()
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_subset_by_version() {
        let wanted = ids(&["Ba1996"]);
        assert_eq!(subset_indices(&dataset(), Selector::Versions(&wanted)), vec![0, 2]);
    }

    #[test]
    fn test_subset_by_act() {
        let wanted = ids(&["B-1"]);
        assert_eq!(subset_indices(&dataset(), Selector::Acts(&wanted)), vec![2, 3]);
    }

    #[test]
    fn test_split_by_version_holds_out_recordings() {
        let (train_ids, valid_ids) = (ids(&["Ba1996", "Ka1998"]), ids(&["Sa1982"]));
        let (train, valid) = split(
            &dataset(),
            SplitMethod::Version,
            SplitLists { train: &train_ids, valid: &valid_ids },
        )
        .unwrap();
        assert_eq!(train.len(), 3);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid.get(0).unwrap().version, "Sa1982");
    }

    #[test]
    fn test_empty_side_is_configuration_error() {
        let (train_ids, valid_ids) = (ids(&["A"]), ids(&["C-3"]));
        let err = split(
            &dataset(),
            SplitMethod::Act,
            SplitLists { train: &train_ids, valid: &valid_ids },
        )
        .unwrap_err();
        assert!(matches!(err, TrainingError::Configuration(_)));
    }
}
