use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    types::{Grid, GroundTruthMap, SegmentationMap},
};

/// Per-pixel tally of prediction against ground truth.
///
/// The four counts always sum to the pixel count of the compared maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ConfusionCounts {
    pub true_positive: u64,
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
}

impl ConfusionCounts {
    /// Count outcomes of `segmentation` against `ground_truth`
    pub fn from_maps(segmentation: &SegmentationMap, ground_truth: &GroundTruthMap) -> Result<Self> {
        segmentation.ensure_same_shape(ground_truth, "ground truth")?;

        let mut counts = Self::default();
        for (&predicted, &actual) in segmentation.iter().zip(ground_truth.iter()) {
            match PixelOutcome::classify(predicted, actual) {
                PixelOutcome::TruePositive => counts.true_positive += 1,
                PixelOutcome::TrueNegative => counts.true_negative += 1,
                PixelOutcome::FalsePositive => counts.false_positive += 1,
                PixelOutcome::FalseNegative => counts.false_negative += 1,
            }
        }
        Ok(counts)
    }

    pub fn total(&self) -> u64 {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }

    /// Counts with foreground and background swapped
    pub fn complement(&self) -> Self {
        Self {
            true_positive: self.true_negative,
            true_negative: self.true_positive,
            false_positive: self.false_negative,
            false_negative: self.false_positive,
        }
    }
}

/// Outcome of a single pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelOutcome {
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
}

impl PixelOutcome {
    pub fn classify(predicted: bool, actual: bool) -> Self {
        match (predicted, actual) {
            (true, true) => Self::TruePositive,
            (false, false) => Self::TrueNegative,
            (true, false) => Self::FalsePositive,
            (false, true) => Self::FalseNegative,
        }
    }
}

/// Per-pixel outcomes of one prediction
pub type DiffMap = Grid<PixelOutcome>;

pub fn diff_map(segmentation: &SegmentationMap, ground_truth: &GroundTruthMap) -> Result<DiffMap> {
    segmentation.ensure_same_shape(ground_truth, "ground truth")?;
    Ok(Grid::from_fn(segmentation.width(), segmentation.height(), |x, y| {
        PixelOutcome::classify(segmentation.get(x, y), ground_truth.get(x, y))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentationError;
    use proptest::prelude::*;

    fn checkerboard(width: u32, height: u32, phase: u32) -> Grid<bool> {
        Grid::from_fn(width, height, |x, y| (x + y + phase) % 2 == 0)
    }

    #[test]
    fn test_counts_sum_to_pixel_count() {
        let seg = checkerboard(13, 7, 0);
        let gt = Grid::from_fn(13, 7, |x, _| x < 5);
        let counts = ConfusionCounts::from_maps(&seg, &gt).unwrap();
        assert_eq!(counts.total(), 13 * 7);
    }

    #[test]
    fn test_known_counts() {
        let seg = Grid::from_vec(4, 1, vec![true, true, false, false]).unwrap();
        let gt = Grid::from_vec(4, 1, vec![true, false, true, false]).unwrap();
        let counts = ConfusionCounts::from_maps(&seg, &gt).unwrap();
        assert_eq!(
            counts,
            ConfusionCounts {
                true_positive: 1,
                true_negative: 1,
                false_positive: 1,
                false_negative: 1,
            }
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let seg = checkerboard(4, 4, 0);
        let gt = checkerboard(4, 5, 0);
        assert!(matches!(
            ConfusionCounts::from_maps(&seg, &gt),
            Err(SegmentationError::ShapeMismatch { .. })
        ));
        assert!(diff_map(&seg, &gt).is_err());
    }

    #[test]
    fn test_complement_swaps_roles() {
        let counts = ConfusionCounts {
            true_positive: 1,
            true_negative: 2,
            false_positive: 3,
            false_negative: 4,
        };
        let bg = counts.complement();
        assert_eq!(bg.true_positive, 2);
        assert_eq!(bg.false_positive, 4);
        assert_eq!(bg.complement(), counts);
    }

    #[test]
    fn test_diff_map_agrees_with_counts() {
        let seg = checkerboard(6, 6, 0);
        let gt = checkerboard(6, 6, 1);
        let diff = diff_map(&seg, &gt).unwrap();
        let fp = diff.iter().filter(|&&o| o == PixelOutcome::FalsePositive).count() as u64;
        let counts = ConfusionCounts::from_maps(&seg, &gt).unwrap();
        assert_eq!(fp, counts.false_positive);
        assert_eq!(counts.true_positive + counts.true_negative, 0);
    }

    fn map_pair() -> impl Strategy<Value = (Grid<bool>, Grid<bool>)> {
        (1u32..40, 1u32..40).prop_flat_map(|(w, h)| {
            let cells = (w * h) as usize;
            (
                proptest::collection::vec(any::<bool>(), cells),
                proptest::collection::vec(any::<bool>(), cells),
            )
                .prop_map(move |(seg, gt)| {
                    (
                        Grid::from_vec(w, h, seg).unwrap(),
                        Grid::from_vec(w, h, gt).unwrap(),
                    )
                })
        })
    }

    proptest! {
        #[test]
        fn prop_counts_partition_every_pixel((seg, gt) in map_pair()) {
            let counts = ConfusionCounts::from_maps(&seg, &gt).unwrap();
            prop_assert_eq!(counts.total(), seg.pixel_count());
            prop_assert_eq!(counts.true_positive + counts.false_positive, seg.count_true());
            prop_assert_eq!(counts.true_positive + counts.false_negative, gt.count_true());
        }
    }
}
