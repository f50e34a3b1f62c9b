use crate::types::{ProbabilityMap, SegmentationMap};

pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Foreground wherever the probability is strictly above `threshold`.
///
/// A value exactly at the threshold is background.
pub fn segment(probability_map: &ProbabilityMap, threshold: f32) -> SegmentationMap {
    probability_map.map(|&p| p > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_comparison() {
        let probs = ProbabilityMap::from_vec(4, 1, vec![0.0, 0.5, 0.500_001, 1.0]).unwrap();
        let seg = segment(&probs, DEFAULT_THRESHOLD);
        assert_eq!(seg.as_slice(), &[false, false, true, true]);
    }

    #[test]
    fn test_binary_maps_are_fixed_points() {
        let probs = ProbabilityMap::from_fn(8, 8, |x, y| ((x * 7 + y * 3) % 10) as f32 / 10.0);
        let once = segment(&probs, DEFAULT_THRESHOLD);
        let twice = segment(&once.to_probabilities(), DEFAULT_THRESHOLD);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_custom_threshold() {
        let probs = ProbabilityMap::filled(3, 3, 0.3);
        assert_eq!(segment(&probs, 0.2).count_true(), 9);
        assert_eq!(segment(&probs, 0.3).count_true(), 0);
    }
}
