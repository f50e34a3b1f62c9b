use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::{
    metrics::{DiffMap, PixelOutcome},
    types::{ProbabilityMap, SegmentationMap},
};

/// Plasma colormap anchors at 0, 0.25, 0.5, 0.75 and 1
const PLASMA: [[u8; 3]; 5] = [
    [13, 8, 135],
    [126, 3, 168],
    [204, 71, 120],
    [248, 149, 64],
    [240, 249, 33],
];

pub const FALSE_NEGATIVE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const FALSE_POSITIVE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const TRUE_POSITIVE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const TRUE_NEGATIVE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Foreground as 255, background as 0
pub fn segmentation_to_image(map: &SegmentationMap) -> GrayImage {
    GrayImage::from_fn(map.width(), map.height(), |x, y| {
        Luma([if map.get(x, y) { 255 } else { 0 }])
    })
}

/// Probabilities scaled to 0..=255
pub fn probability_to_image(map: &ProbabilityMap) -> GrayImage {
    GrayImage::from_fn(map.width(), map.height(), |x, y| {
        Luma([(map.get(x, y).clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

/// Probabilities rendered through a plasma-style colormap
pub fn probability_to_pseudocolor(map: &ProbabilityMap) -> RgbImage {
    imageproc::map::map_colors(&probability_to_image(map), |Luma([v])| plasma(v))
}

/// False negatives red, false positives blue, true positives white
pub fn diff_to_image(map: &DiffMap) -> RgbImage {
    RgbImage::from_fn(map.width(), map.height(), |x, y| match map.get(x, y) {
        PixelOutcome::TruePositive => TRUE_POSITIVE_COLOR,
        PixelOutcome::TrueNegative => TRUE_NEGATIVE_COLOR,
        PixelOutcome::FalsePositive => FALSE_POSITIVE_COLOR,
        PixelOutcome::FalseNegative => FALSE_NEGATIVE_COLOR,
    })
}

fn plasma(level: u8) -> Rgb<u8> {
    let position = level as f32 / 255.0 * (PLASMA.len() - 1) as f32;
    let lower = (position.floor() as usize).min(PLASMA.len() - 2);
    let t = position - lower as f32;
    let (a, b) = (PLASMA[lower], PLASMA[lower + 1]);
    let lerp = |i: usize| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    Rgb([lerp(0), lerp(1), lerp(2)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metrics::diff_map, types::Grid};

    #[test]
    fn test_segmentation_levels() {
        let map = Grid::from_vec(2, 1, vec![false, true]).unwrap();
        let img = segmentation_to_image(&map);
        assert_eq!(img.into_raw(), vec![0, 255]);
    }

    #[test]
    fn test_probability_levels() {
        let map = Grid::from_vec(3, 1, vec![0.0f32, 0.5, 1.0]).unwrap();
        assert_eq!(probability_to_image(&map).into_raw(), vec![0, 128, 255]);
    }

    #[test]
    fn test_plasma_endpoints() {
        assert_eq!(plasma(0), Rgb(PLASMA[0]));
        assert_eq!(plasma(255), Rgb(PLASMA[4]));
        let map = Grid::filled(4, 4, 1.0f32);
        assert_eq!(probability_to_pseudocolor(&map).get_pixel(3, 3), &Rgb(PLASMA[4]));
    }

    #[test]
    fn test_diff_palette() {
        let seg = Grid::from_vec(4, 1, vec![true, false, true, false]).unwrap();
        let gt = Grid::from_vec(4, 1, vec![true, false, false, true]).unwrap();
        let img = diff_to_image(&diff_map(&seg, &gt).unwrap());
        assert_eq!(img.get_pixel(0, 0), &TRUE_POSITIVE_COLOR);
        assert_eq!(img.get_pixel(1, 0), &TRUE_NEGATIVE_COLOR);
        assert_eq!(img.get_pixel(2, 0), &FALSE_POSITIVE_COLOR);
        assert_eq!(img.get_pixel(3, 0), &FALSE_NEGATIVE_COLOR);
    }
}
