//! Sliding-window tiling of images larger than the classifier input.
//!
//! Windows advance by `crop_size - overlap`. The last column and the last row
//! are re-anchored flush against the right/lower image edge instead of being
//! shrunk, so every window keeps the full crop size whenever the image is at
//! least that large. Near the edges this produces more overlap than elsewhere.

use image::{RgbImage, imageops};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SegmentationError},
    types::TileBox,
};

pub const DEFAULT_CROP_SIZE: u32 = 512;
/// Input size of the DeepLab export
pub const DEEPLAB_CROP_SIZE: u32 = 622;
pub const DEFAULT_OVERLAP: u32 = 50;

/// Window size and overlap for sliding-window tiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TilingConfig {
    /// Side length of the square classifier input
    #[schemars(range(min = 1))]
    pub crop_size: u32,
    /// Pixels shared by horizontally or vertically adjacent windows
    pub overlap: u32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            crop_size: DEFAULT_CROP_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl TilingConfig {
    pub fn new(crop_size: u32, overlap: u32) -> Result<Self> {
        let config = Self { crop_size, overlap };
        config.validate()?;
        Ok(config)
    }

    /// Tiling for the 622 px DeepLab model
    pub fn deeplab() -> Self {
        Self {
            crop_size: DEEPLAB_CROP_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.crop_size == 0 {
            return Err(SegmentationError::Configuration(
                "crop size must be positive".to_string(),
            ));
        }
        if self.overlap >= self.crop_size {
            return Err(SegmentationError::Configuration(format!(
                "overlap {} must be smaller than crop size {}",
                self.overlap, self.crop_size
            )));
        }
        Ok(())
    }

    /// Distance between the origins of adjacent windows
    pub fn stride(&self) -> u32 {
        self.crop_size - self.overlap
    }

    /// Number of windows along an axis of length `extent`
    pub fn windows_along(&self, extent: u32) -> u32 {
        if extent <= self.crop_size {
            1
        } else {
            1 + (extent - self.crop_size).div_ceil(self.stride())
        }
    }

    /// Windows covering a `width` x `height` image
    pub fn tiles(&self, width: u32, height: u32) -> Result<Tiles> {
        Tiles::new(width, height, *self)
    }

    /// Windows of `image` paired with the cropped pixels
    pub fn crops<'a>(&self, image: &'a RgbImage) -> Result<Crops<'a>> {
        Ok(Crops {
            image,
            tiles: self.tiles(image.width(), image.height())?,
        })
    }
}

/// Iterator over the windows covering an image, row by row.
///
/// A fresh iterator from the same config and dimensions yields the identical
/// sequence.
#[derive(Debug, Clone)]
pub struct Tiles {
    width: u32,
    height: u32,
    crop_size: u32,
    stride: u32,
    next: Option<TileBox>,
    remaining: usize,
}

impl Tiles {
    pub fn new(width: u32, height: u32, config: TilingConfig) -> Result<Self> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(SegmentationError::Configuration(format!(
                "cannot tile an empty {width}x{height} image"
            )));
        }

        let first = TileBox {
            left: 0,
            upper: 0,
            right: config.crop_size.min(width),
            lower: config.crop_size.min(height),
        };
        let remaining =
            config.windows_along(width) as usize * config.windows_along(height) as usize;

        Ok(Self {
            width,
            height,
            crop_size: config.crop_size,
            stride: config.stride(),
            next: Some(first),
            remaining,
        })
    }

    fn advance(&self, current: TileBox) -> Option<TileBox> {
        if current.right < self.width {
            let mut left = current.left + self.stride;
            let mut right = left.saturating_add(self.crop_size);
            if right > self.width {
                left = self.width - self.crop_size;
                right = self.width;
            }
            return Some(TileBox { left, right, ..current });
        }

        // Row finished; the bottom-right window ends the sequence.
        if current.lower == self.height {
            return None;
        }

        let mut upper = current.upper + self.stride;
        let mut lower = upper.saturating_add(self.crop_size);
        if lower > self.height {
            upper = self.height - self.crop_size;
            lower = self.height;
        }
        Some(TileBox {
            left: 0,
            upper,
            right: self.crop_size.min(self.width),
            lower,
        })
    }
}

impl Iterator for Tiles {
    type Item = TileBox;

    fn next(&mut self) -> Option<TileBox> {
        let current = self.next.take()?;
        self.next = self.advance(current);
        self.remaining = self.remaining.saturating_sub(1);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Tiles {}

impl std::iter::FusedIterator for Tiles {}

/// Copy the pixels under `bbox` out of `image`
pub fn crop(image: &RgbImage, bbox: TileBox) -> RgbImage {
    imageops::crop_imm(image, bbox.left, bbox.upper, bbox.width(), bbox.height()).to_image()
}

/// Iterator over `(box, crop)` pairs of an RGB image
pub struct Crops<'a> {
    image: &'a RgbImage,
    tiles: Tiles,
}

impl Iterator for Crops<'_> {
    type Item = (TileBox, RgbImage);

    fn next(&mut self) -> Option<Self::Item> {
        let bbox = self.tiles.next()?;
        Some((bbox, crop(self.image, bbox)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.tiles.size_hint()
    }
}

impl ExactSizeIterator for Crops<'_> {}
