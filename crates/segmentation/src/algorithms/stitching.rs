use tracing::debug;

use crate::{
    error::{Result, SegmentationError},
    types::{ProbabilityMap, TileBox},
};

/// Owns the full-resolution probability accumulator of one image.
///
/// Tiles are merged by element-wise maximum, so the final value of a pixel is
/// the max over every tile covering it regardless of merge order.
#[derive(Debug, Clone)]
pub struct Stitcher {
    map: ProbabilityMap,
    merged: usize,
}

impl Stitcher {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            map: ProbabilityMap::filled(width, height, 0.0),
            merged: 0,
        }
    }

    /// Merge `tile` into the accumulator at `bbox`
    pub fn accumulate(&mut self, tile: &ProbabilityMap, bbox: TileBox) -> Result<()> {
        if bbox.right <= bbox.left || bbox.lower <= bbox.upper {
            return Err(SegmentationError::Configuration(format!("degenerate {bbox}")));
        }
        if tile.shape() != bbox.shape() {
            return Err(SegmentationError::shape_mismatch(
                "classifier output",
                bbox.shape(),
                tile.shape(),
            ));
        }
        if bbox.right > self.map.width() || bbox.lower > self.map.height() {
            return Err(SegmentationError::Configuration(format!(
                "{bbox} exceeds the {}x{} map",
                self.map.width(),
                self.map.height()
            )));
        }

        for (row_idx, y) in (bbox.upper..bbox.lower).enumerate() {
            let source = tile.row(row_idx as u32);
            let target = &mut self.map.row_mut(y)[bbox.left as usize..bbox.right as usize];
            for (dst, &src) in target.iter_mut().zip(source) {
                *dst = dst.max(src);
            }
        }

        self.merged += 1;
        debug!("Merged tile {} at {}", self.merged, bbox);
        Ok(())
    }

    /// Number of tiles merged so far
    pub fn merged(&self) -> usize {
        self.merged
    }

    pub fn probability_map(&self) -> &ProbabilityMap {
        &self.map
    }

    pub fn into_probability_map(self) -> ProbabilityMap {
        self.map
    }
}
