use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentationError};

/// Rectangle in pixel coordinates, exclusive on `right` and `lower`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TileBox {
    pub left: u32,
    pub upper: u32,
    pub right: u32,
    pub lower: u32,
}

impl TileBox {
    /// Create a box, rejecting empty or inverted rectangles
    pub fn new(left: u32, upper: u32, right: u32, lower: u32) -> Result<Self> {
        if right <= left || lower <= upper {
            return Err(SegmentationError::Configuration(format!(
                "degenerate box left={left} upper={upper} right={right} lower={lower}"
            )));
        }
        Ok(Self {
            left,
            upper,
            right,
            lower,
        })
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.lower - self.upper
    }

    /// `(height, width)`, the order map shapes are reported in
    pub fn shape(&self) -> (u32, u32) {
        (self.height(), self.width())
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x < self.right && y >= self.upper && y < self.lower
    }
}

impl fmt::Display for TileBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Box(left={}, upper={}, right={}, lower={})",
            self.left, self.upper, self.right, self.lower
        )
    }
}

/// Dense row-major 2-D array with one cell per image pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    data: Vec<T>,
}

/// Per-pixel foreground probability, pre-thresholding.
pub type ProbabilityMap = Grid<f32>;

/// Binary per-pixel class decision, `true` is foreground.
pub type SegmentationMap = Grid<bool>;

/// Externally loaded reference mask, `true` is foreground.
pub type GroundTruthMap = Grid<bool>;

impl<T> Grid<T> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(height, width)`
    pub fn shape(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    pub fn pixel_count(&self) -> u64 {
        self.data.len() as u64
    }

    /// Fail unless `other` has the same `(height, width)`
    pub fn ensure_same_shape<U>(&self, other: &Grid<U>, context: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(SegmentationError::shape_mismatch(
                context,
                self.shape(),
                other.shape(),
            ));
        }
        Ok(())
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }
}

impl<T: Copy> Grid<T> {
    pub fn filled(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap an existing buffer, `None` when its length is not `width * height`
    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> T,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> T {
        self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    pub fn row(&self, y: u32) -> &[T] {
        let start = y as usize * self.width as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [T] {
        let start = y as usize * self.width as usize;
        &mut self.data[start..start + self.width as usize]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.data.iter()
    }

    pub fn map<U, F>(&self, f: F) -> Grid<U>
    where
        F: FnMut(&T) -> U,
    {
        Grid {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl Grid<bool> {
    pub fn count_true(&self) -> u64 {
        self.data.iter().filter(|&&v| v).count() as u64
    }

    /// Lift a binary map back into probability space (0.0 / 1.0)
    pub fn to_probabilities(&self) -> ProbabilityMap {
        self.map(|&v| if v { 1.0 } else { 0.0 })
    }
}
