//! Confusion-matrix evaluation of binary segmentations.
//!
//! Every metric is a pure function of [`ConfusionCounts`]; an [`Evaluation`]
//! computes the full set once per image and the [`BatchAggregator`] combines
//! images weighted by their pixel count.

pub mod aggregate;
pub mod confusion;
pub mod metric;

pub use aggregate::*;
pub use confusion::*;
pub use metric::*;
