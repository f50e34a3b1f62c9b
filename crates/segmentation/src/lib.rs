//! # Tiled Binary Segmentation
//!
//! Runs a fixed-input-size classifier over images of any size by tiling them
//! into overlapping crops, stitches the per-tile probabilities back into one
//! full-resolution map and evaluates the thresholded result against ground
//! truth.
//!
//! ## Core Features
//!
//! - **Sliding-window tiling**: overlapping windows that always keep the full
//!   crop size, re-anchored against the right and lower edges
//! - **Max-merge stitching**: order-independent, so tiles can be classified in
//!   parallel
//! - **Confusion-matrix metrics**: IoU, MIoU, accuracy, precision, recall and
//!   Matthews correlation coefficient
//! - **Area-weighted aggregation**: batch statistics weighted by pixel count
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segmentation::{InferenceEngine, ConstantClassifier, io, Metric};
//!
//! let engine = InferenceEngine::builder(ConstantClassifier::new(0.9)?)
//!     .crop_size(512)
//!     .overlap(50)
//!     .build()?;
//!
//! let image = io::load_rgb("field.jpg")?;
//! let result = engine.run(&image)?;
//!
//! let truth = io::load_mask("field_gt.png")?;
//! let evaluation = result.evaluate(&truth)?;
//! println!("MIoU: {}", evaluation.get(Metric::MeanIou));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod metrics;
pub mod pipeline;
pub mod batch;
pub mod io;

// Re-exports for convenience
pub use error::{Result, SegmentationError};
pub use types::{Grid, GroundTruthMap, ProbabilityMap, SegmentationMap, TileBox};
pub use traits::*;
pub use algorithms::*;
pub use metrics::{
    BatchAggregator, BatchSummary, ConfusionCounts, DiffMap, Evaluation, Metric, MetricValue,
    PixelOutcome, weighted_mean,
};
pub use pipeline::{EngineConfig, InferenceEngine, InferenceResult, builder::InferenceEngineBuilder};
pub use batch::{BatchItem, BatchReport, BatchRunner, disambiguate_ids};
