use image::RgbImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::{
    error::Result,
    metrics::DiffMap,
    types::{ProbabilityMap, SegmentationMap},
};

/// Trait for per-tile foreground classifiers
pub trait Classifier: Send + Sync {
    /// Fixed square input size the model expects, if it has one
    fn input_size(&self) -> Option<u32> {
        None
    }

    /// Map an RGB crop to a same-sized foreground probability map
    fn classify(&self, crop: &RgbImage) -> Result<ProbabilityMap>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn input_size(&self) -> Option<u32> {
        (**self).input_size()
    }

    fn classify(&self, crop: &RgbImage) -> Result<ProbabilityMap> {
        (**self).classify(crop)
    }
}

#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    /// Continuous probability map
    Probability,
    /// Thresholded foreground mask
    Segmentation,
    /// Per-pixel TP/TN/FP/FN classification against ground truth
    Difference,
}

/// A per-image output handed to an [`ArtifactSink`]
#[derive(Debug, Clone, Copy)]
pub enum Artifact<'a> {
    Probability(&'a ProbabilityMap),
    Segmentation(&'a SegmentationMap),
    Difference(&'a DiffMap),
}

impl Artifact<'_> {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Probability(_) => ArtifactKind::Probability,
            Self::Segmentation(_) => ArtifactKind::Segmentation,
            Self::Difference(_) => ArtifactKind::Difference,
        }
    }
}

/// Trait for consumers of per-image output arrays
pub trait ArtifactSink: Send + Sync {
    /// Receive one artifact produced for `image_id`
    fn emit(&self, image_id: &str, artifact: Artifact<'_>) -> Result<()>;
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ArtifactSink for NullSink {
    fn emit(&self, _image_id: &str, _artifact: Artifact<'_>) -> Result<()> {
        Ok(())
    }
}
