pub mod builder;

use image::RgbImage;
use parking_lot::Mutex;
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    algorithms::{self, Stitcher, TilingConfig, DEFAULT_THRESHOLD},
    error::{Result, SegmentationError},
    metrics::{self, DiffMap, Evaluation},
    traits::Classifier,
    types::{GroundTruthMap, ProbabilityMap, SegmentationMap, TileBox},
};

/// Callback receiving `(tiles_merged, tiles_total)` after each merge
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Settings of a single-image inference run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    pub tiling: TilingConfig,
    /// Probabilities strictly above this value are foreground
    #[schemars(range(min = 0.0, max = 1.0))]
    pub threshold: f32,
    /// Classify the tiles of one image on the rayon pool
    pub parallel_tiles: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tiling: TilingConfig::default(),
            threshold: DEFAULT_THRESHOLD,
            parallel_tiles: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.tiling.validate()?;
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(SegmentationError::Configuration(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Tiles an image, classifies every tile and stitches the results
pub struct InferenceEngine<C: Classifier> {
    classifier: C,
    config: EngineConfig,
    progress: Option<ProgressFn>,
}

impl<C: Classifier> InferenceEngine<C> {
    /// Create a new engine builder around `classifier`
    pub fn builder(classifier: C) -> builder::InferenceEngineBuilder<C> {
        builder::InferenceEngineBuilder::new(classifier)
    }

    pub(crate) fn new(classifier: C, config: EngineConfig, progress: Option<ProgressFn>) -> Result<Self> {
        config.validate()?;
        if let Some(size) = classifier.input_size() {
            if size != config.tiling.crop_size {
                return Err(SegmentationError::Configuration(format!(
                    "classifier expects {size} px input but crop size is {}",
                    config.tiling.crop_size
                )));
            }
        }
        Ok(Self {
            classifier,
            config,
            progress,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Run the full tile / classify / stitch / threshold sequence on `image`
    pub fn run(&self, image: &RgbImage) -> Result<InferenceResult> {
        let (width, height) = image.dimensions();
        info!("Running inference on {}x{} image", width, height);

        let probability_map = if self.config.parallel_tiles {
            self.stitch_parallel(image)?
        } else {
            self.stitch_sequential(image)?
        };
        let segmentation_map = algorithms::segment(&probability_map, self.config.threshold);

        info!(
            "Completed inference: {} of {} pixels foreground",
            segmentation_map.count_true(),
            segmentation_map.pixel_count()
        );

        Ok(InferenceResult {
            probability_map,
            segmentation_map,
            threshold: self.config.threshold,
        })
    }

    fn stitch_sequential(&self, image: &RgbImage) -> Result<ProbabilityMap> {
        let crops = self.config.tiling.crops(image)?;
        let total = crops.len();
        let mut stitcher = Stitcher::new(image.width(), image.height());

        for (bbox, crop) in crops {
            let tile = self.classify_tile(&crop, bbox)?;
            stitcher.accumulate(&tile, bbox)?;
            self.report(stitcher.merged(), total);
        }

        Ok(stitcher.into_probability_map())
    }

    fn stitch_parallel(&self, image: &RgbImage) -> Result<ProbabilityMap> {
        let boxes: Vec<TileBox> = self
            .config
            .tiling
            .tiles(image.width(), image.height())?
            .collect();
        let total = boxes.len();
        let stitcher = Mutex::new(Stitcher::new(image.width(), image.height()));

        // Merge order is irrelevant for a max-merge, only the writes need the lock.
        boxes.par_iter().try_for_each(|&bbox| -> Result<()> {
            let crop = algorithms::crop(image, bbox);
            let tile = self.classify_tile(&crop, bbox)?;
            // Report under the lock so observers see counts in order.
            let mut stitcher = stitcher.lock();
            stitcher.accumulate(&tile, bbox)?;
            self.report(stitcher.merged(), total);
            Ok(())
        })?;

        Ok(stitcher.into_inner().into_probability_map())
    }

    fn classify_tile(&self, crop: &RgbImage, bbox: TileBox) -> Result<ProbabilityMap> {
        debug!("Classifying {}", bbox);
        let tile = self.classifier.classify(crop)?;
        if tile.shape() != bbox.shape() {
            return Err(SegmentationError::shape_mismatch(
                "classifier output",
                bbox.shape(),
                tile.shape(),
            ));
        }
        if tile.iter().any(|p| p.is_nan()) {
            return Err(SegmentationError::Classifier(format!(
                "NaN probability in tile {bbox}"
            )));
        }
        Ok(tile.map(|&p| p.clamp(0.0, 1.0)))
    }

    fn report(&self, merged: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(merged, total);
        }
    }
}

/// Output of one inference run
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub probability_map: ProbabilityMap,
    pub segmentation_map: SegmentationMap,
    pub threshold: f32,
}

impl InferenceResult {
    pub fn width(&self) -> u32 {
        self.probability_map.width()
    }

    pub fn height(&self) -> u32 {
        self.probability_map.height()
    }

    /// Every metric of the segmentation against `ground_truth`
    pub fn evaluate(&self, ground_truth: &GroundTruthMap) -> Result<Evaluation> {
        metrics::evaluate(&self.segmentation_map, ground_truth)
    }

    /// Per-pixel TP/TN/FP/FN map against `ground_truth`
    pub fn diff(&self, ground_truth: &GroundTruthMap) -> Result<DiffMap> {
        metrics::diff_map(&self.segmentation_map, ground_truth)
    }
}
