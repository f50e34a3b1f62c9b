//! Batch inference over many images.
//!
//! Per-image failures (bad tiling parameters, shape mismatches, classifier or
//! decode errors) are recorded and the batch moves on; any other error aborts
//! the whole run.

use std::{collections::HashMap, path::PathBuf};

use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::Result,
    io,
    metrics::{BatchAggregator, BatchSummary, Evaluation},
    pipeline::InferenceEngine,
    traits::{Artifact, ArtifactKind, ArtifactSink, Classifier},
};

/// One image of a batch, optionally with its reference mask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BatchItem {
    pub id: String,
    pub image: PathBuf,
    pub ground_truth: Option<PathBuf>,
}

impl BatchItem {
    /// Item identified by the file stem of `image`
    pub fn new(image: impl Into<PathBuf>) -> Self {
        let image = image.into();
        let id = image
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| image.to_string_lossy().into_owned());
        Self {
            id,
            image,
            ground_truth: None,
        }
    }

    pub fn with_ground_truth(mut self, path: impl Into<PathBuf>) -> Self {
        self.ground_truth = Some(path.into());
        self
    }
}

/// Use the full file name as id for items whose file stems collide,
/// e.g. `plot.jpg` and `plot.png` in one directory.
pub fn disambiguate_ids(items: &mut [BatchItem]) {
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for item in items.iter() {
        *occurrences.entry(item.id.clone()).or_default() += 1;
    }

    for item in items.iter_mut() {
        if occurrences.get(&item.id).is_some_and(|&count| count > 1) {
            if let Some(name) = item.image.file_name() {
                item.id = name.to_string_lossy().into_owned();
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImageOutcome {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub evaluation: Option<Evaluation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FailedImage {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchReport {
    pub processed: Vec<ImageOutcome>,
    pub failed: Vec<FailedImage>,
    /// Area-weighted metrics over every evaluated image
    pub summary: Option<BatchSummary>,
}

impl BatchReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs an [`InferenceEngine`] over a list of images
pub struct BatchRunner<C: Classifier, S: ArtifactSink> {
    engine: InferenceEngine<C>,
    sink: S,
    artifacts: Vec<ArtifactKind>,
    concurrent_images: bool,
}

impl<C: Classifier, S: ArtifactSink> BatchRunner<C, S> {
    pub fn new(engine: InferenceEngine<C>, sink: S) -> Self {
        Self {
            engine,
            sink,
            artifacts: vec![ArtifactKind::Segmentation],
            concurrent_images: false,
        }
    }

    /// Artifacts handed to the sink for every image
    pub fn with_artifacts(mut self, artifacts: impl IntoIterator<Item = ArtifactKind>) -> Self {
        self.artifacts = artifacts.into_iter().collect();
        self
    }

    /// Process distinct images on the rayon pool
    pub fn with_concurrent_images(mut self, concurrent: bool) -> Self {
        self.concurrent_images = concurrent;
        self
    }

    pub fn engine(&self) -> &InferenceEngine<C> {
        &self.engine
    }

    pub fn run(&self, items: &[BatchItem]) -> Result<BatchReport> {
        info!("Processing batch of {} images", items.len());

        let outcomes: Vec<Result<ImageOutcome>> = if self.concurrent_images {
            items.par_iter().map(|item| self.process(item)).collect()
        } else {
            items.iter().map(|item| self.process(item)).collect()
        };

        let mut aggregator = BatchAggregator::new();
        let mut processed = Vec::new();
        let mut failed = Vec::new();

        for (item, outcome) in items.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => {
                    if let Some(evaluation) = &outcome.evaluation {
                        aggregator.add(outcome.id.clone(), evaluation.clone());
                    }
                    processed.push(outcome);
                }
                Err(err) if err.is_per_image() => {
                    warn!("Skipping {}: {}", item.id, err);
                    failed.push(FailedImage {
                        id: item.id.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        let summary = if aggregator.is_empty() {
            None
        } else {
            Some(aggregator.summary()?)
        };

        info!(
            "Batch finished: {} processed, {} failed",
            processed.len(),
            failed.len()
        );

        Ok(BatchReport {
            processed,
            failed,
            summary,
        })
    }

    /// Run one image end to end
    pub fn process(&self, item: &BatchItem) -> Result<ImageOutcome> {
        info!("Running inference on {:?}", item.image);
        let image = io::load_rgb(&item.image)?;
        let result = self.engine.run(&image)?;

        let ground_truth = item.ground_truth.as_ref().map(io::load_mask).transpose()?;
        let evaluation = ground_truth
            .as_ref()
            .map(|truth| result.evaluate(truth))
            .transpose()?;

        for kind in &self.artifacts {
            match kind {
                ArtifactKind::Probability => self
                    .sink
                    .emit(&item.id, Artifact::Probability(&result.probability_map))?,
                ArtifactKind::Segmentation => self
                    .sink
                    .emit(&item.id, Artifact::Segmentation(&result.segmentation_map))?,
                ArtifactKind::Difference => {
                    if let Some(truth) = &ground_truth {
                        let diff = result.diff(truth)?;
                        self.sink.emit(&item.id, Artifact::Difference(&diff))?;
                    }
                }
            }
        }

        if let Some(evaluation) = &evaluation {
            for value in &evaluation.values {
                info!("{}: {}", item.id, value);
            }
        }

        Ok(ImageOutcome {
            id: item.id.clone(),
            width: result.width(),
            height: result.height(),
            evaluation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithms::ConstantClassifier,
        error::SegmentationError,
        io::FileSink,
        metrics::Metric,
        traits::NullSink,
    };
    use image::{GrayImage, Luma, RgbImage};
    use parking_lot::Mutex;
    use std::path::Path;

    #[derive(Default)]
    struct RecordingSink {
        emitted: Mutex<Vec<(String, ArtifactKind)>>,
    }

    impl ArtifactSink for RecordingSink {
        fn emit(&self, image_id: &str, artifact: Artifact<'_>) -> Result<()> {
            self.emitted.lock().push((image_id.to_string(), artifact.kind()));
            Ok(())
        }
    }

    fn write_rgb(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::new(width, height).save(&path).unwrap();
        path
    }

    fn write_mask(dir: &Path, name: &str, width: u32, height: u32, foreground_cols: u32) -> PathBuf {
        let path = dir.join(name);
        GrayImage::from_fn(width, height, |x, _| Luma([if x < foreground_cols { 255 } else { 0 }]))
            .save(&path)
            .unwrap();
        path
    }

    fn engine() -> InferenceEngine<ConstantClassifier> {
        InferenceEngine::builder(ConstantClassifier::new(0.9).unwrap())
            .crop_size(16)
            .overlap(4)
            .build()
            .unwrap()
    }

    #[test]
    fn test_item_id_from_stem() {
        let item = BatchItem::new("/images/plot_12.jpg").with_ground_truth("/gt/plot_12.png");
        assert_eq!(item.id, "plot_12");
        assert!(item.ground_truth.is_some());
    }

    #[test]
    fn test_colliding_stems_use_file_name() {
        let mut items = vec![
            BatchItem::new("/images/a.jpg"),
            BatchItem::new("/images/a.png"),
            BatchItem::new("/images/b.png"),
        ];
        disambiguate_ids(&mut items);
        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["a.jpg", "a.png", "b"]);
    }

    #[test]
    fn test_colliding_stems_keep_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut items = vec![
            BatchItem::new(write_rgb(dir.path(), "a.jpg", 8, 8)),
            BatchItem::new(write_rgb(dir.path(), "a.png", 8, 8)),
        ];
        disambiguate_ids(&mut items);

        let sink = FileSink::new(dir.path().join("out")).unwrap();
        let runner = BatchRunner::new(engine(), sink);
        let report = runner.run(&items).unwrap();
        assert_eq!(report.processed.len(), 2);
        for item in &items {
            assert!(runner.sink.path_for(&item.id, ArtifactKind::Segmentation).is_file());
        }
    }

    #[test]
    fn test_bad_image_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_rgb(dir.path(), "good.png", 40, 30);
        let items = vec![
            BatchItem::new(dir.path().join("missing.png")),
            BatchItem::new(good),
        ];

        let report = BatchRunner::new(engine(), NullSink).run(&items).unwrap();
        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "missing");
        assert!(report.summary.is_none());
    }

    #[test]
    fn test_mismatched_ground_truth_is_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_rgb(dir.path(), "a.png", 20, 20);
        let mask = write_mask(dir.path(), "a_gt.png", 10, 20, 5);
        let items = vec![BatchItem::new(image).with_ground_truth(mask)];

        let report = BatchRunner::new(engine(), NullSink).run(&items).unwrap();
        assert!(report.processed.is_empty());
        assert!(report.failed[0].reason.contains("ground truth"));
    }

    #[test]
    fn test_summary_is_area_weighted() {
        let dir = tempfile::tempdir().unwrap();
        // everything is predicted foreground
        let small = write_rgb(dir.path(), "small.png", 10, 10);
        let small_gt = write_mask(dir.path(), "small_gt.png", 10, 10, 10);
        let large = write_rgb(dir.path(), "large.png", 30, 10);
        let large_gt = write_mask(dir.path(), "large_gt.png", 30, 10, 0);

        let items = vec![
            BatchItem::new(small).with_ground_truth(small_gt),
            BatchItem::new(large).with_ground_truth(large_gt),
        ];
        let report = BatchRunner::new(engine(), NullSink)
            .with_concurrent_images(true)
            .run(&items)
            .unwrap();

        let summary = report.summary.as_ref().unwrap();
        assert_eq!(summary.images, 2);
        assert_eq!(summary.total_pixels, 400);
        assert!((summary.get(Metric::PixelAccuracy).unwrap() - 0.25).abs() < 1e-12);
        assert!(report.to_json().unwrap().contains("pixel_accuracy"));
    }

    #[test]
    fn test_emits_requested_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_rgb(dir.path(), "x.png", 20, 20);
        let mask = write_mask(dir.path(), "x_gt.png", 20, 20, 4);
        let plain = write_rgb(dir.path(), "y.png", 20, 20);
        let items = vec![BatchItem::new(image).with_ground_truth(mask), BatchItem::new(plain)];

        let runner = BatchRunner::new(engine(), RecordingSink::default()).with_artifacts([
            ArtifactKind::Probability,
            ArtifactKind::Segmentation,
            ArtifactKind::Difference,
        ]);
        runner.run(&items).unwrap();

        let emitted = runner.sink.emitted.lock();
        let for_x = emitted.iter().filter(|(id, _)| id == "x").count();
        let for_y = emitted.iter().filter(|(id, _)| id == "y").count();
        assert_eq!(for_x, 3);
        // no ground truth, no difference map
        assert_eq!(for_y, 2);
    }

    #[test]
    fn test_sink_io_failure_aborts() {
        struct FailingSink;
        impl ArtifactSink for FailingSink {
            fn emit(&self, _: &str, _: Artifact<'_>) -> Result<()> {
                Err(SegmentationError::Io(std::io::Error::other("disk full")))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let image = write_rgb(dir.path(), "z.png", 8, 8);
        let result = BatchRunner::new(engine(), FailingSink).run(&[BatchItem::new(image)]);
        assert!(matches!(result, Err(SegmentationError::Io(_))));
    }

    #[test]
    fn test_unwritable_output_aborts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_rgb(dir.path(), "a.png", 8, 8);
        let sink = FileSink::new(dir.path().join("out")).unwrap().with_overwrite(true);
        std::fs::create_dir(sink.path_for("a", ArtifactKind::Segmentation)).unwrap();

        let result = BatchRunner::new(engine(), sink).run(&[BatchItem::new(image)]);
        assert!(matches!(result, Err(SegmentationError::Io(_))));
    }
}
