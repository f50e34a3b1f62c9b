use crate::{
    algorithms::TilingConfig,
    error::Result,
    pipeline::{EngineConfig, InferenceEngine, ProgressFn},
    traits::Classifier,
};

/// Builder for creating inference engines with a fluent API
pub struct InferenceEngineBuilder<C: Classifier> {
    classifier: C,
    config: EngineConfig,
    progress: Option<ProgressFn>,
}

impl<C: Classifier> InferenceEngineBuilder<C> {
    /// Create a new builder with default tiling and threshold
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            config: EngineConfig::default(),
            progress: None,
        }
    }

    /// Replace the whole engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tiling(mut self, tiling: TilingConfig) -> Self {
        self.config.tiling = tiling;
        self
    }

    pub fn crop_size(mut self, crop_size: u32) -> Self {
        self.config.tiling.crop_size = crop_size;
        self
    }

    pub fn overlap(mut self, overlap: u32) -> Self {
        self.config.tiling.overlap = overlap;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Classify tiles concurrently (default) or one after another
    pub fn parallel_tiles(mut self, parallel: bool) -> Self {
        self.config.parallel_tiles = parallel;
        self
    }

    /// Observe `(tiles_merged, tiles_total)` after every merged tile
    pub fn on_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> Result<InferenceEngine<C>> {
        InferenceEngine::new(self.classifier, self.config, self.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{algorithms::ConstantClassifier, error::SegmentationError};

    fn stub() -> ConstantClassifier {
        ConstantClassifier::new(0.5).unwrap()
    }

    #[test]
    fn test_defaults() {
        let engine = InferenceEngineBuilder::new(stub()).build().unwrap();
        assert_eq!(engine.config(), &EngineConfig::default());
        assert_eq!(engine.config().tiling.crop_size, 512);
        assert_eq!(engine.config().threshold, 0.5);
    }

    #[test]
    fn test_overrides() {
        let engine = InferenceEngineBuilder::new(stub())
            .tiling(TilingConfig::deeplab())
            .overlap(100)
            .threshold(0.7)
            .parallel_tiles(false)
            .build()
            .unwrap();
        assert_eq!(engine.config().tiling.crop_size, 622);
        assert_eq!(engine.config().tiling.overlap, 100);
        assert!(!engine.config().parallel_tiles);
    }

    #[test]
    fn test_invalid_settings_fail_at_build() {
        let overlap = InferenceEngineBuilder::new(stub()).crop_size(64).overlap(64).build();
        assert!(matches!(overlap, Err(SegmentationError::Configuration(_))));

        let threshold = InferenceEngineBuilder::new(stub()).threshold(1.5).build();
        assert!(matches!(threshold, Err(SegmentationError::Configuration(_))));
    }
}
