use image::{RgbImage, imageops};

use crate::{
    error::{Result, SegmentationError},
    traits::Classifier,
    types::ProbabilityMap,
};

/// Returns the same probability for every pixel
#[derive(Debug, Clone, Copy)]
pub struct ConstantClassifier {
    pub probability: f32,
}

impl ConstantClassifier {
    pub fn new(probability: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(SegmentationError::Configuration(format!(
                "constant probability {probability} is outside [0, 1]"
            )));
        }
        Ok(Self { probability })
    }
}

impl Classifier for ConstantClassifier {
    fn classify(&self, crop: &RgbImage) -> Result<ProbabilityMap> {
        Ok(ProbabilityMap::filled(crop.width(), crop.height(), self.probability))
    }
}

/// Model-free baseline: brighter pixels are more likely foreground
#[derive(Debug, Clone, Copy, Default)]
pub struct LuminanceClassifier;

impl Classifier for LuminanceClassifier {
    fn classify(&self, crop: &RgbImage) -> Result<ProbabilityMap> {
        let gray = imageops::grayscale(crop);
        let (width, height) = gray.dimensions();
        let values = gray.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();
        ProbabilityMap::from_vec(width, height, values).ok_or_else(|| {
            SegmentationError::Classifier("grayscale buffer has unexpected length".to_string())
        })
    }
}

/// Adapts a closure into a [`Classifier`]
pub struct FnClassifier<F> {
    input_size: Option<u32>,
    f: F,
}

impl<F> FnClassifier<F>
where
    F: Fn(&RgbImage) -> Result<ProbabilityMap> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { input_size: None, f }
    }

    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = Some(size);
        self
    }
}

impl<F> Classifier for FnClassifier<F>
where
    F: Fn(&RgbImage) -> Result<ProbabilityMap> + Send + Sync,
{
    fn input_size(&self) -> Option<u32> {
        self.input_size
    }

    fn classify(&self, crop: &RgbImage) -> Result<ProbabilityMap> {
        (self.f)(crop)
    }
}
