use schemars::JsonSchema;
use segmentation::{
    disambiguate_ids, io, ArtifactKind, BatchAggregator, BatchItem, Classifier,
    ConstantClassifier, EngineConfig, LuminanceClassifier, SegmentationError,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
    #[error("Ground truth {0:?} must be a directory when the input is a directory")]
    GroundTruthNotDirectory(PathBuf),
    #[error("Input {0:?} is neither an image file nor a directory")]
    InvalidInput(PathBuf),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Built-in stand-ins for a trained model
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq,
    clap::ValueEnum
)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Normalized brightness as foreground probability
    #[default]
    Luminance,
    /// The same probability everywhere
    Constant,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ClassifierSection {
    pub kind: ClassifierKind,
    /// Used by the constant classifier
    #[schemars(range(min = 0.0, max = 1.0))]
    pub probability: f32,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::default(),
            probability: 0.9,
        }
    }
}

impl ClassifierSection {
    pub fn build(&self) -> Result<Box<dyn Classifier>, CliError> {
        let classifier: Box<dyn Classifier> = match self.kind {
            ClassifierKind::Luminance => Box::new(LuminanceClassifier),
            ClassifierKind::Constant => Box::new(ConstantClassifier::new(self.probability)?),
        };
        Ok(classifier)
    }
}

fn default_artifacts() -> Vec<ArtifactKind> {
    vec![ArtifactKind::Segmentation]
}

/// Inference run configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RunConfig {
    /// Image file or directory of images
    pub input: PathBuf,
    /// Where artifacts are written; nothing is written when absent
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Mask file, or directory of `<stem>.png` masks for a directory input
    #[serde(default)]
    pub ground_truth: Option<PathBuf>,
    #[serde(default = "default_artifacts")]
    pub artifacts: Vec<ArtifactKind>,
    /// Replace existing output files
    #[serde(default)]
    pub overwrite: bool,
    /// Process several images at once
    #[serde(default)]
    pub concurrent_images: bool,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub classifier: ClassifierSection,
}

impl RunConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: None,
            ground_truth: None,
            artifacts: default_artifacts(),
            overwrite: false,
            concurrent_images: false,
            engine: EngineConfig::default(),
            classifier: ClassifierSection::default(),
        }
    }

    /// Load RunConfig from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load RunConfig from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Load RunConfig from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load RunConfig from JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    /// Save RunConfig to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CliError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Save RunConfig to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CliError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RunConfig)
    }

    /// Expand the input into batch items, pairing each with its ground truth
    pub fn batch_items(&self) -> Result<Vec<BatchItem>, CliError> {
        pair_files(&self.input, self.ground_truth.as_deref())
    }
}

/// Pair every image under `input` with its counterpart under `ground_truth`
pub fn pair_files(input: &Path, ground_truth: Option<&Path>) -> Result<Vec<BatchItem>, CliError> {
    if input.is_dir() {
        if let Some(truth) = ground_truth {
            if !truth.is_dir() {
                return Err(CliError::GroundTruthNotDirectory(truth.to_path_buf()));
            }
        }
        let mut items: Vec<BatchItem> = io::list_images(input)?
            .into_iter()
            .map(|path| with_truth(BatchItem::new(&path), &path, ground_truth))
            .collect();
        disambiguate_ids(&mut items);
        return Ok(items);
    }

    if !io::is_image_file(input) {
        return Err(CliError::InvalidInput(input.to_path_buf()));
    }
    Ok(vec![with_truth(BatchItem::new(input), input, ground_truth)])
}

fn with_truth(item: BatchItem, image: &Path, ground_truth: Option<&Path>) -> BatchItem {
    match ground_truth {
        Some(truth) => item.with_ground_truth(io::respective_file(image, truth, "png")),
        None => item,
    }
}

/// Evaluate existing segmentation masks against their ground truth.
///
/// Unreadable or mismatched pairs are skipped with a warning.
pub fn evaluate_predictions(
    prediction: &Path,
    ground_truth: &Path,
) -> Result<BatchAggregator, CliError> {
    let mut aggregator = BatchAggregator::new();

    for item in pair_files(prediction, Some(ground_truth))? {
        let Some(truth_path) = &item.ground_truth else {
            continue;
        };
        let evaluation = io::load_mask(&item.image).and_then(|predicted| {
            let truth = io::load_mask(truth_path)?;
            segmentation::metrics::evaluate(&predicted, &truth)
        });

        match evaluation {
            Ok(evaluation) => {
                for value in &evaluation.values {
                    info!("{}: {}", item.id, value);
                }
                aggregator.add(item.id, evaluation);
            }
            Err(err) if err.is_per_image() => warn!("Skipping {}: {}", item.id, err),
            Err(err) => return Err(err.into()),
        }
    }

    Ok(aggregator)
}
