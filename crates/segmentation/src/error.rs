use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Shape mismatch for {context}: expected {expected:?} (height, width), got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Cannot aggregate: {0}")]
    EmptyInput(String),

    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SegmentationError {
    pub(crate) fn shape_mismatch(
        context: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    ) -> Self {
        Self::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }

    /// Errors that abort the current image but leave a batch run intact.
    pub fn is_per_image(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::ShapeMismatch { .. }
                | Self::Classifier(_)
                | Self::Image(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SegmentationError>;
