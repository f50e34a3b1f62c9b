use std::path::{Path, PathBuf};

use image::{ImageError, ImageFormat};
use tracing::{info, warn};

use crate::{
    error::{Result, SegmentationError},
    io::render,
    traits::{Artifact, ArtifactKind, ArtifactSink},
};

/// Writes artifacts as `<image_id>_<kind>.png` into a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
    overwrite: bool,
}

impl FileSink {
    /// Create the sink, creating `output_dir` if needed
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            overwrite: false,
        })
    }

    /// Replace existing files instead of skipping them
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, image_id: &str, kind: ArtifactKind) -> PathBuf {
        self.output_dir.join(format!("{image_id}_{kind}.png"))
    }
}

impl ArtifactSink for FileSink {
    fn emit(&self, image_id: &str, artifact: Artifact<'_>) -> Result<()> {
        let path = self.path_for(image_id, artifact.kind());
        if path.exists() && !self.overwrite {
            warn!("Output file {:?} already exists, skipping", path);
            return Ok(());
        }

        match artifact {
            Artifact::Probability(map) => {
                render::probability_to_pseudocolor(map)
                    .save_with_format(&path, ImageFormat::Png)
                    .map_err(write_error)?
            }
            Artifact::Segmentation(map) => {
                render::segmentation_to_image(map)
                    .save_with_format(&path, ImageFormat::Png)
                    .map_err(write_error)?
            }
            Artifact::Difference(map) => {
                render::diff_to_image(map)
                    .save_with_format(&path, ImageFormat::Png)
                    .map_err(write_error)?
            }
        }

        info!("Saved {} to {:?}", artifact.kind(), path);
        Ok(())
    }
}

/// Failures to write the file are I/O errors of the run, not of the image.
fn write_error(err: ImageError) -> SegmentationError {
    match err {
        ImageError::IoError(err) => SegmentationError::Io(err),
        other => SegmentationError::Image(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{io::load_mask, types::Grid};

    #[test]
    fn test_writes_segmentation() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("out")).unwrap();
        let map = Grid::from_fn(4, 3, |x, _| x % 2 == 0);

        sink.emit("tile", Artifact::Segmentation(&map)).unwrap();

        let path = sink.path_for("tile", ArtifactKind::Segmentation);
        assert!(path.ends_with("tile_segmentation.png"));
        assert_eq!(load_mask(&path).unwrap(), map);
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path()).unwrap();
        let first = Grid::filled(2, 2, true);
        let second = Grid::filled(2, 2, false);

        sink.emit("img", Artifact::Segmentation(&first)).unwrap();
        sink.emit("img", Artifact::Segmentation(&second)).unwrap();
        let path = sink.path_for("img", ArtifactKind::Segmentation);
        assert_eq!(load_mask(&path).unwrap(), first);

        let sink = sink.with_overwrite(true);
        sink.emit("img", Artifact::Segmentation(&second)).unwrap();
        assert_eq!(load_mask(&path).unwrap(), second);
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path()).unwrap().with_overwrite(true);
        std::fs::create_dir(sink.path_for("blocked", ArtifactKind::Segmentation)).unwrap();

        let result = sink.emit("blocked", Artifact::Segmentation(&Grid::filled(2, 2, true)));
        assert!(matches!(result, Err(SegmentationError::Io(_))));
    }

    #[test]
    fn test_writes_probability_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path()).unwrap();
        let map = Grid::filled(5, 5, 0.25f32);
        sink.emit("p", Artifact::Probability(&map)).unwrap();

        let img = image::open(sink.path_for("p", ArtifactKind::Probability)).unwrap();
        assert_eq!(img.color(), image::ColorType::Rgb8);
    }
}
