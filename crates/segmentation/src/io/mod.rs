pub mod render;
pub mod sink;

pub use render::*;
pub use sink::FileSink;

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::warn;

use crate::{
    error::{Result, SegmentationError},
    types::{Grid, GroundTruthMap},
};

/// Decode an image file as 8-bit RGB
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

/// Decode a mask image; any non-zero luma is foreground
pub fn load_mask(path: impl AsRef<Path>) -> Result<GroundTruthMap> {
    let luma = image::open(path)?.to_luma8();
    let (width, height) = luma.dimensions();
    let values = luma.into_raw().into_iter().map(|v| v != 0).collect();
    Grid::from_vec(width, height, values).ok_or_else(|| {
        SegmentationError::Configuration("mask buffer has unexpected length".to_string())
    })
}

/// Whether `path` has an extension of a decodable image format
pub fn is_image_file(path: &Path) -> bool {
    path.is_file() && ImageFormat::from_path(path).is_ok()
}

/// Image files directly inside `dir`, sorted by path
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Resolve the file matching `input` under `other`.
///
/// When `other` is a directory the result is the file inside it with the
/// stem of `input` and the given extension; otherwise `other` is returned
/// as-is, with a warning if its extension differs.
pub fn respective_file(input: &Path, other: &Path, extension: &str) -> PathBuf {
    if other.is_dir() {
        let stem = input.file_stem().unwrap_or(input.as_os_str());
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(extension);
        return other.join(name);
    }

    let matches = other
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    if !matches {
        warn!("Wrong file suffix for {:?}. Expected '.{}'", other, extension);
    }
    other.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_load_mask_nonzero_is_foreground() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mut img = GrayImage::new(3, 2);
        img.put_pixel(0, 0, Luma([1]));
        img.put_pixel(2, 1, Luma([255]));
        img.save(&path).unwrap();

        let mask = load_mask(&path).unwrap();
        assert_eq!(mask.shape(), (2, 3));
        assert_eq!(mask.as_slice(), &[true, false, false, false, false, true]);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_rgb(dir.path().join("absent.png")).is_err());
    }

    #[test]
    fn test_list_images_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::new(1, 1).save(dir.path().join("b.png")).unwrap();
        GrayImage::new(1, 1).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let images = list_images(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_respective_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = Path::new("/data/field_07.jpg");

        assert_eq!(
            respective_file(input, dir.path(), "png"),
            dir.path().join("field_07.png")
        );

        let explicit = Path::new("/masks/custom.PNG");
        assert_eq!(respective_file(input, explicit, "png"), explicit);
    }
}
