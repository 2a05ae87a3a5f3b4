use std::fs;
use std::path::{Path, PathBuf};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

use crate::errors::{RootAnalysisError, Result};

/// Extensions accepted as root images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tif", "tiff"];

/// Represents an input image with its metadata
pub struct InputImage {
    pub image: DynamicImage,
    pub path: PathBuf,
    /// File name including the extension, used as the row key
    pub filename: String,
    /// File name without the extension, used for derived artifacts
    pub stem: String,
}

impl InputImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Whether the path carries one of the accepted image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// List image files directly inside `dir_path`, sorted by file name.
/// Subdirectories are not searched.
pub fn get_image_files_in_dir<P: AsRef<Path>>(dir_path: P) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.exists() {
        return Err(RootAnalysisError::InvalidPath(dir_path.to_path_buf()));
    }

    if !dir_path.is_dir() {
        return Err(RootAnalysisError::Config(format!(
            "{} is not a directory", dir_path.display()
        )));
    }

    let entries = fs::read_dir(dir_path).map_err(|e| {
        RootAnalysisError::Config(format!(
            "Cannot read input directory '{}': {}",
            dir_path.display(),
            e
        ))
    })?;

    let mut image_files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            image_files.push(path);
        }
    }

    image_files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(image_files)
}

/// Load an image file as-is; bit depth normalization happens in preprocessing
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<InputImage> {
    let path = path.as_ref();

    let filename = path.file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| RootAnalysisError::InvalidPath(path.to_path_buf()))?
        .to_string();

    let stem = path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&filename)
        .to_string();

    let image = image::open(path)?;

    Ok(InputImage {
        image,
        path: path.to_path_buf(),
        filename,
        stem,
    })
}

/// Save a grayscale image as PNG
pub fn save_gray_image<P: AsRef<Path>>(image: &GrayImage, path: P) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save an RGB image as PNG
pub fn save_rgb_image<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        assert!(is_image_file(Path::new("a/root.JPG")));
        assert!(is_image_file(Path::new("root.Tiff")));
        assert!(is_image_file(Path::new("root.jpeg")));
        assert!(!is_image_file(Path::new("root.bmp")));
        assert!(!is_image_file(Path::new("notes")));
    }

    #[test]
    fn test_listing_is_sorted_and_flat() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.TIF", "b.jpg", "readme.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();
        fs::write(dir.path().join("nested.png").join("d.png"), b"x").unwrap();

        let files = get_image_files_in_dir(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();

        assert_eq!(names, vec!["a.TIF", "b.jpg", "c.png"]);
    }

    #[test]
    fn test_corrupt_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();

        assert!(load_image(&path).is_err());
    }
}
