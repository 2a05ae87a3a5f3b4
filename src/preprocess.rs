// src/preprocess.rs - Raw photograph to calibrated root mask and skeleton

use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

use crate::errors::{RootAnalysisError, Result};
use crate::image_utils::{default_threshold_level, histogram, threshold_dark};
use crate::morphology::skeletonize;
use crate::raster::{BinaryMask, CalibratedRaster, Skeleton, BACKGROUND, FOREGROUND};

/// Inputs of [`preprocess`] that come from the batch configuration
#[derive(Debug, Clone, Copy)]
pub struct PreprocessParams {
    pub scale_pix: f64,
    pub scale_cm: f64,
    pub black_roots: bool,
    /// Physical area, in the unit of `scale_cm` squared
    pub root_min_size: f64,
}

/// Result of preprocessing one photograph
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub mask: BinaryMask,
    pub skeleton: Skeleton,
    /// Auto-threshold level, `None` when the image had no split
    pub threshold: Option<u8>,
    pub removed_particles: usize,
}

/// Pixels per physical unit. Rejects a zero or non-finite scale.
pub fn compute_scale(scale_pix: f64, scale_cm: f64) -> Result<f64> {
    if scale_cm == 0.0 {
        return Err(RootAnalysisError::Config("scale_cm must not be 0".to_string()));
    }
    if !scale_pix.is_finite() || !scale_cm.is_finite() || scale_pix <= 0.0 {
        return Err(RootAnalysisError::Config(format!(
            "invalid scale {} px / {} cm",
            scale_pix, scale_cm
        )));
    }
    let scale = scale_pix / scale_cm;
    if scale <= 0.0 {
        return Err(RootAnalysisError::Config(format!(
            "scale must be > 0, got {}",
            scale
        )));
    }
    Ok(scale)
}

/// Turn a raw photograph into a root mask and its skeleton.
///
/// The steps run in a fixed order: scale, 8-bit conversion, polarity,
/// "Default" threshold, particle filter, calibration reset, skeleton.
/// An image without a threshold split yields an empty mask, not an error.
pub fn preprocess(image: &DynamicImage, params: &PreprocessParams) -> Result<Preprocessed> {
    let scale = compute_scale(params.scale_pix, params.scale_cm)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(RootAnalysisError::ImageProcessing(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }

    let mut gray = image.to_luma8();

    // Roots end up as the dark class
    if !params.black_roots {
        imageops::invert(&mut gray);
        debug!("root inverted");
    }

    let threshold = default_threshold_level(&histogram(&gray));
    let binary = match threshold {
        Some(level) => threshold_dark(&gray, level),
        None => GrayImage::new(gray.width(), gray.height()),
    };

    let min_area_px = params.root_min_size * scale * scale;
    let (filtered, removed_particles) = filter_particles(&binary, min_area_px);
    debug!(
        "threshold {:?}, removed {} particles below {:.1} px",
        threshold, removed_particles, min_area_px
    );

    let mut raster = CalibratedRaster::new(filtered, scale);
    raster.reset_calibration();
    let mask = BinaryMask::from_raster(raster);

    let skeleton = skeleton_of(&mask);

    Ok(Preprocessed {
        mask,
        skeleton,
        threshold,
        removed_particles,
    })
}

/// Remove 8-connected components whose pixel area is below `min_area_px`.
/// Returns the filtered binary image and the number of removed components.
pub fn filter_particles(binary: &GrayImage, min_area_px: f64) -> (GrayImage, usize) {
    let labels = connected_components(binary, Connectivity::Eight, Luma([BACKGROUND]));

    let label_count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut areas = vec![0u64; label_count + 1];
    for pixel in labels.pixels() {
        areas[pixel[0] as usize] += 1;
    }

    let keep: Vec<bool> = areas
        .iter()
        .enumerate()
        .map(|(label, &area)| label != 0 && area as f64 >= min_area_px)
        .collect();
    let removed = (1..=label_count).filter(|&label| !keep[label]).count();

    let (width, height) = binary.dimensions();
    let filtered = GrayImage::from_fn(width, height, |x, y| {
        if keep[labels.get_pixel(x, y)[0] as usize] {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });

    (filtered, removed)
}

/// Duplicate the mask, binarize it again and thin it
pub fn skeleton_of(mask: &BinaryMask) -> Skeleton {
    let duplicate = mask.clone().into_raster();
    let binary = BinaryMask::from_raster(duplicate);
    let thinned = skeletonize(binary.image());
    Skeleton::from_raster(binary.raster().with_image(thinned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Selection;

    fn params(scale_pix: f64, black_roots: bool, root_min_size: f64) -> PreprocessParams {
        PreprocessParams {
            scale_pix,
            scale_cm: 1.0,
            black_roots,
            root_min_size,
        }
    }

    /// Light background with dark squares at the given (x, y, side)
    fn dark_squares(width: u32, height: u32, squares: &[(u32, u32, u32)]) -> DynamicImage {
        let image = GrayImage::from_fn(width, height, |x, y| {
            let inside = squares
                .iter()
                .any(|&(sx, sy, side)| x >= sx && x < sx + side && y >= sy && y < sy + side);
            Luma([if inside { 20 } else { 230 }])
        });
        DynamicImage::ImageLuma8(image)
    }

    #[test]
    fn test_scale_is_pixels_over_cm() {
        assert_eq!(compute_scale(2020.0, 23.5).unwrap(), 2020.0 / 23.5);
        assert!(matches!(compute_scale(100.0, 0.0), Err(RootAnalysisError::Config(_))));
        assert!(compute_scale(-1.0, 2.0).is_err());
    }

    #[test]
    fn test_particle_filter_keeps_only_large_component() {
        // scale 2 px/cm, min size 10 cm² -> 40 px; 4x4 = 16 px goes, 10x10 stays
        let image = dark_squares(60, 40, &[(5, 5, 4), (30, 10, 10)]);
        let out = preprocess(&image, &params(2.0, true, 10.0)).unwrap();

        assert_eq!(out.mask.foreground_count(), 100);
        assert!(!out.mask.is_foreground(6, 6));
        assert!(out.mask.is_foreground(35, 15));
        assert_eq!(out.removed_particles, 1);
    }

    #[test]
    fn test_light_roots_are_inverted() {
        let image = GrayImage::from_fn(30, 30, |x, y| {
            Luma([if (10..20).contains(&x) && (5..25).contains(&y) { 240 } else { 15 }])
        });
        let out = preprocess(&DynamicImage::ImageLuma8(image), &params(1.0, false, 0.0)).unwrap();

        assert_eq!(out.mask.foreground_count(), 200);
        assert!(out.mask.is_foreground(15, 15));
        assert!(!out.mask.is_foreground(2, 2));
    }

    #[test]
    fn test_uniform_image_gives_empty_mask() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 10, Luma([128])));
        let out = preprocess(&image, &params(1.0, true, 0.0)).unwrap();

        assert!(out.mask.is_empty());
        assert_eq!(out.threshold, None);
        assert_eq!(out.skeleton.pixel_count(), 0);
    }

    #[test]
    fn test_skeleton_is_registered_with_mask() {
        let image = dark_squares(50, 30, &[(10, 10, 12)]);
        let out = preprocess(&image, &params(1.0, true, 0.0)).unwrap();

        assert_eq!(out.skeleton.width(), out.mask.width());
        assert_eq!(out.skeleton.height(), out.mask.height());
        assert!(out.skeleton.pixel_count() > 0);
        assert_eq!(out.mask.raster().calibration.unit, "pixel");
    }

    #[test]
    fn test_outputs_start_fully_selected() {
        let image = dark_squares(40, 30, &[(5, 5, 10)]);
        let out = preprocess(&image, &params(1.0, true, 0.0)).unwrap();

        assert_eq!(out.mask.raster().selection(), Selection::full(40, 30));
        assert_eq!(out.skeleton.raster().selection(), Selection::full(40, 30));
    }

    #[test]
    fn test_empty_image_is_a_processing_error() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let result = preprocess(&image, &params(1.0, true, 0.0));

        assert!(matches!(result, Err(RootAnalysisError::ImageProcessing(_))));
    }

    #[test]
    fn test_sixteen_bit_input_is_normalized() {
        let image = image::ImageBuffer::from_fn(20, 20, |x, _| {
            Luma([if x < 5 { 1000u16 } else { 60000u16 }])
        });
        let out = preprocess(&DynamicImage::ImageLuma16(image), &params(1.0, true, 0.0)).unwrap();

        assert_eq!(out.mask.foreground_count(), 100);
    }
}
