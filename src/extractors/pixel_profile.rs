// src/extractors/pixel_profile.rs - Skeleton crossing counts per row and column

use image::GrayImage;

use crate::errors::Result;
use crate::image_utils::BoundingBox;

use super::{band_rows, mean, DescriptorExtractor, Descriptors, ExtractionInput};

/// Horizontal and vertical crossing profiles of the skeleton
pub struct PixelProfileExtractor;

/// Number of foreground runs along row `y` between columns `x0..=x1`
fn row_crossings(image: &GrayImage, y: u32, x0: u32, x1: u32) -> u32 {
    let mut runs = 0;
    let mut inside = false;
    for x in x0..=x1 {
        let on = image.get_pixel(x, y)[0] != 0;
        if on && !inside {
            runs += 1;
        }
        inside = on;
    }
    runs
}

/// Number of foreground runs along column `x` between rows `y0..=y1`
fn column_crossings(image: &GrayImage, x: u32, y0: u32, y1: u32) -> u32 {
    let mut runs = 0;
    let mut inside = false;
    for y in y0..=y1 {
        let on = image.get_pixel(x, y)[0] != 0;
        if on && !inside {
            runs += 1;
        }
        inside = on;
    }
    runs
}

/// (mean, max) of a crossing series, zeros when empty
fn summarize(counts: &[u32]) -> (f64, f64) {
    let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    let max = counts.iter().copied().max().unwrap_or(0) as f64;
    (mean(&values), max)
}

impl DescriptorExtractor for PixelProfileExtractor {
    fn name(&self) -> &str {
        "pixel_profile"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptors> {
        let mut descriptors = Descriptors::default();
        let n_slices = input.layout.n_slices;
        let skeleton = input.skeleton.image();

        let Some(BoundingBox { min_x, min_y, max_x, max_y }) = input.origin.bounds else {
            for i in 0..n_slices {
                descriptors.set(format!("cross_hori_{}_mean", i), 0.0);
                descriptors.set(format!("cross_hori_{}_max", i), 0.0);
            }
            descriptors.set("cross_vert_mean", 0.0);
            descriptors.set("cross_vert_max", 0.0);
            return Ok(descriptors);
        };

        let height = max_y - min_y + 1;
        for i in 0..n_slices {
            let (start, end) = band_rows(min_y, height, n_slices, i);
            let counts: Vec<u32> = (start..end)
                .map(|y| row_crossings(skeleton, y, min_x, max_x))
                .collect();
            let (band_mean, band_max) = summarize(&counts);
            descriptors.set(format!("cross_hori_{}_mean", i), band_mean);
            descriptors.set(format!("cross_hori_{}_max", i), band_max);
        }

        let counts: Vec<u32> = (min_x..=max_x)
            .map(|x| column_crossings(skeleton, x, min_y, max_y))
            .collect();
        let (vert_mean, vert_max) = summarize(&counts);
        descriptors.set("cross_vert_mean", vert_mean);
        descriptors.set("cross_vert_max", vert_max);

        Ok(descriptors)
    }
}
