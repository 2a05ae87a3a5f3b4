// src/extractors/depth_profile.rs - Area, length and density per depth band

use image::GrayImage;

use crate::errors::Result;
use crate::record::DepthProfile;

use super::{band_rows, DescriptorExtractor, Descriptors, ExtractionInput};

/// Splits the root system into `n_slices` horizontal bands
pub struct DepthProfileExtractor;

fn count_rows(image: &GrayImage, start: u32, end: u32) -> u64 {
    (start..end)
        .map(|y| (0..image.width()).filter(|&x| image.get_pixel(x, y)[0] != 0).count() as u64)
        .sum()
}

impl DescriptorExtractor for DepthProfileExtractor {
    fn name(&self) -> &str {
        "depth_profile"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptors> {
        let n_slices = input.layout.n_slices;
        let scale = input.scale;
        let mut profile = DepthProfile::default();

        match input.origin.bounds {
            None => {
                profile.area = vec![0.0; n_slices];
                profile.length = vec![0.0; n_slices];
                profile.density = vec![0.0; n_slices];
            }
            Some(bounds) => {
                let band_width = bounds.width() as f64;
                for i in 0..n_slices {
                    let (start, end) = band_rows(bounds.min_y, bounds.height(), n_slices, i);
                    let area_px = count_rows(input.mask.image(), start, end);
                    let length_px = count_rows(input.skeleton.image(), start, end);
                    let band_area = (end - start) as f64 * band_width;

                    profile.area.push(area_px as f64 / (scale * scale));
                    profile.length.push(length_px as f64 / scale);
                    let density = if band_area > 0.0 {
                        area_px as f64 / band_area
                    } else {
                        0.0
                    };
                    profile.density.push(density);
                }
            }
        }

        Ok(Descriptors {
            depth_profile: Some(profile),
            ..Descriptors::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use crate::extractors::test_support::{fixture, input, rect_mask};
    use crate::record::ColumnLayout;

    #[test]
    fn test_bands_of_a_tapering_root() {
        // 10 rows 20 px wide over 10 rows 10 px wide
        let (mask, skeleton) = fixture(rect_mask(30, 30, &[(0, 0, 19, 9), (5, 10, 14, 19)], 1.0));
        let layout = ColumnLayout { n_slices: 2, ..ColumnLayout::default() };
        let d = DepthProfileExtractor.extract(&input(&mask, &skeleton, layout)).unwrap();
        let profile = d.depth_profile.unwrap();

        assert_eq!(profile.area, vec![200.0, 100.0]);
        assert_approx_eq!(profile.density[0], 1.0);
        assert_approx_eq!(profile.density[1], 0.5);
        assert_eq!(profile.length.len(), 2);
        assert!(profile.length.iter().all(|&l| l > 0.0));
    }

    #[test]
    fn test_empty_mask_gives_zero_profile() {
        let (mask, skeleton) = fixture(rect_mask(10, 10, &[], 1.0));
        let layout = ColumnLayout { n_slices: 3, ..ColumnLayout::default() };
        let d = DepthProfileExtractor.extract(&input(&mask, &skeleton, layout)).unwrap();

        assert_eq!(d.depth_profile.unwrap().area, vec![0.0; 3]);
        assert!(d.values.is_empty());
    }
}
