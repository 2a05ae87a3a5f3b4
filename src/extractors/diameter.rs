// src/extractors/diameter.rs - Root diameters from the distance map along the skeleton

use crate::errors::Result;
use crate::morphology::distance_map;

use super::{mean, DescriptorExtractor, Descriptors, ExtractionInput};

/// `diam_max`, `diam_mean`, `diam_mode` in physical units
pub struct DiameterExtractor;

/// Most frequent value when binned to whole pixels; smallest bin on ties
fn mode(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let max = values.iter().cloned().fold(0.0f64, f64::max);
    let mut bins = vec![0usize; max.floor() as usize + 1];
    for v in values {
        bins[v.floor() as usize] += 1;
    }
    let (best, _) = bins
        .iter()
        .enumerate()
        .fold((0usize, 0usize), |(bi, bc), (i, &c)| if c > bc { (i, c) } else { (bi, bc) });
    best as f64
}

impl DescriptorExtractor for DiameterExtractor {
    fn name(&self) -> &str {
        "diameter"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptors> {
        let edm = distance_map(input.mask.image());

        let diameters: Vec<f64> = input
            .skeleton
            .image()
            .enumerate_pixels()
            .filter(|(x, y, p)| p[0] != 0 && input.mask.is_foreground(*x, *y))
            .map(|(x, y, _)| 2.0 * edm.get_pixel(x, y)[0])
            .collect();

        let max = diameters.iter().cloned().fold(0.0f64, f64::max);

        let mut descriptors = Descriptors::default();
        descriptors.set("diam_max", max / input.scale);
        descriptors.set("diam_mean", mean(&diameters) / input.scale);
        descriptors.set("diam_mode", mode(&diameters) / input.scale);
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::test_support::{fixture, input, rect_mask};
    use crate::record::ColumnLayout;

    #[test]
    fn test_mode_picks_most_frequent_bin() {
        assert_eq!(mode(&[2.0, 2.5, 4.0, 4.1, 4.9, 9.0]), 4.0);
        assert_eq!(mode(&[]), 0.0);
    }

    #[test]
    fn test_bar_diameter_matches_thickness() {
        // 11 px thick horizontal bar, scale 2 px per unit
        let (mask, skeleton) = fixture(rect_mask(80, 40, &[(5, 10, 74, 20)], 2.0));
        let d = DiameterExtractor
            .extract(&input(&mask, &skeleton, ColumnLayout::default()))
            .unwrap();

        // centre row sits 6 px from the background: 12 px = 6 units
        assert_eq!(d.values["diam_mode"], 6.0);
        assert!(d.values["diam_max"] >= d.values["diam_mean"]);
        assert!(d.values["diam_mean"] > 0.0);
    }

    #[test]
    fn test_empty_mask_reports_zero() {
        let (mask, skeleton) = fixture(rect_mask(10, 10, &[], 1.0));
        let d = DiameterExtractor
            .extract(&input(&mask, &skeleton, ColumnLayout::default()))
            .unwrap();

        assert_eq!(d.values["diam_max"], 0.0);
        assert_eq!(d.values["diam_mean"], 0.0);
    }
}
