// src/extractors/geometry.rs - Extent, centre of mass, density envelopes, directionality

use image::GrayImage;
use nalgebra::{Matrix2, SymmetricEigen};

use crate::errors::Result;

use super::{DescriptorExtractor, Descriptors, ExtractionInput};

/// Scale factors of the density ellipses
const ELLIPSE_FACTORS: [(f64, &str); 4] = [
    (0.25, "ellips_025"),
    (0.50, "ellips_050"),
    (0.75, "ellips_075"),
    (1.00, "ellips_100"),
];

/// Depth fractions of the density rectangles
const RECT_FACTORS: [(f64, &str); 4] = [
    (0.2, "rect_020"),
    (0.4, "rect_040"),
    (0.6, "rect_060"),
    (0.8, "rect_080"),
];

/// Bounding-box geometry of the root system
pub struct GeometryExtractor;

/// Principal axis of the foreground pixels, in degrees from vertical
/// (0 = vertical, 90 = horizontal)
pub fn directionality(image: &GrayImage) -> f64 {
    let points: Vec<(f64, f64)> = image
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] != 0)
        .map(|(x, y, _)| (x as f64, y as f64))
        .collect();

    if points.len() < 2 {
        return 0.0;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in &points {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let eigen = SymmetricEigen::new(Matrix2::new(sxx / n, sxy / n, sxy / n, syy / n));
    let major = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] { 0 } else { 1 };
    let axis = eigen.eigenvectors.column(major);

    axis[0].abs().atan2(axis[1].abs()).to_degrees()
}

impl DescriptorExtractor for GeometryExtractor {
    fn name(&self) -> &str {
        "geometry"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptors> {
        let mut descriptors = Descriptors::default();
        let scale = input.scale;

        let Some(bounds) = input.origin.bounds else {
            let names = [
                "width",
                "depth",
                "width_depth_ratio",
                "com_x",
                "com_y",
                "directionality",
            ];
            for name in names {
                descriptors.set(name, 0.0);
            }
            for (_, name) in ELLIPSE_FACTORS.iter().chain(RECT_FACTORS.iter()) {
                descriptors.set(*name, 0.0);
            }
            return Ok(descriptors);
        };

        let (bw, bh) = (bounds.width() as f64, bounds.height() as f64);
        let (left, top) = (bounds.min_x as f64, bounds.min_y as f64);
        let (com_x, com_y) = input.origin.center_of_mass;

        descriptors.set("width", bw / scale);
        descriptors.set("depth", bh / scale);
        descriptors.set("width_depth_ratio", bw / bh);
        descriptors.set("com_x", (com_x - left) / bw);
        descriptors.set("com_y", (com_y - top) / bh);

        let (cx, cy) = (left + bw / 2.0, top + bh / 2.0);
        let (semi_x, semi_y) = (bw / 2.0, bh / 2.0);

        let mut total = 0u64;
        let mut in_ellipse = [0u64; 4];
        let mut in_rect = [0u64; 4];
        for (x, y, pixel) in input.mask.image().enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            total += 1;
            let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
            for (i, (factor, _)) in ELLIPSE_FACTORS.iter().enumerate() {
                let ex = (px - cx) / (semi_x * factor);
                let ey = (py - cy) / (semi_y * factor);
                if ex * ex + ey * ey <= 1.0 {
                    in_ellipse[i] += 1;
                }
            }
            for (i, (factor, _)) in RECT_FACTORS.iter().enumerate() {
                if (y as f64) < top + factor * bh {
                    in_rect[i] += 1;
                }
            }
        }

        for (i, (_, name)) in ELLIPSE_FACTORS.iter().enumerate() {
            descriptors.set(*name, in_ellipse[i] as f64 / total as f64);
        }
        for (i, (_, name)) in RECT_FACTORS.iter().enumerate() {
            descriptors.set(*name, in_rect[i] as f64 / total as f64);
        }

        descriptors.set("directionality", directionality(input.skeleton.image()));

        Ok(descriptors)
    }
}
