// src/extractors/convex_hull.rs - Convex hull area and elliptic Fourier descriptors

use std::f64::consts::PI;

use imageproc::geometry::convex_hull;
use imageproc::point::Point;

use crate::errors::Result;
use crate::raster::BinaryMask;
use crate::record::EfdHarmonic;

use super::{DescriptorExtractor, Descriptors, ExtractionInput};

/// Hull of the root system, optionally with its Fourier outline
pub struct ConvexHullExtractor {
    pub compute_efd: bool,
}

/// Convex hull of the mask, covering whole pixel squares
pub fn mask_hull(mask: &BinaryMask) -> Vec<(i32, i32)> {
    let image = mask.image();
    let mut points = Vec::new();

    for y in 0..image.height() {
        let mut row = (0..image.width()).filter(|&x| image.get_pixel(x, y)[0] != 0);
        let Some(left) = row.next() else {
            continue;
        };
        let right = row.last().unwrap_or(left);
        let (y, left, right) = (y as i32, left as i32, right as i32 + 1);
        points.extend([
            Point::new(left, y),
            Point::new(left, y + 1),
            Point::new(right, y),
            Point::new(right, y + 1),
        ]);
    }

    if points.is_empty() {
        return Vec::new();
    }

    convex_hull(&points[..]).into_iter().map(|p| (p.x, p.y)).collect()
}

/// Shoelace area of a closed polygon
pub fn polygon_area(polygon: &[(i32, i32)]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let twice: i64 = polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(&(x0, y0), &(x1, y1))| x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

/// Kuhl-Giardina elliptic Fourier coefficients of a closed outline.
///
/// `efd` is the harmonic amplitude relative to the first harmonic, so the
/// first harmonic of any non-degenerate outline has `efd == 2`.
pub fn elliptic_fourier(outline: &[(i32, i32)], harmonics: usize) -> Vec<EfdHarmonic> {
    let n = outline.len();
    if n < 3 || harmonics == 0 {
        return Vec::new();
    }

    // segment increments and cumulative arc length
    let mut deltas = Vec::with_capacity(n);
    let mut t = Vec::with_capacity(n + 1);
    t.push(0.0);
    for i in 0..n {
        let (x0, y0) = outline[i];
        let (x1, y1) = outline[(i + 1) % n];
        let (dx, dy) = ((x1 - x0) as f64, (y1 - y0) as f64);
        let dt = (dx * dx + dy * dy).sqrt();
        deltas.push((dx, dy, dt));
        t.push(t[i] + dt);
    }
    let period = t[n];
    if period == 0.0 {
        return Vec::new();
    }

    let mut coefficients = Vec::with_capacity(harmonics);
    for k in 1..=harmonics {
        let kf = k as f64;
        let factor = period / (2.0 * kf * kf * PI * PI);
        let (mut ax, mut bx, mut ay, mut by) = (0.0, 0.0, 0.0, 0.0);
        for (i, &(dx, dy, dt)) in deltas.iter().enumerate() {
            if dt == 0.0 {
                continue;
            }
            let phase_end = 2.0 * kf * PI * t[i + 1] / period;
            let phase_start = 2.0 * kf * PI * t[i] / period;
            let dcos = phase_end.cos() - phase_start.cos();
            let dsin = phase_end.sin() - phase_start.sin();
            ax += dx / dt * dcos;
            bx += dx / dt * dsin;
            ay += dy / dt * dcos;
            by += dy / dt * dsin;
        }
        coefficients.push((factor * ax, factor * ay, factor * bx, factor * by));
    }

    let (ax1, ay1, bx1, by1) = coefficients[0];
    let a_norm = ax1 * ax1 + ay1 * ay1;
    let b_norm = bx1 * bx1 + by1 * by1;
    let ratio = |num: f64, den: f64| if den > 0.0 { (num / den).sqrt() } else { 0.0 };

    coefficients
        .into_iter()
        .enumerate()
        .map(|(i, (ax, ay, bx, by))| EfdHarmonic {
            index: i + 1,
            ax,
            ay,
            bx,
            by,
            efd: ratio(ax * ax + ay * ay, a_norm) + ratio(bx * bx + by * by, b_norm),
        })
        .collect()
}

impl DescriptorExtractor for ConvexHullExtractor {
    fn name(&self) -> &str {
        "convex_hull"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptors> {
        let mut descriptors = Descriptors::default();
        let hull = mask_hull(input.mask);

        descriptors.set("convexhull", polygon_area(&hull) / (input.scale * input.scale));
        if self.compute_efd {
            descriptors.efd = elliptic_fourier(&hull, input.layout.n_efd);
        }
        if !hull.is_empty() {
            descriptors.hull = Some(hull);
        }

        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use crate::extractors::test_support::{fixture, input, rect_mask};
    use crate::record::ColumnLayout;

    #[test]
    fn test_rectangle_hull_area() {
        let (mask, skeleton) = fixture(rect_mask(40, 40, &[(5, 10, 14, 29)], 2.0));
        let d = ConvexHullExtractor { compute_efd: false }
            .extract(&input(&mask, &skeleton, ColumnLayout::default()))
            .unwrap();

        assert_eq!(d.values["convexhull"], 50.0);
        assert!(d.hull.is_some());
        assert!(d.efd.is_empty());
    }

    #[test]
    fn test_hull_spans_separate_parts() {
        // two 2x2 blocks on a diagonal: 5x5 box minus two corner triangles
        let mask = rect_mask(10, 10, &[(0, 0, 1, 1), (3, 3, 4, 4)], 1.0);
        let hull = mask_hull(&mask);

        assert_eq!(polygon_area(&hull), 16.0);
    }

    #[test]
    fn test_efd_first_harmonic_is_reference() {
        let square = vec![(0, 0), (10, 0), (10, 10), (0, 10)];
        let efd = elliptic_fourier(&square, 5);

        assert_eq!(efd.len(), 5);
        assert_eq!(efd[0].index, 1);
        assert_approx_eq!(efd[0].efd, 2.0, 1e-9);
        // a square has no even harmonics
        assert_approx_eq!(efd[1].efd, 0.0, 1e-9);
        assert!(efd[2].efd > 0.0 && efd[2].efd < 1.0);
    }

    #[test]
    fn test_empty_mask_has_no_hull() {
        let (mask, skeleton) = fixture(rect_mask(10, 10, &[], 1.0));
        let d = ConvexHullExtractor { compute_efd: true }
            .extract(&input(&mask, &skeleton, ColumnLayout::default()))
            .unwrap();

        assert_eq!(d.values["convexhull"], 0.0);
        assert!(d.hull.is_none());
        assert!(d.efd.is_empty());
    }
}
