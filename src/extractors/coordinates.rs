// src/extractors/coordinates.rs - Boundary coordinates at regular depths

use crate::errors::Result;
use crate::record::ShapeTrace;

use super::{DescriptorExtractor, Descriptors, ExtractionInput};

/// Left and right root-system boundary sampled at `n_coord` depths
pub struct CoordinatesExtractor;

/// Sampled row of sample `index` when `height` rows from `top` are split into `count` samples
fn sample_row(top: u32, height: u32, count: usize, index: usize) -> u32 {
    top + ((index as f64 + 0.5) * height as f64 / count as f64).floor() as u32
}

impl DescriptorExtractor for CoordinatesExtractor {
    fn name(&self) -> &str {
        "coordinates"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptors> {
        let mut descriptors = Descriptors::default();
        let n = input.layout.n_coord;
        let scale = input.scale;
        let image = input.mask.image();

        let Some(bounds) = input.origin.bounds else {
            for i in 0..n * 2 {
                descriptors.set(format!("coord_x{}", i), 0.0);
            }
            for i in 0..n {
                descriptors.set(format!("diff_x{}", i), 0.0);
                descriptors.set(format!("cumul_x{}", i), 0.0);
            }
            return Ok(descriptors);
        };

        let mut lefts = Vec::with_capacity(n);
        let mut rights = Vec::with_capacity(n);
        let mut depths = Vec::with_capacity(n);

        for i in 0..n {
            let y = sample_row(bounds.min_y, bounds.height(), n, i).min(bounds.max_y);
            let mut row = (bounds.min_x..=bounds.max_x).filter(|&x| image.get_pixel(x, y)[0] != 0);
            // a row crossing a gap collapses onto the origin
            let (left, right) = match row.next() {
                Some(first) => {
                    let last = row.last().unwrap_or(first);
                    (first as f64, last as f64 + 1.0)
                }
                None => (input.origin.x, input.origin.x),
            };
            lefts.push((left - input.origin.x) / scale);
            rights.push((right - input.origin.x) / scale);
            depths.push((y as f64 + 0.5 - input.origin.y) / scale);
        }

        for (i, x) in lefts.iter().chain(rights.iter()).enumerate() {
            descriptors.set(format!("coord_x{}", i), *x);
        }

        let mut previous = 0.0;
        let mut cumulative = 0.0;
        for i in 0..n {
            let width = rights[i] - lefts[i];
            cumulative += width;
            descriptors.set(format!("diff_x{}", i), width - previous);
            descriptors.set(format!("cumul_x{}", i), cumulative);
            previous = width;
        }

        // outline order: down the left side, back up the right side
        let mut shape = ShapeTrace::default();
        shape.x.extend(lefts.iter().copied());
        shape.y.extend(depths.iter().copied());
        shape.x.extend(rights.iter().rev().copied());
        shape.y.extend(depths.iter().rev().copied());
        descriptors.shape = Some(shape);

        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::test_support::{fixture, input, rect_mask};
    use crate::record::ColumnLayout;

    #[test]
    fn test_rectangle_coordinates() {
        let (mask, skeleton) = fixture(rect_mask(40, 40, &[(5, 10, 14, 29)], 1.0));
        let layout = ColumnLayout { n_coord: 2, ..ColumnLayout::default() };
        let d = CoordinatesExtractor.extract(&input(&mask, &skeleton, layout)).unwrap();
        let v = &d.values;

        assert_eq!(v["coord_x0"], -5.0);
        assert_eq!(v["coord_x1"], -5.0);
        assert_eq!(v["coord_x2"], 5.0);
        assert_eq!(v["coord_x3"], 5.0);
        assert_eq!(v["diff_x0"], 10.0);
        assert_eq!(v["diff_x1"], 0.0);
        assert_eq!(v["cumul_x1"], 20.0);

        let shape = d.shape.unwrap();
        assert_eq!(shape.x, vec![-5.0, -5.0, 5.0, 5.0]);
        assert_eq!(shape.y, vec![5.5, 15.5, 15.5, 5.5]);
    }

    #[test]
    fn test_widening_root() {
        // narrow top half, wide bottom half
        let (mask, skeleton) = fixture(rect_mask(40, 40, &[(18, 0, 21, 9), (10, 10, 29, 19)], 2.0));
        let layout = ColumnLayout { n_coord: 2, ..ColumnLayout::default() };
        let d = CoordinatesExtractor.extract(&input(&mask, &skeleton, layout)).unwrap();

        assert_eq!(d.values["diff_x0"], 2.0);
        assert_eq!(d.values["diff_x1"], 8.0);
        assert_eq!(d.values["cumul_x1"], 12.0);
    }

    #[test]
    fn test_sample_rows_stay_in_bounds() {
        let rows: Vec<u32> = (0..4).map(|i| sample_row(10, 8, 4, i)).collect();
        assert_eq!(rows, vec![11, 13, 15, 17]);
    }
}
