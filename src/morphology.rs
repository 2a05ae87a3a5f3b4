// src/morphology.rs - Thinning, distance map and skeleton topology helpers

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

use crate::image_utils::in_bounds;
use crate::raster::{BACKGROUND, FOREGROUND};

/// Distance map: per pixel Euclidean distance to the nearest background pixel
pub type DistanceMap = ImageBuffer<Luma<f64>, Vec<f64>>;

/// Neighbour offsets P2..P9, clockwise starting north
static NEIGHBOURS: [(i32, i32); 8] = [
    (0, -1),  // P2 north
    (1, -1),  // P3 north-east
    (1, 0),   // P4 east
    (1, 1),   // P5 south-east
    (0, 1),   // P6 south
    (-1, 1),  // P7 south-west
    (-1, 0),  // P8 west
    (-1, -1), // P9 north-west
];

#[inline]
fn is_set(image: &GrayImage, x: i32, y: i32) -> bool {
    let (width, height) = image.dimensions();
    in_bounds(x, y, width, height) && image.get_pixel(x as u32, y as u32)[0] != BACKGROUND
}

fn neighbourhood(image: &GrayImage, x: u32, y: u32) -> [bool; 8] {
    let mut n = [false; 8];
    for (i, &(dx, dy)) in NEIGHBOURS.iter().enumerate() {
        n[i] = is_set(image, x as i32 + dx, y as i32 + dy);
    }
    n
}

/// Zhang-Suen thinning. Non-zero input pixels are foreground; the output
/// is 255 on the skeleton and 0 elsewhere, same dimensions as the input.
pub fn skeletonize(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut current = GrayImage::from_fn(width, height, |x, y| {
        if image.get_pixel(x, y)[0] != BACKGROUND {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });

    let mut to_clear = Vec::new();
    loop {
        let mut changed = false;

        for pass in 0..2 {
            to_clear.clear();
            for y in 0..height {
                for x in 0..width {
                    if current.get_pixel(x, y)[0] == BACKGROUND {
                        continue;
                    }
                    let n = neighbourhood(&current, x, y);
                    let count = n.iter().filter(|&&v| v).count();
                    if !(2..=6).contains(&count) {
                        continue;
                    }
                    let transitions = (0..8).filter(|&i| !n[i] && n[(i + 1) % 8]).count();
                    if transitions != 1 {
                        continue;
                    }
                    // n[0]=P2 n[2]=P4 n[4]=P6 n[6]=P8
                    let removable = if pass == 0 {
                        !(n[0] && n[2] && n[4]) && !(n[2] && n[4] && n[6])
                    } else {
                        !(n[0] && n[2] && n[6]) && !(n[0] && n[4] && n[6])
                    };
                    if removable {
                        to_clear.push((x, y));
                    }
                }
            }
            for &(x, y) in &to_clear {
                current.put_pixel(x, y, Luma([BACKGROUND]));
            }
            changed |= !to_clear.is_empty();
        }

        if !changed {
            break;
        }
    }

    current
}

/// Number of 8-connected foreground neighbours of a pixel
pub fn neighbour_count(image: &GrayImage, x: u32, y: u32) -> usize {
    neighbourhood(image, x, y).iter().filter(|&&v| v).count()
}

/// Skeleton end points (tips): foreground pixels with exactly one neighbour
pub fn find_end_points(skeleton: &GrayImage) -> Vec<(u32, u32)> {
    skeleton
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] != BACKGROUND)
        .filter(|&(x, y, _)| neighbour_count(skeleton, x, y) == 1)
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// Euclidean distance map of the foreground (distance to the nearest
/// background pixel). A mask without background saturates at the image
/// diagonal.
pub fn distance_map(mask: &GrayImage) -> DistanceMap {
    let (width, height) = mask.dimensions();
    let background = GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] == BACKGROUND {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });

    let diagonal = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt();
    let squared = euclidean_squared_distance_transform(&background);
    ImageBuffer::from_fn(width, height, |x, y| {
        let d = squared.get_pixel(x, y)[0].sqrt();
        Luma([if d.is_finite() { d.min(diagonal) } else { diagonal }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_rect(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if x >= x0 && x <= x1 && y >= y0 && y <= y1 {
                Luma([FOREGROUND])
            } else {
                Luma([BACKGROUND])
            }
        })
    }

    #[test]
    fn test_skeleton_of_bar_is_thin_and_registered() {
        let bar = filled_rect(40, 20, 5, 7, 34, 13);
        let skeleton = skeletonize(&bar);

        assert_eq!(skeleton.dimensions(), bar.dimensions());
        // Away from the ends the bar thins down to its centre row
        for x in 12..=27 {
            let rows: Vec<u32> = (0..20)
                .filter(|&y| skeleton.get_pixel(x, y)[0] == FOREGROUND)
                .collect();
            assert_eq!(rows, vec![10], "column {}", x);
        }
    }

    #[test]
    fn test_skeleton_never_adds_pixels() {
        let blob = filled_rect(16, 16, 3, 3, 12, 12);
        let skeleton = skeletonize(&blob);

        for (x, y, p) in skeleton.enumerate_pixels() {
            if p[0] == FOREGROUND {
                assert_eq!(blob.get_pixel(x, y)[0], FOREGROUND);
            }
        }
    }

    #[test]
    fn test_end_points_of_a_line() {
        let line = filled_rect(12, 5, 2, 2, 9, 2);
        let tips = find_end_points(&line);

        assert_eq!(tips, vec![(2, 2), (9, 2)]);
    }

    #[test]
    fn test_distance_map_centre_of_bar() {
        let bar = filled_rect(21, 21, 0, 5, 20, 15);
        let edm = distance_map(&bar);

        assert_eq!(edm.get_pixel(10, 10)[0], 6.0);
        assert_eq!(edm.get_pixel(10, 0)[0], 0.0);
    }
}
