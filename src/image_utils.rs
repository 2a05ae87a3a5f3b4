use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::raster::{BACKGROUND, FOREGROUND};

/// Intensity at or above which a resampled mask pixel counts as foreground
pub const RESAMPLE_THRESHOLD: u8 = 128;

/// Axis-aligned bounding box, inclusive pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// 256-bin intensity histogram
pub fn histogram(image: &GrayImage) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for pixel in image.pixels() {
        hist[pixel[0] as usize] += 1;
    }
    hist
}

/// ImageJ "Default" threshold (iterative intermeans / IsoData variant).
///
/// The two extreme bins are left out of the iteration so saturated
/// background does not drag the means. Returns `None` when the histogram
/// has a single occupied level and no split exists.
pub fn default_threshold_level(hist: &[u64; 256]) -> Option<u8> {
    let lowest = hist.iter().position(|&c| c > 0)?;
    let highest = hist.iter().rposition(|&c| c > 0)?;
    if lowest == highest {
        return None;
    }

    let mut data = *hist;
    data[0] = 0;
    data[255] = 0;

    let mut min = 0usize;
    while data[min] == 0 && min < 255 {
        min += 1;
    }
    let mut max = 255usize;
    while data[max] == 0 && max > 0 {
        max -= 1;
    }

    if min >= max {
        // e.g. an already binary 0/255 image
        return Some(((lowest + highest) / 2) as u8);
    }

    let mut moving_index = min;
    let mut result;
    loop {
        let (mut sum1, mut sum2, mut sum3, mut sum4) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        for (i, &count) in data.iter().enumerate().take(moving_index + 1).skip(min) {
            sum1 += i as f64 * count as f64;
            sum2 += count as f64;
        }
        for (i, &count) in data.iter().enumerate().take(max + 1).skip(moving_index + 1) {
            sum3 += i as f64 * count as f64;
            sum4 += count as f64;
        }
        let low_mean = if sum2 > 0.0 { sum1 / sum2 } else { min as f64 };
        let high_mean = if sum4 > 0.0 { sum3 / sum4 } else { max as f64 };
        result = (low_mean + high_mean) / 2.0;
        moving_index += 1;
        if !((moving_index + 1) as f64 <= result && moving_index < max - 1) {
            break;
        }
    }

    Some(result.round().clamp(0.0, 255.0) as u8)
}

/// Foreground is every pixel at or below `level`
pub fn threshold_dark(image: &GrayImage, level: u8) -> GrayImage {
    map_binary(image, |v| v <= level)
}

/// Foreground is every pixel at or above `level`
pub fn threshold_bright(image: &GrayImage, level: u8) -> GrayImage {
    map_binary(image, |v| v >= level)
}

fn map_binary<F: Fn(u8) -> bool>(image: &GrayImage, is_foreground: F) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if is_foreground(image.get_pixel(x, y)[0]) {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Bounding box of all non-zero pixels, `None` for an empty image
pub fn foreground_bounds(image: &GrayImage) -> Option<BoundingBox> {
    let mut bounds: Option<BoundingBox> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[0] == BACKGROUND {
            continue;
        }
        bounds = Some(match bounds {
            None => BoundingBox { min_x: x, min_y: y, max_x: x, max_y: y },
            Some(b) => BoundingBox {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }
    bounds
}

/// Check if a point is inside the image bounds
#[inline]
pub fn in_bounds(x: i32, y: i32, width: u32, height: u32) -> bool {
    x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height
}

/// Render a binary image as RGB with the given points marked in color
pub fn create_debug_image(
    image: &GrayImage,
    points: &[(u32, u32)],
    color: [u8; 3],
    point_size: u32,
) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut debug_image = RgbImage::from_fn(width, height, |x, y| {
        let v = image.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });

    for &(x, y) in points {
        let radius = point_size / 2;
        for dy in 0..point_size {
            for dx in 0..point_size {
                let px = x.saturating_sub(radius).saturating_add(dx);
                let py = y.saturating_sub(radius).saturating_add(dy);

                if px < width && py < height {
                    debug_image.put_pixel(px, py, Rgb(color));
                }
            }
        }
    }

    debug_image
}
