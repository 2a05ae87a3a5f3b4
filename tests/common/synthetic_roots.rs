use image::{GrayImage, Luma};

/// Dark branching root on a light background: a taproot with two laterals
pub fn branched_root(width: u32, height: u32, tap_x: u32) -> GrayImage {
    let mut image = GrayImage::from_pixel(width, height, Luma([225]));
    let mut paint = |x: u32, y: u32| {
        if x < width && y < height {
            image.put_pixel(x, y, Luma([25]));
        }
    };

    for y in 4..height - 4 {
        for dx in 0..4 {
            paint(tap_x + dx, y);
        }
    }
    for i in 0..width / 3 {
        for t in 0..3 {
            paint(tap_x + 4 + i, height / 3 + i / 2 + t);
            paint(tap_x.saturating_sub(i + 1), height / 2 + i / 2 + t);
        }
    }

    image
}
