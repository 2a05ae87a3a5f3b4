// src/raster.rs - Calibrated 8-bit rasters, binary masks and skeletons

use image::{imageops, GrayImage};

/// Foreground intensity of masks and skeletons
pub const FOREGROUND: u8 = 255;
/// Background intensity of masks and skeletons
pub const BACKGROUND: u8 = 0;

/// Spatial calibration attached to a raster
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub unit: String,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl Default for Calibration {
    /// Pixel space: unit "pixel", 1x1 pixels
    fn default() -> Self {
        Self {
            unit: "pixel".to_string(),
            pixel_width: 1.0,
            pixel_height: 1.0,
        }
    }
}

/// Rectangular selection in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Selection {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// An 8-bit grayscale image plus its pixel-to-physical scale
#[derive(Debug, Clone)]
pub struct CalibratedRaster {
    pub image: GrayImage,
    /// Pixels per physical length unit, always > 0
    pub scale: f64,
    pub calibration: Calibration,
    selection: Selection,
}

impl CalibratedRaster {
    pub fn new(image: GrayImage, scale: f64) -> Self {
        let selection = Selection::full(image.width(), image.height());
        Self {
            image,
            scale,
            calibration: Calibration::default(),
            selection,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Restrict the selection; clamped to the image bounds
    pub fn set_selection(&mut self, selection: Selection) {
        let x = selection.x.min(self.width());
        let y = selection.y.min(self.height());
        self.selection = Selection {
            x,
            y,
            width: selection.width.min(self.width() - x),
            height: selection.height.min(self.height() - y),
        };
    }

    /// Reset the selection to the full image bounds
    pub fn select_all(&mut self) {
        self.selection = Selection::full(self.width(), self.height());
    }

    /// Pixels inside the current selection
    pub fn selected(&self) -> GrayImage {
        let Selection { x, y, width, height } = self.selection;
        imageops::crop_imm(&self.image, x, y, width, height).to_image()
    }

    /// Discard any calibration and go back to pixel space
    pub fn reset_calibration(&mut self) {
        self.calibration = Calibration::default();
    }

    /// Replace the pixel buffer, keeping scale and calibration
    pub fn with_image(&self, image: GrayImage) -> Self {
        let mut raster = Self::new(image, self.scale);
        raster.calibration = self.calibration.clone();
        raster
    }
}

/// Root mask: 255 for root pixels, 0 for background
#[derive(Debug, Clone)]
pub struct BinaryMask {
    raster: CalibratedRaster,
}

impl BinaryMask {
    /// Wrap a raster; any non-zero pixel becomes foreground
    pub fn from_raster(mut raster: CalibratedRaster) -> Self {
        for pixel in raster.image.pixels_mut() {
            pixel[0] = if pixel[0] > 0 { FOREGROUND } else { BACKGROUND };
        }
        Self { raster }
    }

    pub fn raster(&self) -> &CalibratedRaster {
        &self.raster
    }

    pub fn image(&self) -> &GrayImage {
        &self.raster.image
    }

    pub fn scale(&self) -> f64 {
        self.raster.scale
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    #[inline]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.raster.image.get_pixel(x, y)[0] == FOREGROUND
    }

    pub fn foreground_count(&self) -> u64 {
        self.raster.image.pixels().filter(|p| p[0] == FOREGROUND).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.foreground_count() == 0
    }

    pub fn into_raster(self) -> CalibratedRaster {
        self.raster
    }
}

/// One pixel wide thinning of a [`BinaryMask`], registered with it
#[derive(Debug, Clone)]
pub struct Skeleton {
    raster: CalibratedRaster,
}

impl Skeleton {
    pub(crate) fn from_raster(raster: CalibratedRaster) -> Self {
        Self { raster }
    }

    pub fn raster(&self) -> &CalibratedRaster {
        &self.raster
    }

    pub fn image(&self) -> &GrayImage {
        &self.raster.image
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    #[inline]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.raster.image.get_pixel(x, y)[0] == FOREGROUND
    }

    pub fn pixel_count(&self) -> u64 {
        self.raster.image.pixels().filter(|p| p[0] == FOREGROUND).count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_selection_is_clamped_and_reset() {
        let mut raster = CalibratedRaster::new(GrayImage::new(10, 8), 2.0);
        raster.set_selection(Selection { x: 6, y: 2, width: 20, height: 3 });

        assert_eq!(raster.selection(), Selection { x: 6, y: 2, width: 4, height: 3 });

        raster.select_all();
        assert_eq!(raster.selection(), Selection::full(10, 8));
    }

    #[test]
    fn test_selected_crops_to_selection() {
        let image = GrayImage::from_fn(6, 4, |x, y| Luma([(10 * y + x) as u8]));
        let mut raster = CalibratedRaster::new(image, 1.0);
        raster.set_selection(Selection { x: 2, y: 1, width: 3, height: 2 });

        let selected = raster.selected();

        assert_eq!(selected.dimensions(), (3, 2));
        assert_eq!(selected.get_pixel(0, 0)[0], 12);
        assert_eq!(selected.get_pixel(2, 1)[0], 24);

        raster.select_all();
        assert_eq!(raster.selected().dimensions(), (6, 4));
    }

    #[test]
    fn test_mask_from_raster_binarizes() {
        let mut image = GrayImage::new(3, 1);
        image.put_pixel(0, 0, Luma([0]));
        image.put_pixel(1, 0, Luma([1]));
        image.put_pixel(2, 0, Luma([200]));

        let mask = BinaryMask::from_raster(CalibratedRaster::new(image, 1.0));

        assert!(!mask.is_foreground(0, 0));
        assert!(mask.is_foreground(1, 0));
        assert!(mask.is_foreground(2, 0));
        assert_eq!(mask.foreground_count(), 2);
    }

    #[test]
    fn test_reset_calibration_goes_back_to_pixels() {
        let mut raster = CalibratedRaster::new(GrayImage::new(2, 2), 5.0);
        raster.calibration = Calibration {
            unit: "cm".to_string(),
            pixel_width: 0.2,
            pixel_height: 0.2,
        };

        raster.reset_calibration();

        assert_eq!(raster.calibration, Calibration::default());
        assert_eq!(raster.scale, 5.0);
    }
}
