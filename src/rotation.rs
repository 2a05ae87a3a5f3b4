// src/rotation.rs - Orientation search and solid-of-revolution volume

use std::f64::consts::PI;

use image::{imageops, GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

use crate::config::AngleSearchKind;
use crate::image_utils::{foreground_bounds, threshold_bright, RESAMPLE_THRESHOLD};
use crate::raster::{BinaryMask, CalibratedRaster, Selection, BACKGROUND};

/// Coarse pass: -15° to +15° in 1° steps
pub const COARSE_BEGIN: f64 = -15.0;
pub const COARSE_STEP: f64 = 1.0;
pub const COARSE_END: f64 = 15.0;
/// Fine pass: coarse result to coarse + 1° in 0.1° steps
pub const FINE_SPAN: f64 = 1.0;
pub const FINE_STEP: f64 = 0.1;

/// One evaluated candidate angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSample {
    pub angle: f64,
    pub height: u32,
}

/// Angles visited during one search, in evaluation order
#[derive(Debug, Clone, Default)]
pub struct AngleSearchState {
    pub samples: Vec<AngleSample>,
}

/// Outcome of [`RotationVolumeEstimator::estimate_volume`]
#[derive(Debug, Clone)]
pub struct RotationResult {
    /// Best angle in degrees
    pub angle: f64,
    /// Volume in the mask's calibration unit cubed (pixels after preprocessing)
    pub volume_px: f64,
    /// Volume in physical units cubed
    pub volume: f64,
    pub state: AngleSearchState,
}

/// Strategy that picks an angle in `[begin, end]` given a height measure
pub trait AngleSearch: Send + Sync {
    fn scan(
        &self,
        begin: f64,
        step: f64,
        end: f64,
        measure: &mut dyn FnMut(f64) -> u32,
        state: &mut AngleSearchState,
    ) -> f64;
}

/// Greedy scan: stop at the first angle whose height exceeds the running
/// minimum and return the angle before it. Ties keep scanning.
#[derive(Debug, Clone, Copy, Default)]
pub struct HillClimb;

/// Exhaustive scan returning the first angle with the minimum height
#[derive(Debug, Clone, Copy, Default)]
pub struct FullScan;

/// Candidate angles `begin + i * step` up to and including `end`
fn candidate_angles(begin: f64, step: f64, end: f64) -> impl Iterator<Item = f64> {
    let steps = ((end - begin) / step + 1e-9).floor().max(0.0) as usize;
    (0..=steps).map(move |i| round_angle(begin + i as f64 * step))
}

#[inline]
fn round_angle(angle: f64) -> f64 {
    (angle * 1e6).round() / 1e6
}

impl AngleSearch for HillClimb {
    fn scan(
        &self,
        begin: f64,
        step: f64,
        end: f64,
        measure: &mut dyn FnMut(f64) -> u32,
        state: &mut AngleSearchState,
    ) -> f64 {
        let mut min_height = u32::MAX;
        let mut best = begin;
        for angle in candidate_angles(begin, step, end) {
            let height = measure(angle);
            state.samples.push(AngleSample { angle, height });
            if height > min_height {
                break;
            }
            min_height = height;
            best = angle;
        }
        best
    }
}

impl AngleSearch for FullScan {
    fn scan(
        &self,
        begin: f64,
        step: f64,
        end: f64,
        measure: &mut dyn FnMut(f64) -> u32,
        state: &mut AngleSearchState,
    ) -> f64 {
        let mut min_height = u32::MAX;
        let mut best = begin;
        for angle in candidate_angles(begin, step, end) {
            let height = measure(angle);
            state.samples.push(AngleSample { angle, height });
            if height < min_height {
                min_height = height;
                best = angle;
            }
        }
        best
    }
}

/// Rotate clockwise by `angle_deg` on a canvas grown to the rotated
/// bounding box (centred, zero fill), bilinear interpolation.
pub fn rotate_expanded(image: &GrayImage, angle_deg: f64) -> GrayImage {
    let (width, height) = image.dimensions();
    let theta = angle_deg.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let rotated_w = (width as f64 * cos + height as f64 * sin).ceil() as u32;
    let rotated_h = (width as f64 * sin + height as f64 * cos).ceil() as u32;
    let canvas_w = rotated_w.max(width);
    let canvas_h = rotated_h.max(height);

    let mut canvas = GrayImage::from_pixel(canvas_w, canvas_h, Luma([BACKGROUND]));
    imageops::replace(
        &mut canvas,
        image,
        ((canvas_w - width) / 2) as i64,
        ((canvas_h - height) / 2) as i64,
    );

    rotate_about_center(&canvas, theta as f32, Interpolation::Bilinear, Luma([BACKGROUND]))
}

/// Height of the foreground bounding box after rotating by `angle_deg`
pub fn rotated_height(image: &GrayImage, angle_deg: f64) -> u32 {
    let rotated = threshold_bright(&rotate_expanded(image, angle_deg), RESAMPLE_THRESHOLD);
    foreground_bounds(&rotated).map(|b| b.height()).unwrap_or(0)
}

/// Horizontal foreground extent of a row: span from the leftmost to the
/// rightmost foreground pixel, inclusive. 0 for an empty row.
pub fn row_extent(image: &GrayImage, y: u32) -> u32 {
    let width = image.width();
    let left = (0..width).find(|&x| image.get_pixel(x, y)[0] != BACKGROUND);
    let right = (0..width).rev().find(|&x| image.get_pixel(x, y)[0] != BACKGROUND);
    match (left, right) {
        (Some(l), Some(r)) => r - l + 1,
        _ => 0,
    }
}

/// Stack of circular cross-sections: each row contributes `π·(n/2)²`
/// where `n` is its extent, scaled by the raster's pixel size.
pub fn volume_from_extents(raster: &CalibratedRaster) -> f64 {
    let pixel_width = raster.calibration.pixel_width;
    let pixel_height = raster.calibration.pixel_height;
    (0..raster.height())
        .map(|y| {
            let diameter = row_extent(&raster.image, y) as f64 * pixel_width;
            PI * (diameter / 2.0).powi(2) * pixel_height
        })
        .sum()
}

/// Mask cropped to its foreground bounding box
fn cropped_foreground(mask: &BinaryMask) -> GrayImage {
    let mut raster = mask.raster().clone();
    if let Some(b) = foreground_bounds(&raster.image) {
        raster.set_selection(Selection {
            x: b.min_x,
            y: b.min_y,
            width: b.width(),
            height: b.height(),
        });
    }
    raster.selected()
}

/// Finds the orientation minimizing bounding-box height and estimates volume
pub struct RotationVolumeEstimator {
    strategy: Box<dyn AngleSearch>,
}

impl Default for RotationVolumeEstimator {
    fn default() -> Self {
        Self::new(AngleSearchKind::HillClimb)
    }
}

impl RotationVolumeEstimator {
    pub fn new(kind: AngleSearchKind) -> Self {
        let strategy: Box<dyn AngleSearch> = match kind {
            AngleSearchKind::HillClimb => Box::new(HillClimb),
            AngleSearchKind::FullScan => Box::new(FullScan),
        };
        Self { strategy }
    }

    pub fn with_strategy(strategy: Box<dyn AngleSearch>) -> Self {
        Self { strategy }
    }

    /// Coarse pass then fine pass; pure function of the mask
    pub fn best_angle(&self, mask: &BinaryMask) -> (f64, AngleSearchState) {
        let image = cropped_foreground(mask);
        let mut measure = |angle: f64| rotated_height(&image, angle);
        let mut state = AngleSearchState::default();

        let coarse = self
            .strategy
            .scan(COARSE_BEGIN, COARSE_STEP, COARSE_END, &mut measure, &mut state);
        let fine = self
            .strategy
            .scan(coarse, FINE_STEP, coarse + FINE_SPAN, &mut measure, &mut state);

        debug!(
            "best angle {:.1} (coarse {:.0}, {} candidates)",
            fine,
            coarse,
            state.samples.len()
        );
        (fine, state)
    }

    /// Rotate by the best angle and integrate the row extents
    pub fn estimate_volume(&self, mask: &BinaryMask) -> RotationResult {
        let (angle, state) = self.best_angle(mask);

        let rotated = rotate_expanded(mask.image(), angle);
        let rotated = threshold_bright(&rotated, RESAMPLE_THRESHOLD);
        let raster = mask.raster().with_image(rotated);
        let volume_px = volume_from_extents(&raster);
        let volume = volume_px / mask.scale().powi(3);

        RotationResult {
            angle,
            volume_px,
            volume,
            state,
        }
    }
}
