// src/extractors/mod.rs - Descriptor extractor trait and the default set

use std::collections::BTreeMap;

use tracing::warn;

use crate::errors::Result;
use crate::image_utils::{foreground_bounds, BoundingBox};
use crate::raster::{BinaryMask, Skeleton};
use crate::record::{ColumnLayout, DepthProfile, EfdHarmonic, ImageRecord, ShapeTrace};

pub mod convex_hull;
pub mod coordinates;
pub mod depth_profile;
pub mod diameter;
pub mod geometry;
pub mod pixel_profile;
pub mod tissue;

pub use convex_hull::ConvexHullExtractor;
pub use coordinates::CoordinatesExtractor;
pub use depth_profile::DepthProfileExtractor;
pub use diameter::DiameterExtractor;
pub use geometry::GeometryExtractor;
pub use pixel_profile::PixelProfileExtractor;
pub use tissue::TissueExtractor;

/// Reference point of a root system, from moment analysis of the mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceOrigin {
    /// Centre-of-mass x, pixels
    pub x: f64,
    /// Top of the foreground bounding box, pixels
    pub y: f64,
    /// Centre of mass (x, y), pixels
    pub center_of_mass: (f64, f64),
    /// `None` for an empty mask
    pub bounds: Option<BoundingBox>,
}

/// Centre of mass (pixel centres) and bounding rectangle of the mask
pub fn reference_origin(mask: &BinaryMask) -> ReferenceOrigin {
    let bounds = foreground_bounds(mask.image());

    let (mut sum_x, mut sum_y, mut count) = (0.0f64, 0.0f64, 0u64);
    for (x, y, pixel) in mask.image().enumerate_pixels() {
        if pixel[0] != 0 {
            sum_x += x as f64 + 0.5;
            sum_y += y as f64 + 0.5;
            count += 1;
        }
    }

    if count == 0 {
        return ReferenceOrigin {
            x: 0.0,
            y: 0.0,
            center_of_mass: (0.0, 0.0),
            bounds: None,
        };
    }

    let center_of_mass = (sum_x / count as f64, sum_y / count as f64);
    ReferenceOrigin {
        x: center_of_mass.0,
        y: bounds.map(|b| b.min_y as f64).unwrap_or(0.0),
        center_of_mass,
        bounds,
    }
}

/// Everything an extractor may look at
pub struct ExtractionInput<'a> {
    pub mask: &'a BinaryMask,
    pub skeleton: &'a Skeleton,
    pub origin: ReferenceOrigin,
    /// Pixels per physical unit
    pub scale: f64,
    pub layout: ColumnLayout,
}

/// Named values plus optional per-image artifacts
#[derive(Debug, Clone, Default)]
pub struct Descriptors {
    pub values: BTreeMap<String, f64>,
    pub shape: Option<ShapeTrace>,
    pub efd: Vec<EfdHarmonic>,
    pub depth_profile: Option<DepthProfile>,
    pub hull: Option<Vec<(i32, i32)>>,
}

impl Descriptors {
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Move values and artifacts into the record, keyed by name
    pub fn merge_into(self, record: &mut ImageRecord) {
        record.values.extend(self.values);
        if self.shape.is_some() {
            record.shape = self.shape;
        }
        if !self.efd.is_empty() {
            record.efd = self.efd;
        }
        if self.depth_profile.is_some() {
            record.depth_profile = self.depth_profile;
        }
        if self.hull.is_some() {
            record.hull = self.hull;
        }
    }
}

/// A morphometric measurement on a mask and its skeleton
pub trait DescriptorExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptors>;
}

/// The extractors behind the standard parameter CSV
pub fn default_extractors(compute_efd: bool) -> Vec<Box<dyn DescriptorExtractor>> {
    vec![
        Box::new(DiameterExtractor),
        Box::new(TissueExtractor),
        Box::new(GeometryExtractor),
        Box::new(PixelProfileExtractor),
        Box::new(ConvexHullExtractor { compute_efd }),
        Box::new(CoordinatesExtractor),
        Box::new(DepthProfileExtractor),
    ]
}

/// Run every extractor; a failing one is logged and its columns stay empty
pub fn run_extractors(
    extractors: &[Box<dyn DescriptorExtractor>],
    input: &ExtractionInput<'_>,
    record: &mut ImageRecord,
) {
    for extractor in extractors {
        match extractor.extract(input) {
            Ok(descriptors) => descriptors.merge_into(record),
            Err(e) => {
                warn!("{}: extractor '{}' failed: {}", record.image, extractor.name(), e);
                record.failed_extractors.push(extractor.name().to_string());
            }
        }
    }
}

/// Mean of a slice, 0 when empty
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Row range `[start, end)` of band `index` when `height` rows starting at
/// `top` are split into `bands` bands
pub(crate) fn band_rows(top: u32, height: u32, bands: usize, index: usize) -> (u32, u32) {
    let start = top + (index as u64 * height as u64 / bands as u64) as u32;
    let end = top + ((index as u64 + 1) * height as u64 / bands as u64) as u32;
    (start, end)
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{GrayImage, Luma};

    use crate::preprocess::skeleton_of;
    use crate::raster::{BinaryMask, CalibratedRaster, Skeleton};
    use crate::record::ColumnLayout;

    use super::{reference_origin, ExtractionInput};

    /// Mask with the given filled rectangles `(x0, y0, x1, y1)`, inclusive
    pub fn rect_mask(
        width: u32,
        height: u32,
        rects: &[(u32, u32, u32, u32)],
        scale: f64,
    ) -> BinaryMask {
        let image = GrayImage::from_fn(width, height, |x, y| {
            let inside = rects
                .iter()
                .any(|&(x0, y0, x1, y1)| x >= x0 && x <= x1 && y >= y0 && y <= y1);
            Luma([if inside { 255 } else { 0 }])
        });
        BinaryMask::from_raster(CalibratedRaster::new(image, scale))
    }

    pub fn fixture(mask: BinaryMask) -> (BinaryMask, Skeleton) {
        let skeleton = skeleton_of(&mask);
        (mask, skeleton)
    }

    pub fn input<'a>(
        mask: &'a BinaryMask,
        skeleton: &'a Skeleton,
        layout: ColumnLayout,
    ) -> ExtractionInput<'a> {
        ExtractionInput {
            mask,
            skeleton,
            origin: reference_origin(mask),
            scale: mask.scale(),
            layout,
        }
    }
}
