// src/extractors/tissue.rs - Root length, projected area and tip count

use crate::errors::Result;
use crate::morphology::find_end_points;

use super::{DescriptorExtractor, Descriptors, ExtractionInput};

/// `length` (skeleton), `area` (mask) and `tip_count` (skeleton end points)
pub struct TissueExtractor;

impl DescriptorExtractor for TissueExtractor {
    fn name(&self) -> &str {
        "tissue"
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<Descriptors> {
        let scale = input.scale;
        let tips = find_end_points(input.skeleton.image());

        let mut descriptors = Descriptors::default();
        descriptors.set("length", input.skeleton.pixel_count() as f64 / scale);
        descriptors.set("area", input.mask.foreground_count() as f64 / (scale * scale));
        descriptors.set("tip_count", tips.len() as f64);
        Ok(descriptors)
    }
}
