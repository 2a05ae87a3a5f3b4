// src/record.rs - Per-image descriptor record and parameter CSV layout

use std::collections::BTreeMap;

use crate::rotation::RotationResult;

/// Sizes that shape the parameter CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Horizontal cross-section bands
    pub n_slices: usize,
    /// Depth positions sampled by the coordinate trace
    pub n_coord: usize,
    /// Elliptic Fourier harmonics
    pub n_efd: usize,
    /// Append `rotation_angle, volume`
    pub with_volume: bool,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            n_slices: 30,
            n_coord: 10,
            n_efd: 10,
            with_volume: false,
        }
    }
}

const LEADING_COLUMNS: [&str; 20] = [
    "diam_max",
    "diam_mean",
    "diam_mode",
    "length",
    "area",
    "width",
    "depth",
    "width_depth_ratio",
    "com_x",
    "com_y",
    "ellips_025",
    "ellips_050",
    "ellips_075",
    "ellips_100",
    "rect_020",
    "rect_040",
    "rect_060",
    "rect_080",
    "directionality",
    "tip_count",
];

impl ColumnLayout {
    /// Descriptor columns in file order, without the leading `image` column
    pub fn descriptor_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = LEADING_COLUMNS.iter().map(|c| c.to_string()).collect();
        for i in 0..self.n_slices {
            columns.push(format!("cross_hori_{}_mean", i));
            columns.push(format!("cross_hori_{}_max", i));
        }
        columns.push("cross_vert_mean".to_string());
        columns.push("cross_vert_max".to_string());
        columns.push("convexhull".to_string());
        for i in 0..self.n_coord * 2 {
            columns.push(format!("coord_x{}", i));
        }
        for i in 0..self.n_coord {
            columns.push(format!("diff_x{}", i));
        }
        for i in 0..self.n_coord {
            columns.push(format!("cumul_x{}", i));
        }
        if self.with_volume {
            columns.push("rotation_angle".to_string());
            columns.push("volume".to_string());
        }
        columns
    }

    /// Full parameter CSV header
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["image".to_string()];
        header.extend(self.descriptor_columns());
        header
    }
}

/// Landmark coordinates written to the TPS file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeTrace {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// One elliptic Fourier harmonic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfdHarmonic {
    pub index: usize,
    pub ax: f64,
    pub ay: f64,
    pub bx: f64,
    pub by: f64,
    /// Amplitude normalized by the first harmonic
    pub efd: f64,
}

/// Area, length and density per depth band
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthProfile {
    pub area: Vec<f64>,
    pub length: Vec<f64>,
    pub density: Vec<f64>,
}

/// Everything measured for one image; written once, then dropped
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub image: String,
    pub width: u32,
    pub height: u32,
    /// Milliseconds since the Unix epoch
    pub time_start: u128,
    pub time_end: u128,
    pub values: BTreeMap<String, f64>,
    pub shape: Option<ShapeTrace>,
    pub efd: Vec<EfdHarmonic>,
    pub depth_profile: Option<DepthProfile>,
    /// Convex hull polygon, pixel coordinates
    pub hull: Option<Vec<(i32, i32)>>,
    pub rotation: Option<RotationResult>,
    /// Extractors that failed for this image
    pub failed_extractors: Vec<String>,
}

impl ImageRecord {
    pub fn new(image: impl Into<String>, width: u32, height: u32, time_start: u128) -> Self {
        Self {
            image: image.into(),
            width,
            height,
            time_start,
            time_end: time_start,
            values: BTreeMap::new(),
            shape: None,
            efd: Vec::new(),
            depth_profile: None,
            hull: None,
            rotation: None,
            failed_extractors: Vec::new(),
        }
    }

    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    /// Values in layout order; absent descriptors come out as NaN
    pub fn row_values(&self, layout: &ColumnLayout) -> Vec<f64> {
        layout
            .descriptor_columns()
            .iter()
            .map(|column| self.value(column).unwrap_or(f64::NAN))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_header_column_count() {
        let layout = ColumnLayout::default();
        let header = layout.header();

        assert_eq!(header.len(), 1 + 20 + 30 * 2 + 3 + 10 * 4);
        assert_eq!(header.len(), 124);
        assert_eq!(header[0], "image");
        assert_eq!(header[21], "cross_hori_0_mean");
        assert_eq!(header.last().unwrap(), "cumul_x9");
    }

    #[test]
    fn test_volume_columns_are_appended() {
        let layout = ColumnLayout { with_volume: true, ..ColumnLayout::default() };
        let header = layout.header();

        assert_eq!(header.len(), 126);
        assert_eq!(&header[124..], &["rotation_angle".to_string(), "volume".to_string()]);
    }

    #[test]
    fn test_missing_values_become_nan() {
        let layout = ColumnLayout { n_slices: 1, n_coord: 1, ..ColumnLayout::default() };
        let mut record = ImageRecord::new("a.png", 10, 10, 0);
        record.values.insert("area".to_string(), 2.5);

        let row = record.row_values(&layout);

        assert_eq!(row.len(), layout.descriptor_columns().len());
        assert_eq!(row[4], 2.5);
        assert!(row[0].is_nan());
    }
}
