// src/output.rs - Parameter, analysis, TPS, EFD and depth writers plus image artifacts

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::Writer;
use image::Rgb;
use imageproc::drawing::draw_line_segment_mut;

use crate::config::Config;
use crate::errors::{Result, RootAnalysisError};
use crate::extractors::ReferenceOrigin;
use crate::image_io::{save_gray_image, save_rgb_image};
use crate::image_utils::create_debug_image;
use crate::morphology::find_end_points;
use crate::raster::{BinaryMask, Skeleton};
use crate::record::{ColumnLayout, ImageRecord};

const TIP_COLOR: [u8; 3] = [255, 0, 0];
const HULL_COLOR: [u8; 3] = [0, 200, 255];
const TRACE_COLOR: [u8; 3] = [255, 200, 0];

/// Format a descriptor value for the CSV files
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.6}", value)
    }
}

/// Every file derived from the parameter CSV path
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub param: PathBuf,
    pub analysis: PathBuf,
    pub tps: PathBuf,
    pub efd: PathBuf,
    pub depth_area: PathBuf,
    pub depth_length: PathBuf,
    pub depth_density: PathBuf,
}

impl OutputPaths {
    /// `P.csv` gives `P-analysis.csv`, `P-shape.tps`, `P-efd.csv` and `P-depth{A,L,D}.txt`
    pub fn from_param_csv<P: AsRef<Path>>(param: P) -> Result<Self> {
        let param = param.as_ref().to_path_buf();
        let text = param
            .to_str()
            .ok_or_else(|| RootAnalysisError::InvalidPath(param.clone()))?;
        if text.len() < 4 || !text.to_ascii_lowercase().ends_with(".csv") {
            return Err(RootAnalysisError::InvalidPath(param.clone()));
        }
        let base = &text[..text.len() - 4];

        Ok(Self {
            analysis: PathBuf::from(format!("{}-analysis.csv", base)),
            tps: PathBuf::from(format!("{}-shape.tps", base)),
            efd: PathBuf::from(format!("{}-efd.csv", base)),
            depth_area: PathBuf::from(format!("{}-depthA.txt", base)),
            depth_length: PathBuf::from(format!("{}-depthL.txt", base)),
            depth_density: PathBuf::from(format!("{}-depthD.txt", base)),
            param,
        })
    }
}

struct DepthWriters {
    area: Writer<File>,
    length: Writer<File>,
    density: Writer<File>,
}

/// Open output files for one batch run; only the orchestrator holds this
pub struct OutputWriters {
    layout: ColumnLayout,
    param: Writer<File>,
    analysis: Writer<File>,
    tps: Option<BufWriter<File>>,
    efd: Option<Writer<File>>,
    depth: Option<DepthWriters>,
    rows: usize,
}

fn create_writer(path: &Path) -> Result<Writer<File>> {
    Writer::from_path(path).map_err(|e| {
        RootAnalysisError::Config(format!("cannot open {} for writing: {}", path.display(), e))
    })
}

impl OutputWriters {
    /// Create every enabled file and write the headers
    pub fn create(paths: &OutputPaths, config: &Config) -> Result<Self> {
        if let Some(parent) = paths.param.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let layout = config.layout();

        let mut param = create_writer(&paths.param)?;
        param.write_record(layout.header())?;
        param.flush()?;

        let mut analysis = create_writer(&paths.analysis)?;
        analysis.write_record(["image", "width", "height", "time_start", "time_end"])?;
        analysis.flush()?;

        let tps = if config.save_tps {
            let file = File::create(&paths.tps).map_err(|e| {
                RootAnalysisError::Config(format!("cannot open {}: {}", paths.tps.display(), e))
            })?;
            Some(BufWriter::new(file))
        } else {
            None
        };

        let efd = if config.save_efd {
            let mut writer = create_writer(&paths.efd)?;
            writer.write_record(["image", "index", "ax", "ay", "bx", "by", "efd"])?;
            writer.flush()?;
            Some(writer)
        } else {
            None
        };

        let depth = if config.save_depth {
            Some(DepthWriters {
                area: create_writer(&paths.depth_area)?,
                length: create_writer(&paths.depth_length)?,
                density: create_writer(&paths.depth_density)?,
            })
        } else {
            None
        };

        Ok(Self {
            layout,
            param,
            analysis,
            tps,
            efd,
            depth,
            rows: 0,
        })
    }

    /// Rows written to the parameter CSV so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Append one image to the parameter and analysis CSVs, then flush them.
    /// Once this returns `Ok` the image has its row.
    pub fn write_record(&mut self, record: &ImageRecord) -> Result<()> {
        let mut row = vec![record.image.clone()];
        row.extend(record.row_values(&self.layout).into_iter().map(format_value));
        self.param.write_record(&row)?;

        self.analysis.write_record(&[
            record.image.clone(),
            record.width.to_string(),
            record.height.to_string(),
            record.time_start.to_string(),
            record.time_end.to_string(),
        ])?;

        self.param.flush()?;
        self.analysis.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Append the TPS, EFD and depth lines of an image whose row is written
    pub fn write_extras(&mut self, record: &ImageRecord) -> Result<()> {
        if let (Some(tps), Some(shape)) = (self.tps.as_mut(), record.shape.as_ref()) {
            writeln!(tps, "ID={}", record.image)?;
            writeln!(tps, "LM={}", shape.x.len())?;
            for (x, y) in shape.x.iter().zip(shape.y.iter()) {
                writeln!(tps, "{} {}", format_value(*x), format_value(*y))?;
            }
        }

        if let Some(efd) = self.efd.as_mut() {
            for harmonic in &record.efd {
                efd.write_record(&[
                    record.image.clone(),
                    harmonic.index.to_string(),
                    format_value(harmonic.ax),
                    format_value(harmonic.ay),
                    format_value(harmonic.bx),
                    format_value(harmonic.by),
                    format_value(harmonic.efd),
                ])?;
            }
        }

        let profile = record.depth_profile.as_ref();
        if let (Some(depth), Some(profile)) = (self.depth.as_mut(), profile) {
            let line = |values: &[f64]| {
                let mut fields = vec![record.image.clone()];
                fields.extend(values.iter().copied().map(format_value));
                fields
            };
            depth.area.write_record(line(&profile.area))?;
            depth.length.write_record(line(&profile.length))?;
            depth.density.write_record(line(&profile.density))?;
        }

        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.param.flush()?;
        self.analysis.flush()?;
        if let Some(tps) = self.tps.as_mut() {
            tps.flush()?;
        }
        if let Some(efd) = self.efd.as_mut() {
            efd.flush()?;
        }
        if let Some(depth) = self.depth.as_mut() {
            depth.area.flush()?;
            depth.length.flush()?;
            depth.density.flush()?;
        }
        Ok(())
    }
}

/// Create the image folders needed by the enabled image outputs
pub fn create_image_dirs(config: &Config) -> Result<()> {
    if config.save_images || config.save_tips {
        fs::create_dir_all(config.image_dir())?;
    }
    if config.save_shapes {
        fs::create_dir_all(config.shape_dir())?;
    }
    Ok(())
}

/// Write the optional per-image PNGs enabled in `config`; the folders
/// come from [`create_image_dirs`]
pub fn save_image_artifacts(
    config: &Config,
    stem: &str,
    mask: &BinaryMask,
    skeleton: &Skeleton,
    origin: &ReferenceOrigin,
    record: &ImageRecord,
) -> Result<()> {
    if config.save_images {
        let path = config.image_dir().join(format!("{}_skeleton.png", stem));
        save_gray_image(skeleton.image(), path)?;
    }

    if config.save_tips {
        let tips = find_end_points(skeleton.image());
        let tips_image = create_debug_image(skeleton.image(), &tips, TIP_COLOR, 5);
        let path = config.image_dir().join(format!("{}_tips.png", stem));
        save_rgb_image(&tips_image, path)?;
    }

    if config.save_shapes {
        let dir = config.shape_dir();
        let mut shape_image = create_debug_image(mask.image(), &[], TIP_COLOR, 1);

        if let Some(hull) = record.hull.as_ref() {
            for (i, &(x0, y0)) in hull.iter().enumerate() {
                let (x1, y1) = hull[(i + 1) % hull.len()];
                draw_line_segment_mut(
                    &mut shape_image,
                    (x0 as f32, y0 as f32),
                    (x1 as f32, y1 as f32),
                    Rgb(HULL_COLOR),
                );
            }
        }

        // trace coordinates are relative to the reference origin, in physical units
        if let Some(shape) = record.shape.as_ref() {
            let scale = mask.scale();
            let points: Vec<(f32, f32)> = shape
                .x
                .iter()
                .zip(shape.y.iter())
                .map(|(x, y)| ((x * scale + origin.x) as f32, (y * scale + origin.y) as f32))
                .collect();
            for (i, &start) in points.iter().enumerate() {
                let end = points[(i + 1) % points.len()];
                draw_line_segment_mut(&mut shape_image, start, end, Rgb(TRACE_COLOR));
            }
        }

        save_rgb_image(&shape_image, dir.join(format!("{}_shape.png", stem)))?;
    }

    Ok(())
}
