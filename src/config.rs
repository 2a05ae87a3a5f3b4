// src/config.rs - Batch configuration loaded from TOML and overridden from the CLI

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{RootAnalysisError, Result};
use crate::preprocess::compute_scale;
use crate::record::ColumnLayout;

/// Configuration for one batch run. Immutable once the run starts.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory holding the root images
    pub input_path: String,

    /// Parameter CSV; sibling outputs are derived from this path
    pub output_csv: String,

    /// Length of the scale bar in pixels
    #[serde(default = "default_scale_pix")]
    pub scale_pix: f64,

    /// Length of the scale bar in physical units (cm)
    #[serde(default = "default_scale_cm")]
    pub scale_cm: f64,

    /// Roots are dark on a light background
    #[serde(default = "default_black_roots")]
    pub black_roots: bool,

    /// Smallest particle kept by the particle filter, in physical area (cm²)
    #[serde(default = "default_root_min_size")]
    pub root_min_size: f64,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub save_images: bool,

    #[serde(default)]
    pub save_tips: bool,

    #[serde(default)]
    pub save_tps: bool,

    #[serde(default)]
    pub save_efd: bool,

    #[serde(default)]
    pub save_shapes: bool,

    #[serde(default = "default_save_depth")]
    pub save_depth: bool,

    /// Append rotation angle and volume columns to the parameter CSV
    #[serde(default)]
    pub estimate_volume: bool,

    #[serde(default)]
    pub angle_search: AngleSearchKind,

    /// Where shape images go; defaults to `<output dir>/images/shapes`
    #[serde(default)]
    pub shape_dir: Option<String>,

    #[serde(default = "default_n_slices")]
    pub n_slices: usize,

    #[serde(default = "default_n_coord")]
    pub n_coord: usize,

    #[serde(default = "default_n_efd")]
    pub n_efd: usize,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,
}

/// Rotation search strategy used by the volume estimator
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AngleSearchKind {
    /// Coarse-then-fine scan stopping at the first height increase
    #[default]
    HillClimb,
    /// Evaluate every angle of both passes and keep the minimum
    FullScan,
}

fn default_scale_pix() -> f64 {
    2020.0
}

fn default_scale_cm() -> f64 {
    23.5
}

fn default_black_roots() -> bool {
    true
}

fn default_root_min_size() -> f64 {
    0.01
}

fn default_save_depth() -> bool {
    true
}

fn default_n_slices() -> usize {
    30
}

fn default_n_coord() -> usize {
    10
}

fn default_n_efd() -> usize {
    10
}

fn default_parallel() -> bool {
    false
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: "./input".to_string(),
            output_csv: "./output/root_data.csv".to_string(),
            scale_pix: default_scale_pix(),
            scale_cm: default_scale_cm(),
            black_roots: default_black_roots(),
            root_min_size: default_root_min_size(),
            verbose: false,
            save_images: false,
            save_tips: false,
            save_tps: false,
            save_efd: false,
            save_shapes: false,
            save_depth: default_save_depth(),
            estimate_volume: false,
            angle_search: AngleSearchKind::default(),
            shape_dir: None,
            n_slices: default_n_slices(),
            n_coord: default_n_coord(),
            n_efd: default_n_efd(),
            use_parallel: default_parallel(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RootAnalysisError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|source| RootAnalysisError::ConfigLoad {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Load from `path` when it exists, otherwise start from the defaults
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            RootAnalysisError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content)?;

        Ok(())
    }

    /// Pixels per physical length unit
    pub fn scale(&self) -> Result<f64> {
        compute_scale(self.scale_pix, self.scale_cm)
    }

    pub fn layout(&self) -> ColumnLayout {
        ColumnLayout {
            n_slices: self.n_slices,
            n_coord: self.n_coord,
            n_efd: self.n_efd,
            with_volume: self.estimate_volume,
        }
    }

    /// Directory that receives shape images
    pub fn shape_dir(&self) -> PathBuf {
        match &self.shape_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.output_dir().join("images").join("shapes"),
        }
    }

    /// Directory that receives skeleton and tip images
    pub fn image_dir(&self) -> PathBuf {
        self.output_dir().join("images").join("param")
    }

    pub fn output_dir(&self) -> PathBuf {
        Path::new(&self.output_csv)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Validate configuration and create the output directory
    pub fn validate(&self) -> Result<()> {
        self.scale()?;

        let input_path = PathBuf::from(&self.input_path);
        if !input_path.exists() {
            return Err(RootAnalysisError::InvalidPath(input_path));
        }
        if !input_path.is_dir() {
            return Err(RootAnalysisError::Config(format!(
                "{} is not a directory",
                input_path.display()
            )));
        }

        if !self.root_min_size.is_finite() || self.root_min_size < 0.0 {
            return Err(RootAnalysisError::Config(
                "root_min_size must be a finite value >= 0.0".to_string(),
            ));
        }

        if self.n_slices == 0 {
            return Err(RootAnalysisError::Config("n_slices must be > 0".to_string()));
        }

        if self.n_coord == 0 {
            return Err(RootAnalysisError::Config("n_coord must be > 0".to_string()));
        }

        if self.n_efd == 0 {
            return Err(RootAnalysisError::Config("n_efd must be > 0".to_string()));
        }

        if !self.output_csv.to_ascii_lowercase().ends_with(".csv") {
            return Err(RootAnalysisError::Config(format!(
                "output_csv must end with .csv, got '{}'",
                self.output_csv
            )));
        }

        fs::create_dir_all(self.output_dir()).map_err(|e| {
            RootAnalysisError::Config(format!(
                "Failed to create output directory '{}': {}",
                self.output_dir().display(),
                e
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            input_path = "images"
            output_csv = "out/params.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.n_slices, 30);
        assert_eq!(config.n_coord, 10);
        assert!(config.black_roots);
        assert_eq!(config.angle_search, AngleSearchKind::HillClimb);
        assert_eq!(config.output_dir(), PathBuf::from("out"));
    }

    #[test]
    fn test_angle_search_parses_snake_case() {
        let config: Config = toml::from_str(
            r#"
            input_path = "images"
            output_csv = "params.csv"
            angle_search = "full_scan"
            "#,
        )
        .unwrap();

        assert_eq!(config.angle_search, AngleSearchKind::FullScan);
        assert_eq!(config.output_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_zero_scale_cm_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            input_path: dir.path().display().to_string(),
            output_csv: dir.path().join("p.csv").display().to_string(),
            scale_cm: 0.0,
            ..Config::default()
        };

        assert!(matches!(config.validate(), Err(RootAnalysisError::Config(_))));
    }

    #[test]
    fn test_missing_input_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            input_path: dir.path().join("nope").display().to_string(),
            output_csv: dir.path().join("p.csv").display().to_string(),
            ..Config::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            save_efd: true,
            n_coord: 4,
            ..Config::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();

        assert!(loaded.save_efd);
        assert_eq!(loaded.n_coord, 4);
    }
}
