// src/lib.rs - Library interface for the root image analysis pipeline

pub mod config;
pub mod errors;
pub mod extractors;
pub mod image_io;
pub mod image_utils;
pub mod logger;
pub mod morphology;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod raster;
pub mod record;
pub mod rotation;

// Re-export commonly used types and functions
pub use config::{AngleSearchKind, Config};
pub use errors::{Result, RootAnalysisError};
pub use image_io::{get_image_files_in_dir, load_image, InputImage};
pub use pipeline::{BatchOrchestrator, BatchSummary, ImageAnalysis};
pub use preprocess::{compute_scale, preprocess, PreprocessParams, Preprocessed};
pub use raster::{BinaryMask, CalibratedRaster, Calibration, Selection, Skeleton};
pub use record::{ColumnLayout, ImageRecord};

// Re-export the descriptor extractors
pub use extractors::{
    default_extractors,
    reference_origin,
    run_extractors,
    DescriptorExtractor,
    Descriptors,
    ExtractionInput,
    ReferenceOrigin,
};

// Re-export the rotation volume estimator
pub use rotation::{
    AngleSearch,
    AngleSearchState,
    FullScan,
    HillClimb,
    RotationResult,
    RotationVolumeEstimator,
};
