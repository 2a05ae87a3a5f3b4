// src/pipeline.rs - Batch orchestration: Init, PerImage, Finalize

use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::errors::{Result, RootAnalysisError};
use crate::extractors::{
    default_extractors, reference_origin, run_extractors, DescriptorExtractor, ExtractionInput,
    ReferenceOrigin,
};
use crate::image_io::{get_image_files_in_dir, load_image, InputImage};
use crate::output::{create_image_dirs, save_image_artifacts, OutputPaths, OutputWriters};
use crate::preprocess::{preprocess, PreprocessParams, Preprocessed};
use crate::record::ImageRecord;
use crate::rotation::RotationVolumeEstimator;

/// Counters reported once the batch is over
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Image files found in the input directory
    pub total: usize,
    /// Images with a row in every output file
    pub processed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Mutable state of one run; the configuration stays outside
struct BatchRunState {
    writers: OutputWriters,
    total: usize,
    done: usize,
    processed: usize,
    failed: usize,
    progress_step: usize,
    started: Instant,
}

impl BatchRunState {
    fn new(writers: OutputWriters, total: usize) -> Self {
        Self {
            writers,
            total,
            done: 0,
            processed: 0,
            failed: 0,
            progress_step: 0,
            started: Instant::now(),
        }
    }

    /// Log progress every 5 %
    fn advance(&mut self) {
        self.done += 1;
        let step = self.done * 20 / self.total.max(1);
        if step > self.progress_step {
            self.progress_step = step;
            info!("Progress: {}% ({}/{})", step * 5, self.done, self.total);
        }
    }

    fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.total,
            processed: self.processed,
            failed: self.failed,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Everything produced for one image before its rows are written
pub struct ImageAnalysis {
    pub record: ImageRecord,
    pub stem: String,
    pub preprocessed: Preprocessed,
    pub origin: ReferenceOrigin,
}

/// Drives the whole batch over an input directory
pub struct BatchOrchestrator<'a> {
    config: &'a Config,
    extractors: Vec<Box<dyn DescriptorExtractor>>,
    estimator: Option<RotationVolumeEstimator>,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Error message followed by each of its causes
fn error_chain(error: &RootAnalysisError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn skip_image(label: &str, error: &RootAnalysisError, state: &mut BatchRunState) {
    error!("{}: skipped: {}", label, error_chain(error));
    state.failed += 1;
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self::with_extractors(config, default_extractors(config.save_efd))
    }

    /// Use a custom extractor set instead of the default one
    pub fn with_extractors(
        config: &'a Config,
        extractors: Vec<Box<dyn DescriptorExtractor>>,
    ) -> Self {
        let estimator = config
            .estimate_volume
            .then(|| RotationVolumeEstimator::new(config.angle_search));
        Self {
            config,
            extractors,
            estimator,
        }
    }

    fn params(&self) -> PreprocessParams {
        PreprocessParams {
            scale_pix: self.config.scale_pix,
            scale_cm: self.config.scale_cm,
            black_roots: self.config.black_roots,
            root_min_size: self.config.root_min_size,
        }
    }

    /// Run the batch. Only Init failures are returned; per-image failures are
    /// logged and counted.
    pub fn run(&self) -> Result<BatchSummary> {
        // Init
        self.config.validate()?;
        let files = get_image_files_in_dir(&self.config.input_path)?;
        let paths = OutputPaths::from_param_csv(&self.config.output_csv)?;
        let writers = OutputWriters::create(&paths, self.config)?;
        create_image_dirs(self.config)?;

        info!("Found {} image files in {}", files.len(), self.config.input_path);
        let mut state = BatchRunState::new(writers, files.len());

        // PerImage
        if self.config.use_parallel {
            self.run_parallel(&files, &mut state);
        } else {
            self.run_sequential(&files, &mut state);
        }

        // Finalize; rows are already flushed, so a late failure only warns
        if let Err(e) = state.writers.flush() {
            warn!("final flush failed: {}", error_chain(&e));
        }
        let summary = state.summary();
        info!(
            "Processed {}/{} images ({} failed) in {:.2} seconds",
            summary.processed,
            summary.total,
            summary.failed,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    fn run_sequential(&self, files: &[PathBuf], state: &mut BatchRunState) {
        for path in files {
            let started = Instant::now();
            let label = file_label(path);
            info!("Processing: {}", label);

            match self.analyze(path) {
                Ok(analysis) => {
                    if self.write_rows(&analysis.record, state) {
                        self.save_artifacts(&analysis);
                    }
                }
                Err(e) => skip_image(&label, &e, state),
            }

            debug!("{} took {:.3} s", label, started.elapsed().as_secs_f64());
            state.advance();
        }
    }

    /// Analyze on the rayon pool while this thread writes finished rows in
    /// enumeration order. Rows are held back only until every earlier image
    /// is done.
    fn run_parallel(&self, files: &[PathBuf], state: &mut BatchRunState) {
        let (sender, receiver) = mpsc::channel::<(usize, String, Result<ImageRecord>)>();

        thread::scope(|scope| {
            scope.spawn(move || {
                files
                    .par_iter()
                    .enumerate()
                    .for_each_with(sender, |sender, (index, path)| {
                        let label = file_label(path);
                        info!("Processing: {}", label);
                        let result = self.analyze(path).map(|analysis| {
                            self.save_artifacts(&analysis);
                            analysis.record
                        });
                        // Send only fails once the writer side is gone
                        let _ = sender.send((index, label, result));
                    });
            });

            let mut pending = BTreeMap::new();
            let mut next = 0;
            for (index, label, result) in receiver {
                pending.insert(index, (label, result));
                while let Some((label, result)) = pending.remove(&next) {
                    match result {
                        Ok(record) => {
                            self.write_rows(&record, state);
                        }
                        Err(e) => skip_image(&label, &e, state),
                    }
                    state.advance();
                    next += 1;
                }
            }
        });
    }

    /// Primary rows decide whether the image counts as processed; the
    /// auxiliary files only warn.
    fn write_rows(&self, record: &ImageRecord, state: &mut BatchRunState) -> bool {
        match state.writers.write_record(record) {
            Ok(()) => {
                state.processed += 1;
                if let Err(e) = state.writers.write_extras(record) {
                    warn!("{}: auxiliary output failed: {}", record.image, error_chain(&e));
                }
                true
            }
            Err(e) => {
                error!("{}: output failed: {}", record.image, error_chain(&e));
                state.failed += 1;
                false
            }
        }
    }

    fn save_artifacts(&self, analysis: &ImageAnalysis) {
        let result = save_image_artifacts(
            self.config,
            &analysis.stem,
            &analysis.preprocessed.mask,
            &analysis.preprocessed.skeleton,
            &analysis.origin,
            &analysis.record,
        );
        if let Err(e) = result {
            warn!("{}: could not save images: {}", analysis.record.image, error_chain(&e));
        }
    }

    /// Load, preprocess and measure one image
    pub fn analyze(&self, path: &Path) -> Result<ImageAnalysis> {
        let time_start = now_millis();
        let input = load_image(path)?;
        self.analyze_loaded(input, time_start)
    }

    /// Measure an image that is already decoded; `time_start` is when its
    /// loading began
    fn analyze_loaded(&self, input: InputImage, time_start: u128) -> Result<ImageAnalysis> {
        let mut record = ImageRecord::new(
            input.filename.clone(),
            input.width(),
            input.height(),
            time_start,
        );

        let preprocessed = preprocess(&input.image, &self.params())?;
        if preprocessed.mask.is_empty() {
            warn!("{}: no root pixels after thresholding", input.filename);
        }

        let origin = reference_origin(&preprocessed.mask);
        let extraction = ExtractionInput {
            mask: &preprocessed.mask,
            skeleton: &preprocessed.skeleton,
            origin,
            scale: preprocessed.mask.scale(),
            layout: self.config.layout(),
        };
        run_extractors(&self.extractors, &extraction, &mut record);

        if let Some(estimator) = self.estimator.as_ref() {
            let rotation = estimator.estimate_volume(&preprocessed.mask);
            debug!(
                "{}: rotation {:.3} deg after {} samples, volume {:.6}",
                input.filename,
                rotation.angle,
                rotation.state.samples.len(),
                rotation.volume
            );
            record.values.insert("rotation_angle".to_string(), rotation.angle);
            record.values.insert("volume".to_string(), rotation.volume);
            record.rotation = Some(rotation);
        }

        record.time_end = now_millis();

        Ok(ImageAnalysis {
            record,
            stem: input.stem,
            preprocessed,
            origin,
        })
    }
}
