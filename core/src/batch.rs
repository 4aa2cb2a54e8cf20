//! Batch processing of catalog entries.
//!
//! Each admitted catalog row is loaded and analysed independently, so the
//! batch fans out over a **rayon** pool.  Results are collected back in
//! catalog order: the output table and the plot grouping are reproducible
//! whatever the scheduling.  A file that fails to load or to analyse is
//! logged and recorded as skipped; it never aborts the batch.

use std::fs;
use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::archive::{LoadError, ProfileSource};
use crate::catalog::CatalogEntry;
use crate::pipeline::{DetectionError, PulseAnalyzer};
use crate::types::{DetectionParams, Profile, ProfileResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Batch-level settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchParams {
    /// Catalog rows need `snr_xprof` strictly above this to be analysed.
    pub admission_snr: f64,

    /// Number of profiles drawn per figure.
    pub plot_batch_size: usize,

    /// Number of rayon worker threads.  Set to 0 to use the global pool.
    pub n_workers: usize,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            admission_snr: 10.0,
            plot_batch_size: 5,
            n_workers: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Full pipeline configuration, as stored in a JSON file.
///
/// Missing keys fall back to their defaults, so `{}` is a valid file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection: DetectionParams,
    pub batch: BatchParams,
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a single file could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("analysis failed: {0}")]
    Detection(#[from] DetectionError),
}

/// A file dropped from the batch, with the reason.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// A successfully analysed file, with the profile kept for plotting.
#[derive(Clone, Debug)]
pub struct ProcessedProfile {
    pub profile: Profile,
    pub result: ProfileResult,
}

/// A group of consecutive processed profiles drawn on one figure.
#[derive(Clone, Copy, Debug)]
pub struct PlotBatch<'a> {
    /// 1-based batch number.
    pub index: usize,
    pub profiles: &'a [ProcessedProfile],
}

/// Everything a batch run produced.
#[derive(Clone, Debug, Default)]
pub struct BatchOutcome {
    /// Processed files in catalog order.
    pub processed: Vec<ProcessedProfile>,

    /// Admitted files that failed, in catalog order.
    pub skipped: Vec<SkippedFile>,

    /// Catalog rows rejected by the `snr_xprof` gate.
    pub excluded: usize,

    /// Wall-clock processing time, in milliseconds.
    pub processing_time_ms: u64,
}

impl BatchOutcome {
    /// Per-file results in catalog order.
    pub fn results(&self) -> Vec<ProfileResult> {
        self.processed.iter().map(|p| p.result.clone()).collect()
    }

    /// Split processed files into consecutive groups of `batch_size`.
    pub fn plot_batches(&self, batch_size: usize) -> Vec<PlotBatch<'_>> {
        self.processed
            .chunks(batch_size.max(1))
            .enumerate()
            .map(|(i, profiles)| PlotBatch {
                index: i + 1,
                profiles,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// BatchProcessor
// ---------------------------------------------------------------------------

/// Loads and analyses catalog entries, in parallel.
pub struct BatchProcessor<S: ProfileSource> {
    source: S,
    analyzer: PulseAnalyzer,
    params: BatchParams,
}

impl<S: ProfileSource> BatchProcessor<S> {
    pub fn new(source: S, config: PipelineConfig) -> Self {
        Self {
            source,
            analyzer: PulseAnalyzer::new(config.detection),
            params: config.batch,
        }
    }

    pub fn params(&self) -> &BatchParams {
        &self.params
    }

    /// Load and analyse one entry.  The admission gate is not checked here.
    pub fn process_file(&self, entry: &CatalogEntry) -> Result<ProcessedProfile, FileError> {
        let profile = self.source.load(&entry.path())?;
        let result = self.analyzer.analyze(&entry.filename, &profile)?;
        Ok(ProcessedProfile { profile, result })
    }

    /// Run the batch over `entries`.
    ///
    /// Entries failing the `snr_xprof` gate are counted and otherwise
    /// ignored; every other entry ends up either processed or skipped.
    pub fn run(&self, entries: &[CatalogEntry]) -> BatchOutcome {
        let start = Instant::now();

        let admitted: Vec<&CatalogEntry> = entries
            .iter()
            .filter(|e| e.is_admitted(self.params.admission_snr))
            .collect();
        let excluded = entries.len() - admitted.len();

        info!(
            "Processing {} of {} catalog rows (snr_xprof > {:.1})",
            admitted.len(),
            entries.len(),
            self.params.admission_snr,
        );

        let work = || -> Vec<Result<ProcessedProfile, FileError>> {
            admitted.par_iter().map(|e| self.process_file(e)).collect()
        };
        let outcomes = if self.params.n_workers > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.params.n_workers)
                .build()
            {
                Ok(pool) => pool.install(work),
                Err(e) => {
                    warn!(
                        "could not build a {}-thread pool ({}); using the global pool",
                        self.params.n_workers, e
                    );
                    work()
                }
            }
        } else {
            work()
        };

        let mut outcome = BatchOutcome {
            excluded,
            ..BatchOutcome::default()
        };
        for (entry, result) in admitted.iter().zip(outcomes) {
            match result {
                Ok(processed) => {
                    debug!(
                        "{}: {} components",
                        entry.filename,
                        processed.result.components.len()
                    );
                    outcome.processed.push(processed);
                }
                Err(e) => {
                    warn!("Error processing file {}: {}", entry.filename, e);
                    outcome.skipped.push(SkippedFile {
                        filename: entry.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        outcome.processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch complete in {} ms: {} processed, {} skipped, {} below gate",
            outcome.processing_time_ms,
            outcome.processed.len(),
            outcome.skipped.len(),
            outcome.excluded,
        );
        outcome
    }
}
