//! Input catalog: the tab-separated list of observations to screen.
//!
//! The catalog carries one row per observation with at least a filename
//! column (`#filename` or `filename`) and the whole-profile SNR `snr_xprof`.
//! Only rows whose `snr_xprof` exceeds the admission threshold go through
//! per-component analysis.  Row order is preserved; it fixes the order of the
//! output table and the grouping of plot batches.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Accepted spellings of the filename column.
const FILENAME_COLUMNS: &[&str] = &["#filename", "filename"];
const SNR_COLUMN: &str = "snr_xprof";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog has no header row")]
    MissingHeader,

    #[error("catalog header lacks a '{0}' column")]
    MissingColumn(String),

    #[error("line {line}: {message}")]
    BadRow { line: usize, message: String },
}

/// One observation listed in the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Filename as written in the catalog.
    pub filename: String,

    /// Whole-profile SNR from upstream processing.
    pub snr_xprof: f64,
}

impl CatalogEntry {
    /// Filesystem path, with a leading `~/` expanded to `$HOME`.
    pub fn path(&self) -> PathBuf {
        expand_home(&self.filename)
    }

    /// Whether this entry passes the whole-profile SNR gate.
    pub fn is_admitted(&self, admission_snr: f64) -> bool {
        self.snr_xprof > admission_snr
    }
}

/// Parse a catalog from any buffered reader.
pub fn parse_catalog<R: BufRead>(reader: R) -> Result<Vec<CatalogEntry>, CatalogError> {
    let mut lines = reader.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => return Err(CatalogError::MissingHeader),
        }
    };

    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let name_col = columns
        .iter()
        .position(|c| FILENAME_COLUMNS.contains(c))
        .ok_or_else(|| CatalogError::MissingColumn("filename".into()))?;
    let snr_col = columns
        .iter()
        .position(|c| *c == SNR_COLUMN)
        .ok_or_else(|| CatalogError::MissingColumn(SNR_COLUMN.into()))?;

    let mut entries = Vec::new();
    for (idx, line) in lines {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let field = |col: usize, name: &str| {
            fields
                .get(col)
                .map(|f| f.trim())
                .ok_or_else(|| CatalogError::BadRow {
                    line: line_no,
                    message: format!("missing '{}' field", name),
                })
        };

        let filename = field(name_col, "filename")?.to_string();
        let snr_text = field(snr_col, SNR_COLUMN)?;
        let snr_xprof = snr_text.parse::<f64>().map_err(|e| CatalogError::BadRow {
            line: line_no,
            message: format!("bad {} '{}': {}", SNR_COLUMN, snr_text, e),
        })?;

        entries.push(CatalogEntry {
            filename,
            snr_xprof,
        });
    }

    debug!("catalog: {} rows", entries.len());
    Ok(entries)
}

/// Read a catalog file.
pub fn read_catalog(path: &Path) -> Result<Vec<CatalogEntry>, CatalogError> {
    let file = File::open(path)?;
    let entries = parse_catalog(BufReader::new(file))?;
    info!("Loaded {} catalog rows from {}", entries.len(), path.display());
    Ok(entries)
}

/// Entries passing the `snr_xprof > admission_snr` gate, in catalog order.
pub fn admitted(entries: &[CatalogEntry], admission_snr: f64) -> Vec<CatalogEntry> {
    entries
        .iter()
        .filter(|e| e.is_admitted(admission_snr))
        .cloned()
        .collect()
}

fn expand_home(name: &str) -> PathBuf {
    if let Some(rest) = name.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(name)
}
