//! Output tables: the per-file component summary and the skip log.
//!
//! The summary is tab-separated with header
//! `filename snr_1 phase_1 … snr_N phase_N`, values printed with three
//! decimals and blank cells where a file has fewer than N components.  Rows
//! appear in processing order and duplicated filenames are kept.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::info;

use crate::batch::SkippedFile;
use crate::types::ProfileResult;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("summary has no header row")]
    MissingHeader,

    #[error("line {line}: {message}")]
    BadRow { line: usize, message: String },
}

/// One parsed row of a summary table.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryRow {
    pub filename: String,

    /// `(phase, snr)` pairs in column order.
    pub pairs: Vec<(f64, f64)>,
}

/// Header of a summary table with `width` component columns.
pub fn summary_header(width: usize) -> String {
    let mut cols = vec!["filename".to_string()];
    for i in 1..=width {
        cols.push(format!("snr_{}", i));
        cols.push(format!("phase_{}", i));
    }
    cols.join("\t")
}

/// Write the summary table for `results` with `width` component columns.
///
/// Components beyond `width` are not written.
pub fn write_summary<W: Write>(
    mut out: W,
    results: &[ProfileResult],
    width: usize,
) -> Result<(), ReportError> {
    writeln!(out, "{}", summary_header(width))?;
    for result in results {
        let mut cells = vec![result.filename.clone()];
        for i in 0..width {
            match result.components.get(i) {
                Some(c) => {
                    cells.push(format!("{:.3}", c.snr));
                    cells.push(format!("{:.3}", c.phase));
                }
                None => {
                    cells.push(String::new());
                    cells.push(String::new());
                }
            }
        }
        writeln!(out, "{}", cells.join("\t"))?;
    }
    out.flush()?;
    Ok(())
}

/// Write the summary table to `path`.
pub fn save_summary(path: &Path, results: &[ProfileResult], width: usize) -> Result<(), ReportError> {
    let file = File::create(path)?;
    write_summary(BufWriter::new(file), results, width)?;
    info!("Saved pulse summary for {} files to {}", results.len(), path.display());
    Ok(())
}

/// Parse a summary table written by [`write_summary`].
pub fn read_summary<R: BufRead>(reader: R) -> Result<Vec<SummaryRow>, ReportError> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(ReportError::MissingHeader),
    };
    let ncols = header.split('\t').count();
    if ncols % 2 == 0 {
        return Err(ReportError::BadRow {
            line: 1,
            message: format!("expected filename plus snr/phase pairs, found {} columns", ncols),
        });
    }

    let mut rows = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        let line_no = idx + 2;
        if line.trim().is_empty() {
            continue;
        }

        let cells: Vec<&str> = line.split('\t').collect();
        let filename = cells[0].to_string();
        let mut pairs = Vec::new();
        for pair in cells[1..].chunks(2) {
            let snr = pair[0].trim();
            let phase = pair.get(1).map(|p| p.trim()).unwrap_or("");
            if snr.is_empty() && phase.is_empty() {
                continue;
            }
            pairs.push((parse_cell(phase, line_no)?, parse_cell(snr, line_no)?));
        }
        rows.push(SummaryRow { filename, pairs });
    }
    Ok(rows)
}

/// Read a summary table from `path`.
pub fn load_summary(path: &Path) -> Result<Vec<SummaryRow>, ReportError> {
    let file = File::open(path)?;
    read_summary(BufReader::new(file))
}

fn parse_cell(text: &str, line: usize) -> Result<f64, ReportError> {
    text.parse::<f64>().map_err(|e| ReportError::BadRow {
        line,
        message: format!("bad value '{}': {}", text, e),
    })
}

/// Write the `filename<TAB>reason` log of skipped files.
pub fn write_skipped<W: Write>(mut out: W, skipped: &[SkippedFile]) -> Result<(), ReportError> {
    writeln!(out, "filename\treason")?;
    for s in skipped {
        // Reasons are free text; keep them on one row.
        let reason = s.reason.replace(['\t', '\n'], " ");
        writeln!(out, "{}\t{}", s.filename, reason)?;
    }
    out.flush()?;
    Ok(())
}
