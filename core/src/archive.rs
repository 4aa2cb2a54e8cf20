//! Profile sources: turning observation files into folded profiles.
//!
//! Pulsar observations are normally stored as PSRCHIVE archives: a cube of
//! sub-integrations × polarisations × channels × phase bins with per-channel
//! weights.  Decoding that binary format is PSRCHIVE's job; this module reads
//! its text export instead:
//!
//! - **`pdv -t` dumps** — rows of `isub ichan ibin flux [more pols…]`, with
//!   a `File:` banner line per sub-integration.
//! - **Plain columns** — one flux value per line, or `ibin flux` pairs.
//!
//! Multi-channel or multi-sub-integration dumps are collapsed into a single
//! profile by a weighted mean ([`collapse_cube`]).  The [`ProfileSource`]
//! trait lets hosts plug in other loaders (the Python bindings, for example,
//! hand over arrays already extracted with the `psrchive` module).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use ndarray::{Array2, Array3, Axis};

use crate::types::Profile;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a profile.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("data shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("no usable samples: {0}")]
    Empty(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstract interface for obtaining a folded profile from a file.
///
/// Implementations must be shareable across threads: batches load files
/// concurrently.
pub trait ProfileSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Profile, LoadError>;
}

// ---------------------------------------------------------------------------
// Cube collapse
// ---------------------------------------------------------------------------

/// Collapse a `(nsub, nchan, nbin)` cube into one profile.
///
/// Each `(sub-integration, channel)` row is multiplied by its weight and the
/// result is divided by the total weight, so zero-weighted (flagged)
/// channels drop out entirely.
pub fn collapse_cube(data: &Array3<f32>, weights: &Array2<f32>) -> Result<Profile, LoadError> {
    let (nsub, nchan, nbin) = data.dim();
    if nsub == 0 || nchan == 0 || nbin == 0 {
        return Err(LoadError::Empty(format!(
            "cube has shape ({}, {}, {})",
            nsub, nchan, nbin
        )));
    }
    if weights.dim() != (nsub, nchan) {
        return Err(LoadError::ShapeMismatch {
            expected: format!("({}, {})", nsub, nchan),
            actual: format!("{:?}", weights.dim()),
        });
    }

    let weights = weights.mapv(f64::from);
    let total_weight = weights.sum();
    if !(total_weight > 0.0) {
        return Err(LoadError::Empty("every channel is zero-weighted".into()));
    }

    let weighted = &data.mapv(f64::from) * &weights.insert_axis(Axis(2));
    let summed = weighted.sum_axis(Axis(0)).sum_axis(Axis(0));
    Ok(Profile::new(
        summed.iter().map(|v| v / total_weight).collect(),
    ))
}

// ---------------------------------------------------------------------------
// Text (pdv) reader
// ---------------------------------------------------------------------------

/// Column layout of a text profile, fixed by its first data row.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Layout {
    /// `flux`
    Flux,
    /// `ibin flux`
    BinFlux,
    /// `isub ichan ibin flux [...]`
    Pdv,
}

/// Reader for `pdv`-style text dumps and plain profile columns.
#[derive(Clone, Debug, Default)]
pub struct AsciiProfileReader;

impl AsciiProfileReader {
    /// Parse a text profile from any buffered reader.
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Profile, LoadError> {
        let mut layout: Option<Layout> = None;
        let mut rows: Vec<(usize, usize, usize, f32)> = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("File:") {
                continue;
            }

            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            let row_layout = match tokens.len() {
                1 => Layout::Flux,
                2 => Layout::BinFlux,
                n if n >= 4 => Layout::Pdv,
                n => {
                    return Err(LoadError::Parse {
                        line: line_no,
                        message: format!("expected 1, 2 or at least 4 columns, found {}", n),
                    })
                }
            };
            match layout {
                None => layout = Some(row_layout),
                Some(l) if l != row_layout => {
                    return Err(LoadError::Parse {
                        line: line_no,
                        message: "column count changes mid-file".into(),
                    })
                }
                Some(_) => {}
            }

            let row = match row_layout {
                Layout::Flux => (0, 0, rows.len(), parse_flux(tokens[0], line_no)?),
                Layout::BinFlux => (
                    0,
                    0,
                    parse_index(tokens[0], line_no)?,
                    parse_flux(tokens[1], line_no)?,
                ),
                Layout::Pdv => (
                    parse_index(tokens[0], line_no)?,
                    parse_index(tokens[1], line_no)?,
                    parse_index(tokens[2], line_no)?,
                    parse_flux(tokens[3], line_no)?,
                ),
            };
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(LoadError::Empty("no data rows".into()));
        }

        let extent = |axis: &str, max: usize| {
            max.checked_add(1).ok_or_else(|| LoadError::ShapeMismatch {
                expected: format!("{} index below {}", axis, usize::MAX),
                actual: max.to_string(),
            })
        };
        let nsub = extent("sub-integration", rows.iter().map(|r| r.0).max().unwrap_or(0))?;
        let nchan = extent("channel", rows.iter().map(|r| r.1).max().unwrap_or(0))?;
        let nbin = extent("bin", rows.iter().map(|r| r.2).max().unwrap_or(0))?;

        // Every (sub, chan, bin) cell must appear exactly once; anything else
        // would leave zeros standing in for missing samples.
        let cells = nsub
            .checked_mul(nchan)
            .and_then(|n| n.checked_mul(nbin))
            .filter(|&n| n == rows.len())
            .ok_or_else(|| LoadError::ShapeMismatch {
                expected: format!("{} x {} x {} rows", nsub, nchan, nbin),
                actual: format!("{} rows", rows.len()),
            })?;
        debug!(
            "text profile: {} rows, layout {:?}, cube ({}, {}, {})",
            rows.len(),
            layout,
            nsub,
            nchan,
            nbin
        );

        let mut cube = Array3::<f32>::zeros((nsub, nchan, nbin));
        let mut seen = vec![false; cells];
        for &(isub, ichan, ibin, flux) in &rows {
            let cell = (isub * nchan + ichan) * nbin + ibin;
            if seen[cell] {
                return Err(LoadError::ShapeMismatch {
                    expected: "one row per (sub, chan, bin)".into(),
                    actual: format!("duplicate row for ({}, {}, {})", isub, ichan, ibin),
                });
            }
            seen[cell] = true;
            cube[[isub, ichan, ibin]] = flux;
        }
        let weights = Array2::<f32>::ones((nsub, nchan));
        collapse_cube(&cube, &weights)
    }
}

impl ProfileSource for AsciiProfileReader {
    fn load(&self, path: &Path) -> Result<Profile, LoadError> {
        let file = File::open(path)?;
        self.parse(BufReader::new(file))
    }
}

fn parse_index(token: &str, line: usize) -> Result<usize, LoadError> {
    token.parse::<usize>().map_err(|e| LoadError::Parse {
        line,
        message: format!("bad index '{}': {}", token, e),
    })
}

fn parse_flux(token: &str, line: usize) -> Result<f32, LoadError> {
    let flux = token.parse::<f32>().map_err(|e| LoadError::Parse {
        line,
        message: format!("bad flux '{}': {}", token, e),
    })?;
    if !flux.is_finite() {
        return Err(LoadError::Parse {
            line,
            message: format!("non-finite flux '{}'", token),
        });
    }
    Ok(flux)
}

// ---------------------------------------------------------------------------
// High-level reader with format auto-detection
// ---------------------------------------------------------------------------

/// Extensions of PSRCHIVE binary archives, which must be exported first.
const PSRCHIVE_EXTENSIONS: &[&str] = &["ar", "rf", "cf", "fits", "sf", "calib", "zap"];

/// Auto-detecting profile reader.
///
/// Inspects the file extension and delegates to the matching backend.
#[derive(Clone, Debug, Default)]
pub struct ArchiveReader;

impl ArchiveReader {
    pub fn new() -> Self {
        Self
    }
}

impl ProfileSource for ArchiveReader {
    fn load(&self, path: &Path) -> Result<Profile, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "txt" | "ascii" | "pdv" | "dat" | "prof" => AsciiProfileReader.load(path),
            e if PSRCHIVE_EXTENSIONS.contains(&e) => Err(LoadError::UnsupportedFormat(format!(
                "{} is a PSRCHIVE archive; export it with `pdv -t` first",
                path.display()
            ))),
            other => Err(LoadError::UnsupportedFormat(format!(
                "unrecognised extension '{}' on {}",
                other,
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn parses_single_column() {
        let text = "# profile\n1.0\n2.5\n\n-0.5\n";
        let profile = AsciiProfileReader.parse(Cursor::new(text)).unwrap();
        assert_eq!(profile.samples(), &[1.0, 2.5, -0.5]);
    }

    #[test]
    fn parses_bin_flux_pairs_out_of_order() {
        let text = "2 3.0\n0 1.0\n1 2.0\n";
        let profile = AsciiProfileReader.parse(Cursor::new(text)).unwrap();
        assert_eq!(profile.samples(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn averages_pdv_channels() {
        let text = "File: obs.ar Src: J0000+0000 Nsub: 1 Nch: 2 Npol: 1 Nbin: 3\n\
                    0 0 0 1.0\n0 0 1 2.0\n0 0 2 3.0\n\
                    0 1 0 3.0\n0 1 1 4.0\n0 1 2 5.0\n";
        let profile = AsciiProfileReader.parse(Cursor::new(text)).unwrap();
        assert_eq!(profile.samples(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn rejects_mixed_layouts() {
        let text = "1.0\n0 2.0\n";
        let err = AsciiProfileReader.parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, LoadError::Parse { line: 2, .. }));
    }

    #[test]
    fn rejects_garbage_flux() {
        let err = AsciiProfileReader.parse(Cursor::new("1.0\nabc\n")).unwrap_err();
        assert!(matches!(err, LoadError::Parse { line: 2, .. }));
    }

    #[test]
    fn rejects_non_finite_flux() {
        for text in ["1.0\nnan\n2.0\n", "0 1.0\n1 inf\n", "0 0 0 1.0\n0 0 1 -inf\n"] {
            let err = AsciiProfileReader.parse(Cursor::new(text)).unwrap_err();
            assert!(matches!(err, LoadError::Parse { line: 2, .. }), "{:?}", err);
        }
    }

    #[test]
    fn overflowing_index_is_rejected() {
        let text = "18446744073709551615 1.0\n0 2.0\n";
        let err = AsciiProfileReader.parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, LoadError::ShapeMismatch { .. }), "{:?}", err);
    }

    #[test]
    fn gaps_in_bins_are_rejected() {
        let err = AsciiProfileReader
            .parse(Cursor::new("0 5.0\n900 2.0\n"))
            .unwrap_err();
        assert!(matches!(err, LoadError::ShapeMismatch { .. }), "{:?}", err);
    }

    #[test]
    fn duplicate_bins_are_rejected() {
        let err = AsciiProfileReader
            .parse(Cursor::new("0 1.0\n0 2.0\n2 3.0\n"))
            .unwrap_err();
        assert!(matches!(err, LoadError::ShapeMismatch { .. }), "{:?}", err);
    }

    #[test]
    fn missing_pdv_channel_rows_are_rejected() {
        let text = "0 0 0 1.0\n0 0 1 2.0\n0 1 0 3.0\n";
        let err = AsciiProfileReader.parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, LoadError::ShapeMismatch { .. }), "{:?}", err);
    }

    #[test]
    fn empty_text_is_an_error() {
        let err = AsciiProfileReader.parse(Cursor::new("# nothing\n")).unwrap_err();
        assert!(matches!(err, LoadError::Empty(_)));
    }

    #[test]
    fn zero_weighted_channels_drop_out() {
        let mut cube = Array3::<f32>::zeros((1, 2, 2));
        cube[[0, 0, 0]] = 4.0;
        cube[[0, 0, 1]] = 6.0;
        cube[[0, 1, 0]] = 1000.0;
        cube[[0, 1, 1]] = 1000.0;
        let mut weights = Array2::<f32>::zeros((1, 2));
        weights[[0, 0]] = 1.0;
        let profile = collapse_cube(&cube, &weights).unwrap();
        assert_eq!(profile.samples(), &[4.0, 6.0]);
    }

    #[test]
    fn weight_shape_must_match() {
        let cube = Array3::<f32>::zeros((2, 2, 4));
        let weights = Array2::<f32>::ones((2, 3));
        assert!(matches!(
            collapse_cube(&cube, &weights),
            Err(LoadError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn reader_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "0.5\n1.5\n0.5").unwrap();

        let profile = ArchiveReader::new().load(&path).unwrap();
        assert_eq!(profile.nbins(), 3);

        let err = ArchiveReader::new()
            .load(&dir.path().join("obs.ar"))
            .unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AsciiProfileReader
            .load(Path::new("/nonexistent/profile.txt"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
