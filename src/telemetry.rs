//! Append-only progress sink, one whitespace-separated line per generation.
//!
//! Columns: `|best f|`, cumulative evaluations, step size,
//! `sqrt(max_eig / min_eig)`, the `n` cached eigenvalues, the `n` per-axis
//! deviations `sqrt(C_ii)`, the `n` mean coordinates, and the wall time of
//! the latest generation in milliseconds. A row therefore has `3n + 5`
//! fields.

use core::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::solutions::CmaSolutions;

/// Line-oriented writer for per-generation progress rows.
pub struct TelemetryWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl TelemetryWriter {
    /// Create (or truncate) the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Telemetry`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::Telemetry(format!("{}: {e}", path.display())))?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    /// Path of the sink.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row for the current state and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Telemetry`] if the write or flush fails.
    pub fn write_row(&mut self, solutions: &CmaSolutions) -> Result<()> {
        let line = format_row(solutions);
        writeln!(self.out, "{line}").map_err(|e| Error::Telemetry(e.to_string()))?;
        self.out
            .flush()
            .map_err(|e| Error::Telemetry(e.to_string()))
    }
}

/// Render one telemetry row (without trailing newline).
#[must_use]
pub fn format_row(solutions: &CmaSolutions) -> String {
    let fbest = solutions
        .best_candidate()
        .map_or(f64::NAN, |c| c.fvalue.abs());
    let mut line = format!(
        "{fbest} {} {} {}",
        solutions.nevals,
        solutions.sigma,
        solutions.condition_number().sqrt()
    );

    let deviations = solutions.axis_deviations();
    for v in solutions
        .leigenvalues
        .iter()
        .chain(deviations.iter())
        .chain(solutions.xmean.iter())
    {
        // Writing to a String cannot fail.
        let _ = write!(line, " {v}");
    }
    let _ = write!(
        line,
        " {}",
        solutions.elapsed.last_iter.as_secs_f64() * 1000.0
    );
    line
}
