#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Streaming record source and sink for delimited text files.
//!
//! [`source::RecordSource`] reads one row at a time and never buffers the
//! whole table. [`sink::RecordSink`] writes the normalized input header
//! plus the derived geocoding columns once, then one [`OutputRecord`] per
//! input row, flushing after each.
//!
//! Both sides share one [`Dialect`]: a single-byte delimiter, every field
//! quoted, `""` for embedded quotes, `\n` row terminator.

pub mod sink;
pub mod source;

use geobatch_geocoder_models::{DERIVED_COLUMNS, GeocodeOutcome};

/// Errors from reading or writing delimited text.
#[derive(Debug, thiserror::Error)]
pub enum TabularError {
    /// CSV parsing or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input has no header row.
    #[error("input file contains no header row")]
    MissingHeader,
}

/// Delimited-text dialect shared by input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Field delimiter byte.
    pub delimiter: u8,
}

impl Default for Dialect {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Strips surrounding whitespace and stray quote characters from a header
/// name, e.g. `  "Localidad" ` becomes `Localidad`.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}

/// One output row: the source fields in their original order followed by
/// the values for [`DERIVED_COLUMNS`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    fields: Vec<String>,
    derived: [String; DERIVED_COLUMNS.len()],
}

impl OutputRecord {
    /// Builds a row carrying a geocoding outcome.
    #[must_use]
    pub fn enriched(fields: Vec<String>, outcome: &GeocodeOutcome) -> Self {
        Self {
            fields,
            derived: outcome.derived_values(),
        }
    }

    /// Builds a row whose derived columns are all empty (used when the
    /// source row could not be processed).
    #[must_use]
    pub fn unenriched(fields: Vec<String>) -> Self {
        Self {
            fields,
            derived: Default::default(),
        }
    }

    /// Returns every value to write, space-trimmed, source fields first.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        self.fields
            .iter()
            .chain(self.derived.iter())
            .map(|v| v.trim())
            .collect()
    }
}
