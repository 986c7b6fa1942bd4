//! Row-at-a-time writer for the output table.

use std::io::Write;

use geobatch_geocoder_models::DERIVED_COLUMNS;

use crate::{Dialect, OutputRecord, TabularError};

/// Streams [`OutputRecord`]s to a delimited text output, every field
/// quoted.
pub struct RecordSink<W: Write> {
    writer: csv::Writer<W>,
    rows_written: u64,
}

impl<W: Write> RecordSink<W> {
    /// Creates the sink and writes `header` followed by
    /// [`DERIVED_COLUMNS`].
    ///
    /// # Errors
    ///
    /// Returns [`TabularError`] if the header cannot be written.
    pub fn new(output: W, dialect: Dialect, header: &[String]) -> Result<Self, TabularError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(dialect.delimiter)
            .quote(b'"')
            .double_quote(true)
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(output);

        writer.write_record(
            header
                .iter()
                .map(|h| h.trim())
                .chain(DERIVED_COLUMNS.iter().copied()),
        )?;
        writer.flush()?;

        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    /// Writes one row and flushes it.
    ///
    /// A row that cannot be serialized is logged and skipped so the rest of
    /// the run can continue; `Ok(false)` is returned in that case.
    ///
    /// # Errors
    ///
    /// Returns [`TabularError`] only for I/O failures on the output itself.
    pub fn write(&mut self, record: &OutputRecord) -> Result<bool, TabularError> {
        let values = record.values();

        if let Err(e) = self.writer.write_record(&values) {
            if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                return Err(e.into());
            }
            log::error!("failed to write row: {e}");
            log::error!("{values:?}");
            return Ok(false);
        }

        self.writer.flush()?;
        self.rows_written += 1;
        Ok(true)
    }

    /// Number of data rows written so far.
    #[must_use]
    pub const fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`TabularError`] if the final flush fails.
    pub fn into_inner(self) -> Result<W, TabularError> {
        self.writer
            .into_inner()
            .map_err(|e| TabularError::Io(e.into_error()))
    }
}
