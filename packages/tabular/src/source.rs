//! Row-at-a-time reader for the input table.

use std::io::Read;

use crate::{Dialect, TabularError, normalize_header};

/// One data row read from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// 1-based data row number (the header is row 0).
    pub row: u64,
    /// Field values, space-trimmed, padded or truncated to the header width.
    pub fields: Vec<String>,
    /// Set when some bytes in the row were not valid UTF-8 and had to be
    /// replaced.
    pub decode_error: Option<String>,
}

impl SourceRecord {
    /// Returns the value at `index`, or `""` if the row is shorter.
    #[must_use]
    pub fn get(&self, index: usize) -> &str {
        self.fields.get(index).map_or("", String::as_str)
    }
}

/// Where the tokenizer is relative to the current field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Drops spaces at the start of every field before the bytes reach the
/// `csv` reader, so `"a", "b, c"` tokenizes as two quoted fields.
///
/// Spaces inside quoted fields are kept. The delimiter and `\n`/`\r` are
/// ASCII, so the byte scan never splits a UTF-8 sequence.
struct InitialSpaceSkipper<R> {
    inner: R,
    delimiter: u8,
    state: FieldState,
}

impl<R: Read> InitialSpaceSkipper<R> {
    const fn new(inner: R, delimiter: u8) -> Self {
        Self {
            inner,
            delimiter,
            state: FieldState::Start,
        }
    }

    /// Advances the state over `byte`; returns `false` if it is dropped.
    fn keep(&mut self, byte: u8) -> bool {
        let ends_field = byte == self.delimiter || byte == b'\n' || byte == b'\r';

        self.state = match (self.state, byte) {
            (FieldState::Start, b' ') => return false,
            (FieldState::Quoted, b'"') => FieldState::QuoteInQuoted,
            (FieldState::Quoted, _) => FieldState::Quoted,
            (FieldState::Start | FieldState::QuoteInQuoted, b'"') => FieldState::Quoted,
            (FieldState::Start | FieldState::Unquoted | FieldState::QuoteInQuoted, _)
                if ends_field =>
            {
                FieldState::Start
            }
            _ => FieldState::Unquoted,
        };

        true
    }
}

impl<R: Read> Read for InitialSpaceSkipper<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                return Ok(0);
            }

            let mut kept = 0;
            for i in 0..n {
                let byte = buf[i];
                if self.keep(byte) {
                    buf[kept] = byte;
                    kept += 1;
                }
            }

            // A chunk of nothing but skipped spaces must not read as EOF.
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// Streams [`SourceRecord`]s from a delimited text input.
///
/// Spaces directly after a delimiter are ignored, so a quoted field may be
/// preceded by `", "` and still be read as quoted.
pub struct RecordSource<R: Read> {
    reader: csv::Reader<InitialSpaceSkipper<R>>,
    header: Vec<String>,
    buffer: csv::ByteRecord,
    row: u64,
}

impl<R: Read> RecordSource<R> {
    /// Reads and normalizes the header row.
    ///
    /// # Errors
    ///
    /// Returns [`TabularError::MissingHeader`] for an empty input, or
    /// [`TabularError::Csv`] if the header cannot be read.
    pub fn new(input: R, dialect: Dialect) -> Result<Self, TabularError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(dialect.delimiter)
            .quote(b'"')
            .double_quote(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(InitialSpaceSkipper::new(input, dialect.delimiter));

        let header: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| normalize_header(&String::from_utf8_lossy(h)))
            .collect();

        if header.iter().all(String::is_empty) {
            return Err(TabularError::MissingHeader);
        }

        Ok(Self {
            reader,
            header,
            buffer: csv::ByteRecord::new(),
            row: 0,
        })
    }

    /// Normalized header names, in input order.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Reads the next data row, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`TabularError::Csv`] if the underlying reader fails.
    pub fn next_record(&mut self) -> Result<Option<SourceRecord>, TabularError> {
        if !self.reader.read_byte_record(&mut self.buffer)? {
            return Ok(None);
        }
        self.row += 1;

        if self.buffer.len() != self.header.len() {
            log::debug!(
                "row {} has {} fields, header has {}",
                self.row,
                self.buffer.len(),
                self.header.len()
            );
        }

        let mut decode_error = None;
        let fields = (0..self.header.len())
            .map(|i| {
                let raw = self.buffer.get(i).unwrap_or_default();
                match std::str::from_utf8(raw) {
                    Ok(s) => s.to_string(),
                    Err(e) => {
                        decode_error.get_or_insert_with(|| {
                            format!("column '{}' is not valid UTF-8: {e}", self.header[i])
                        });
                        String::from_utf8_lossy(raw).into_owned()
                    }
                }
            })
            .collect();

        Ok(Some(SourceRecord {
            row: self.row,
            fields,
            decode_error,
        }))
    }
}

impl<R: Read> Iterator for RecordSource<R> {
    type Item = Result<SourceRecord, TabularError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
