#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Row-by-row batch geocoding driver.
//!
//! [`run`] streams the input table through the resolver:
//!
//! 1. Read the header, check every configured column exists, write the
//!    output header with the derived columns appended.
//! 2. For each row, build the address query, locality hints, and component
//!    restrictions from the configured columns.
//! 3. Resolve the query (retries included) before touching the next row.
//! 4. Write the augmented row and flush it immediately.
//!
//! Nothing is held across rows, and per-row failures never abort the run.

pub mod config;
pub mod progress;

use std::io::{Read, Write};
use std::sync::Arc;

use geobatch_geocoder::resolver::AddressResolver;
use geobatch_geocoder::{GeocodeError, GeocodingService};
use geobatch_geocoder_models::{AddressQuery, ComponentRestrictions, LocalityHints};
use geobatch_tabular::sink::RecordSink;
use geobatch_tabular::source::{RecordSource, SourceRecord};
use geobatch_tabular::{OutputRecord, TabularError};

use crate::config::{BatchConfig, ColumnConfig, ConfigError};
use crate::progress::ProgressCallback;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The geocoding client could not be constructed.
    #[error(transparent)]
    Geocoder(#[from] GeocodeError),

    /// Reading the input or writing the output failed.
    #[error(transparent)]
    Tabular(#[from] TabularError),

    /// A configured column is absent from the input header.
    #[error("Input file has no column named '{column}'")]
    MissingColumn {
        /// The column that was looked up.
        column: String,
    },
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Data rows read.
    pub rows: u64,
    /// Rows whose query resolved to a location.
    pub resolved: u64,
    /// Rows whose query produced a failure outcome.
    pub failed: u64,
    /// Rows written without geocoding because they could not be decoded.
    pub skipped: u64,
    /// Rows that could not be serialized to the output.
    pub unwritten: u64,
}

/// Configured column names resolved to positions in the input header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    address: Vec<usize>,
    locality: Vec<usize>,
    restrictions: Vec<(String, usize)>,
    separator: String,
}

impl ColumnPlan {
    /// Looks up every configured column in `header`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingColumn`] for the first configured
    /// column that `header` does not contain.
    pub fn new(columns: &ColumnConfig, header: &[String]) -> Result<Self, PipelineError> {
        let index_of = |name: &String| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| PipelineError::MissingColumn {
                    column: name.clone(),
                })
        };

        Ok(Self {
            address: columns
                .address
                .iter()
                .map(&index_of)
                .collect::<Result<_, _>>()?,
            locality: columns
                .locality
                .iter()
                .map(&index_of)
                .collect::<Result<_, _>>()?,
            restrictions: columns
                .component_restrictions
                .iter()
                .map(|(key, column)| Ok((key.clone(), index_of(column)?)))
                .collect::<Result<_, PipelineError>>()?,
            separator: columns.query_separator.clone(),
        })
    }

    /// Joins the address columns of `record` into a query.
    #[must_use]
    pub fn query(&self, record: &SourceRecord) -> AddressQuery {
        AddressQuery::from_values(
            self.address.iter().map(|&i| record.get(i).trim()),
            &self.separator,
        )
    }

    /// Locality hint values of `record`, in configured order.
    #[must_use]
    pub fn hints(&self, record: &SourceRecord) -> LocalityHints {
        self.locality
            .iter()
            .map(|&i| record.get(i).trim().to_string())
            .collect()
    }

    /// Component restrictions filled from `record`.
    #[must_use]
    pub fn restrictions(&self, record: &SourceRecord) -> ComponentRestrictions {
        self.restrictions
            .iter()
            .map(|(key, i)| (key.clone(), record.get(*i).trim().to_string()))
            .collect()
    }
}

/// Geocodes every row of `input` and writes the augmented rows to
/// `output`, stopping after `limit` data rows when given.
///
/// # Errors
///
/// Returns [`PipelineError`] if the header is missing, a configured column
/// is absent, or reading/writing fails at the I/O level. Geocoding
/// failures are recorded in the output instead.
pub async fn run<S, R, W>(
    config: &BatchConfig,
    resolver: &AddressResolver<S>,
    input: R,
    output: W,
    progress: &Arc<dyn ProgressCallback>,
    limit: Option<u64>,
) -> Result<RunSummary, PipelineError>
where
    S: GeocodingService,
    R: Read,
    W: Write,
{
    let dialect = config.dialect();
    let mut source = RecordSource::new(input, dialect)?;
    let plan = ColumnPlan::new(&config.columns, source.header())?;
    let mut sink = RecordSink::new(output, dialect, source.header())?;

    log::info!(
        "Geocoding rows with {} input columns (max {} attempts per address)",
        source.header().len(),
        resolver.policy().max_attempts()
    );

    let mut summary = RunSummary::default();

    while let Some(record) = source.next_record()? {
        if limit.is_some_and(|l| summary.rows >= l) {
            log::info!("Reached limit of {} rows", summary.rows);
            break;
        }
        summary.rows += 1;

        let output_record = if let Some(error) = &record.decode_error {
            log::error!("row {}: {error}; writing it without geocoding", record.row);
            log::error!("{:?}", record.fields);
            summary.skipped += 1;
            OutputRecord::unenriched(record.fields)
        } else {
            let query = plan.query(&record);
            let hints = plan.hints(&record);
            let restrictions = plan.restrictions(&record);

            let outcome = resolver.resolve(&query, &hints, &restrictions).await;
            if outcome.is_resolved() {
                summary.resolved += 1;
            } else {
                summary.failed += 1;
            }
            OutputRecord::enriched(record.fields, &outcome)
        };

        if !sink.write(&output_record)? {
            summary.unwritten += 1;
        }

        progress.inc(1);
        progress.set_message(format!(
            "{} resolved, {} failed",
            summary.resolved, summary.failed
        ));
    }

    let written = sink.rows_written();
    sink.into_inner()?;
    log::debug!("Wrote {written} rows to output");

    progress.finish(format!(
        "{} rows: {} resolved, {} failed, {} skipped",
        summary.rows, summary.resolved, summary.failed, summary.skipped
    ));

    Ok(summary)
}
