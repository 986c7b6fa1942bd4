#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for batch address geocoding.
//!
//! This crate contains only data types and simple conversions. It has no
//! I/O and no knowledge of any particular geocoding provider's wire format.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// Names of the columns appended to every output row, in output order.
pub const DERIVED_COLUMNS: [&str; 5] = ["Lat", "Long", "Error", "formatted_address", "location_type"];

/// Error message recorded when the service returns no candidates at all.
pub const NO_LOCATION_FOUND: &str = "no location found, please verify your address line";

/// A single free-text query built from a fixed, ordered list of record
/// fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery(String);

impl AddressQuery {
    /// Joins `values` with `separator`, in the order given.
    #[must_use]
    pub fn from_values<I, S>(values: I, separator: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(separator);
        Self(joined)
    }

    /// Returns the query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AddressQuery {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for AddressQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Record values (e.g., city, province) used to rank candidates against
/// each other. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalityHints(Vec<String>);

impl LocalityHints {
    /// Creates hints from record values, keeping their order.
    #[must_use]
    pub const fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    /// Returns `true` if `name` is exactly equal to any hint.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|hint| hint == name)
    }

    /// Returns `true` when there are no hints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LocalityHints {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Provider-defined restriction keys (e.g., `country`,
/// `administrative_area`) mapped to values taken from the record.
///
/// Empty by default, in which case no restriction is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentRestrictions(BTreeMap<String, String>);

impl ComponentRestrictions {
    /// Creates an empty restriction set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds or replaces the restriction for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns `true` when no restriction is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ComponentRestrictions {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One named part of a candidate's address (street, locality, province...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddressComponent {
    /// Full name, e.g. `"Buenos Aires"`.
    #[serde(default)]
    pub long_name: String,
    /// Abbreviated name, e.g. `"BA"`.
    #[serde(default)]
    pub short_name: String,
    /// Provider feature types (`locality`, `administrative_area_level_1`, ...).
    #[serde(default)]
    pub types: Vec<String>,
}

/// Precision of a geocoded point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum LocationType {
    /// Precise street-address match.
    Rooftop,
    /// Interpolated between two precise points.
    RangeInterpolated,
    /// Center of a polyline or polygon result.
    GeometricCenter,
    /// Approximate result.
    Approximate,
    /// Any classification this crate does not know about, kept verbatim.
    Other(String),
}

impl LocationType {
    /// Returns the provider's wire name for this classification.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Rooftop => "ROOFTOP",
            Self::RangeInterpolated => "RANGE_INTERPOLATED",
            Self::GeometricCenter => "GEOMETRIC_CENTER",
            Self::Approximate => "APPROXIMATE",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for LocationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ROOFTOP" => Self::Rooftop,
            "RANGE_INTERPOLATED" => Self::RangeInterpolated,
            "GEOMETRIC_CENTER" => Self::GeometricCenter,
            "APPROXIMATE" => Self::Approximate,
            _ => Self::Other(value),
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One result returned by the geocoding service for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCandidate {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Canonical address as formatted by the service.
    pub formatted_address: String,
    /// Precision classification.
    pub location_type: LocationType,
    /// Structured address parts, possibly empty.
    pub address_components: Vec<AddressComponent>,
}

impl GeocodeCandidate {
    /// Returns `true` if any component's long or short name equals any of
    /// `hints`.
    #[must_use]
    pub fn matches_any(&self, hints: &LocalityHints) -> bool {
        self.address_components
            .iter()
            .any(|c| hints.contains(&c.long_name) || hints.contains(&c.short_name))
    }
}

/// The resolved result for one query, including any retries.
///
/// A failure always carries zero coordinates and blank address fields, so
/// a mix of the two shapes cannot be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    /// A candidate was selected.
    Resolved {
        /// Latitude (WGS84).
        latitude: f64,
        /// Longitude (WGS84).
        longitude: f64,
        /// Canonical address as formatted by the service.
        formatted_address: String,
        /// Precision classification.
        location_type: String,
    },
    /// Resolution failed; `error` is human readable.
    Failed {
        /// Description of the failure.
        error: String,
    },
}

impl GeocodeOutcome {
    /// Builds a failure outcome.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Returns `true` for [`GeocodeOutcome::Resolved`].
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// Latitude, or `0` for a failure.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        match self {
            Self::Resolved { latitude, .. } => *latitude,
            Self::Failed { .. } => 0.0,
        }
    }

    /// Longitude, or `0` for a failure.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        match self {
            Self::Resolved { longitude, .. } => *longitude,
            Self::Failed { .. } => 0.0,
        }
    }

    /// Error message, or `""` on success.
    #[must_use]
    pub fn error(&self) -> &str {
        match self {
            Self::Resolved { .. } => "",
            Self::Failed { error } => error,
        }
    }

    /// Formatted address, or `""` for a failure.
    #[must_use]
    pub fn formatted_address(&self) -> &str {
        match self {
            Self::Resolved {
                formatted_address, ..
            } => formatted_address,
            Self::Failed { .. } => "",
        }
    }

    /// Location type, or `""` for a failure.
    #[must_use]
    pub fn location_type(&self) -> &str {
        match self {
            Self::Resolved { location_type, .. } => location_type,
            Self::Failed { .. } => "",
        }
    }

    /// Values for [`DERIVED_COLUMNS`], in the same order.
    #[must_use]
    pub fn derived_values(&self) -> [String; 5] {
        [
            self.latitude().to_string(),
            self.longitude().to_string(),
            self.error().to_string(),
            self.formatted_address().to_string(),
            self.location_type().to_string(),
        ]
    }
}

impl From<GeocodeCandidate> for GeocodeOutcome {
    fn from(candidate: GeocodeCandidate) -> Self {
        Self::Resolved {
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            formatted_address: candidate.formatted_address,
            location_type: candidate.location_type.as_str().to_string(),
        }
    }
}
