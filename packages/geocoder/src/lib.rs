#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address resolution for batch geocoding.
//!
//! Turns one free-text address query into exactly one
//! [`GeocodeOutcome`](geobatch_geocoder_models::GeocodeOutcome):
//!
//! 1. The query is sent to a [`GeocodingService`] asking for every match.
//! 2. [`selection::select_candidate`] picks one candidate, preferring
//!    candidates whose address components name one of the record's
//!    locality hints.
//! 3. [`resolver::AddressResolver`] wraps the call in a bounded retry loop
//!    driven by [`GeocodeError::disposition`], and converts every failure
//!    into a failure outcome so nothing escapes to the caller.
//!
//! The only production [`GeocodingService`] is the Google Geocoding API
//! client in [`google`].

pub mod google;
pub mod resolver;
pub mod selection;

use async_trait::async_trait;
use geobatch_geocoder_models::{ComponentRestrictions, GeocodeCandidate};
use thiserror::Error;

/// Errors raised by a geocoding service call.
///
/// The variants form a closed set; [`GeocodeError::disposition`] decides
/// which of them are worth another attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    /// The request did not complete in time.
    #[error("Service timed out: {message}")]
    Timeout {
        /// Description of the timeout.
        message: String,
    },

    /// The service rejected the query.
    #[error("Query rejected: {message}")]
    MalformedQuery {
        /// Description from the service.
        message: String,
    },

    /// The credential has exhausted its request quota.
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        /// Description from the service.
        message: String,
    },

    /// The client is misconfigured (e.g., missing API key).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The caller passed an argument the service can never accept.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument problem.
        message: String,
    },

    /// The response could not be understood.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Anything else (connection reset, unexpected HTTP status, ...).
    #[error("Geocoding failed: {message}")]
    Unclassified {
        /// Description of the failure.
        message: String,
    },
}

/// What the resolver should do after a [`GeocodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Try again straight away.
    Retry,
    /// Try again after the policy's delay.
    RetryAfterDelay,
    /// Stop and record the error.
    GiveUp,
}

impl GeocodeError {
    /// Classifies this error for the retry loop.
    #[must_use]
    pub const fn disposition(&self) -> RetryDisposition {
        match self {
            Self::Timeout { .. } | Self::MalformedQuery { .. } => RetryDisposition::Retry,
            Self::Unclassified { .. } => RetryDisposition::RetryAfterDelay,
            Self::QuotaExceeded { .. }
            | Self::Configuration { .. }
            | Self::InvalidArgument { .. }
            | Self::Parse { .. } => RetryDisposition::GiveUp,
        }
    }
}

impl GeocodeError {
    /// The error's own message, without the variant prefix used by
    /// `Display`. This is what ends up in the output's `Error` column.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Timeout { message }
            | Self::MalformedQuery { message }
            | Self::QuotaExceeded { message }
            | Self::Configuration { message }
            | Self::InvalidArgument { message }
            | Self::Parse { message }
            | Self::Unclassified { message } => message,
        }
    }
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                message: e.to_string(),
            }
        } else if e.is_decode() {
            Self::Parse {
                message: e.to_string(),
            }
        } else {
            Self::Unclassified {
                message: e.to_string(),
            }
        }
    }
}

/// A geocoding provider able to return every candidate for a query.
///
/// Implementations are constructed once per run and shared across every
/// query.
#[async_trait]
pub trait GeocodingService: Send + Sync {
    /// Returns all candidates for `query`, in the provider's order,
    /// constrained by `restrictions` when non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails or the response cannot
    /// be interpreted. An empty result is `Ok(vec![])`, not an error.
    async fn find_all(
        &self,
        query: &str,
        restrictions: &ComponentRestrictions,
    ) -> Result<Vec<GeocodeCandidate>, GeocodeError>;
}

#[async_trait]
impl<T: GeocodingService + ?Sized> GeocodingService for std::sync::Arc<T> {
    async fn find_all(
        &self,
        query: &str,
        restrictions: &ComponentRestrictions,
    ) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
        (**self).find_all(query, restrictions).await
    }
}
