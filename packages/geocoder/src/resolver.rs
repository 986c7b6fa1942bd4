//! Bounded-retry address resolution.
//!
//! [`AddressResolver::resolve`] makes up to [`RetryPolicy::max_attempts`]
//! calls to the service for one query:
//!
//! - **Timeout / malformed query**: retried immediately.
//! - **Unclassified errors**: retried after [`RetryPolicy::delay`].
//! - **Quota, configuration, invalid argument, parse**: never retried.
//!
//! Once the attempts are used up, or a non-retryable error occurs, the last
//! error's message becomes a [`GeocodeOutcome::Failed`]. Errors never
//! propagate to the caller.

use std::time::Duration;

use geobatch_geocoder_models::{
    AddressQuery, ComponentRestrictions, GeocodeOutcome, LocalityHints, NO_LOCATION_FOUND,
};

use crate::selection::select_candidate;
use crate::{GeocodingService, RetryDisposition};

/// Default number of attempts per query, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default pause before retrying an unclassified error.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How many times to call the service for one query, and how long to wait
/// before retrying an unclassified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Total attempts per query, including the first one.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause before retrying an unclassified error.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Resolves address queries against a shared [`GeocodingService`].
pub struct AddressResolver<S> {
    service: S,
    policy: RetryPolicy,
}

impl<S: GeocodingService> AddressResolver<S> {
    /// Creates a resolver that reuses `service` for every query.
    #[must_use]
    pub const fn new(service: S, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    /// Returns the retry policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolves one query into exactly one outcome and logs it.
    pub async fn resolve(
        &self,
        query: &AddressQuery,
        hints: &LocalityHints,
        restrictions: &ComponentRestrictions,
    ) -> GeocodeOutcome {
        let outcome = self.attempt(query, hints, restrictions).await;
        trace_outcome(query, &outcome);
        outcome
    }

    async fn attempt(
        &self,
        query: &AddressQuery,
        hints: &LocalityHints,
        restrictions: &ComponentRestrictions,
    ) -> GeocodeOutcome {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1;

        loop {
            let error = match self.service.find_all(query.as_str(), restrictions).await {
                Ok(candidates) => {
                    return select_candidate(candidates, hints)
                        .map_or_else(|| GeocodeOutcome::failed(NO_LOCATION_FOUND), Into::into);
                }
                Err(e) => e,
            };

            let disposition = error.disposition();

            if disposition == RetryDisposition::GiveUp {
                log::debug!("not retrying '{query}': {error}");
                return GeocodeOutcome::failed(error.message());
            }

            if attempt >= max_attempts {
                log::warn!("giving up on '{query}' after {attempt} attempts: {error}");
                return GeocodeOutcome::failed(error.message());
            }

            log::warn!("attempt {attempt}/{max_attempts} for '{query}' failed: {error}");

            if disposition == RetryDisposition::RetryAfterDelay && !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }

            attempt += 1;
        }
    }
}

fn trace_outcome(query: &AddressQuery, outcome: &GeocodeOutcome) {
    log::info!("address line     : {query}");
    log::info!("geocoded address : {}", outcome.formatted_address());
    log::info!("location type    : {}", outcome.location_type());
    log::info!(
        "Lat/Long         : [{},{}]",
        outcome.latitude(),
        outcome.longitude()
    );
    log::info!("-------------------");
}
