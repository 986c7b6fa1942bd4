//! Google Geocoding API client.
//!
//! Issues `GET {base_url}?address=...&key=...` and returns every result in
//! the order Google ranked them. Component restrictions are sent as
//! `components=key:value|key:value`.
//!
//! Google reports most failures through the `status` field of an HTTP 200
//! response rather than through the HTTP status code, so both are mapped
//! onto [`GeocodeError`]:
//!
//! | `status`            | Result                                  |
//! |---------------------|-----------------------------------------|
//! | `OK`                | candidates                              |
//! | `ZERO_RESULTS`      | empty list                              |
//! | `OVER_QUERY_LIMIT`  | [`GeocodeError::QuotaExceeded`]         |
//! | `REQUEST_DENIED`    | [`GeocodeError::MalformedQuery`]        |
//! | `INVALID_REQUEST`   | [`GeocodeError::MalformedQuery`]        |
//! | anything else       | [`GeocodeError::MalformedQuery`]        |
//!
//! See <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use geobatch_geocoder_models::{
    AddressComponent, ComponentRestrictions, GeocodeCandidate, LocationType,
};
use serde::Deserialize;

use crate::{GeocodeError, GeocodingService};

/// Public Google Geocoding API JSON endpoint.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`GoogleGeocoder`].
#[derive(Clone)]
pub struct GoogleConfig {
    /// Endpoint URL (normally [`DEFAULT_BASE_URL`]).
    pub base_url: String,
    /// API key sent as the `key` query parameter.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Optional ccTLD region bias (e.g., `"ar"`).
    pub region: Option<String>,
    /// Optional result language (e.g., `"es"`).
    pub language: Option<String>,
}

impl GoogleConfig {
    /// Creates a configuration for the public endpoint with default timeout.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            region: None,
            language: None,
        }
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("region", &self.region)
            .field("language", &self.language)
            .finish()
    }
}

/// Geocoder backed by the Google Geocoding API.
///
/// Holds one [`reqwest::Client`] (and therefore one connection pool) for
/// the whole run.
#[derive(Debug)]
pub struct GoogleGeocoder {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleGeocoder {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Configuration`] if the API key is empty or
    /// the HTTP client cannot be constructed.
    pub fn new(config: GoogleConfig) -> Result<Self, GeocodeError> {
        if config.api_key.trim().is_empty() {
            return Err(GeocodeError::Configuration {
                message: "Google Geocoding API key is empty".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeocodeError::Configuration {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    fn query_params(
        &self,
        query: &str,
        restrictions: &ComponentRestrictions,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("address", query.to_string()),
            ("key", self.config.api_key.clone()),
        ];

        if let Some(components) = components_param(restrictions) {
            params.push(("components", components));
        }
        if let Some(region) = &self.config.region {
            params.push(("region", region.clone()));
        }
        if let Some(language) = &self.config.language {
            params.push(("language", language.clone()));
        }

        params
    }
}

#[async_trait]
impl GeocodingService for GoogleGeocoder {
    async fn find_all(
        &self,
        query: &str,
        restrictions: &ComponentRestrictions,
    ) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
        if query.trim().is_empty() {
            return Err(GeocodeError::InvalidArgument {
                message: "address query is empty".to_string(),
            });
        }

        let resp = self
            .client
            .get(&self.config.base_url)
            .query(&self.query_params(query, restrictions))
            .send()
            .await?;

        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::QuotaExceeded {
                message: format!("Google returned HTTP {status}"),
            });
        }

        if !status.is_success() {
            return Err(GeocodeError::Unclassified {
                message: format!("Google returned HTTP {status}"),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| GeocodeError::Parse {
            message: format!("Google response is not valid JSON: {e}"),
        })?;

        parse_response(&body)
    }
}

/// Formats restrictions as Google's `components` parameter, or `None` when
/// there are none.
fn components_param(restrictions: &ComponentRestrictions) -> Option<String> {
    if restrictions.is_empty() {
        return None;
    }

    Some(
        restrictions
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect::<Vec<_>>()
            .join("|"),
    )
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    status: String,
    #[serde(default)]
    results: Vec<RawResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    formatted_address: String,
    geometry: RawGeometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    location: RawLocation,
    location_type: LocationType,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lat: f64,
    lng: f64,
}

/// Parses a Geocoding API JSON body into candidates.
fn parse_response(body: &serde_json::Value) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
    let response = RawResponse::deserialize(body).map_err(|e| GeocodeError::Parse {
        message: format!("Unexpected Google response shape: {e}"),
    })?;

    check_status(&response.status, response.error_message.as_deref())?;

    Ok(response
        .results
        .into_iter()
        .map(|r| GeocodeCandidate {
            latitude: r.geometry.location.lat,
            longitude: r.geometry.location.lng,
            formatted_address: r.formatted_address,
            location_type: r.geometry.location_type,
            address_components: r.address_components,
        })
        .collect())
}

/// Maps a non-`OK` API status onto [`GeocodeError`].
fn check_status(status: &str, error_message: Option<&str>) -> Result<(), GeocodeError> {
    let with_detail = |base: &str| match error_message {
        Some(detail) if !detail.is_empty() => format!("{base} {detail}"),
        _ => base.to_string(),
    };

    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" => Err(GeocodeError::QuotaExceeded {
            message: with_detail(
                "The given key has gone over the requests limit in the 24 hour period \
                 or has submitted too many requests in too short a period of time.",
            ),
        }),
        "REQUEST_DENIED" => Err(GeocodeError::MalformedQuery {
            message: with_detail("Your request was denied."),
        }),
        "INVALID_REQUEST" => Err(GeocodeError::MalformedQuery {
            message: with_detail("Probably missing address or latlng."),
        }),
        _ => Err(GeocodeError::MalformedQuery {
            message: with_detail("Unknown error."),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_results() -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "results": [
                {
                    "formatted_address": "Springfield, IL, USA",
                    "geometry": {
                        "location": { "lat": 39.781_721, "lng": -89.650_148 },
                        "location_type": "APPROXIMATE"
                    },
                    "address_components": [
                        { "long_name": "Springfield", "short_name": "Springfield", "types": ["locality"] },
                        { "long_name": "Illinois", "short_name": "IL", "types": ["administrative_area_level_1"] }
                    ]
                },
                {
                    "formatted_address": "742 Evergreen Terrace, Springfield, OR, USA",
                    "geometry": {
                        "location": { "lat": 44.046_236, "lng": -123.022_029 },
                        "location_type": "ROOFTOP"
                    }
                }
            ]
        })
    }

    #[test]
    fn parses_all_results_in_order() {
        let candidates = parse_response(&two_results()).unwrap();
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert!((first.latitude - 39.781_721).abs() < 1e-6);
        assert!((first.longitude - -89.650_148).abs() < 1e-6);
        assert_eq!(first.location_type, LocationType::Approximate);
        assert_eq!(first.address_components.len(), 2);
        assert_eq!(first.address_components[1].short_name, "IL");

        let second = &candidates[1];
        assert_eq!(
            second.formatted_address,
            "742 Evergreen Terrace, Springfield, OR, USA"
        );
        assert_eq!(second.location_type, LocationType::Rooftop);
        assert!(second.address_components.is_empty());
    }

    #[test]
    fn zero_results_is_empty() {
        let body = serde_json::json!({ "status": "ZERO_RESULTS", "results": [] });
        assert!(parse_response(&body).unwrap().is_empty());
    }

    #[test]
    fn over_query_limit_is_quota_exceeded() {
        let body = serde_json::json!({
            "status": "OVER_QUERY_LIMIT",
            "results": [],
            "error_message": "You have exceeded your daily request quota."
        });
        let err = parse_response(&body).unwrap_err();
        assert!(matches!(err, GeocodeError::QuotaExceeded { .. }));
        assert!(err.to_string().ends_with("You have exceeded your daily request quota."));
    }

    #[test]
    fn denied_and_invalid_are_malformed_queries() {
        for status in ["REQUEST_DENIED", "INVALID_REQUEST", "UNKNOWN_ERROR"] {
            let body = serde_json::json!({ "status": status, "results": [] });
            assert!(
                matches!(
                    parse_response(&body),
                    Err(GeocodeError::MalformedQuery { .. })
                ),
                "{status}"
            );
        }
    }

    #[test]
    fn missing_geometry_is_parse_error() {
        let body = serde_json::json!({
            "status": "OK",
            "results": [{ "formatted_address": "nowhere" }]
        });
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn formats_components_param() {
        let restrictions: ComponentRestrictions =
            [("country", "AR"), ("administrative_area", "Buenos Aires")]
                .into_iter()
                .collect();
        assert_eq!(
            components_param(&restrictions).as_deref(),
            Some("administrative_area:Buenos Aires|country:AR")
        );
        assert!(components_param(&ComponentRestrictions::new()).is_none());
    }

    #[test]
    fn query_params_include_optional_settings() {
        let mut config = GoogleConfig::new("secret");
        config.region = Some("ar".to_string());
        let geocoder = GoogleGeocoder::new(config).unwrap();

        let params = geocoder.query_params("Main St", &ComponentRestrictions::new());
        let keys: Vec<&str> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["address", "key", "region"]);
    }

    #[test]
    fn empty_api_key_is_configuration_error() {
        assert!(matches!(
            GoogleGeocoder::new(GoogleConfig::new("  ")),
            Err(GeocodeError::Configuration { .. })
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let debug = format!("{:?}", GoogleConfig::new("super-secret"));
        assert!(!debug.contains("super-secret"));
    }

    /// Answers a single HTTP request with `status_line` and `body`, and
    /// returns the raw request text once done.
    async fn serve_once(
        status_line: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).into_owned();

            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        (format!("http://{addr}/maps/api/geocode/json"), handle)
    }

    fn local_geocoder(base_url: String) -> GoogleGeocoder {
        let mut config = GoogleConfig::new("secret");
        config.base_url = base_url;
        GoogleGeocoder::new(config).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_decodes_json_body() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", two_results().to_string()).await;

        let candidates = local_geocoder(url)
            .find_all("Main St", &ComponentRestrictions::new())
            .await
            .unwrap();
        let request = server.await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].formatted_address, "Springfield, IL, USA");
        assert!(request.starts_with("GET /maps/api/geocode/json?address=Main+St&key=secret"));
    }

    #[tokio::test]
    async fn non_json_body_is_parse_error() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", "<html>oops</html>".to_string()).await;

        let result = local_geocoder(url)
            .find_all("Main St", &ComponentRestrictions::new())
            .await;
        server.await.unwrap();

        assert!(matches!(result, Err(GeocodeError::Parse { .. })));
    }

    #[tokio::test]
    async fn too_many_requests_is_quota_exceeded() {
        let (url, server) = serve_once("HTTP/1.1 429 Too Many Requests", String::new()).await;

        let result = local_geocoder(url)
            .find_all("Main St", &ComponentRestrictions::new())
            .await;
        server.await.unwrap();

        assert!(matches!(result, Err(GeocodeError::QuotaExceeded { .. })));
    }

    #[tokio::test]
    async fn empty_query_is_invalid_argument() {
        let geocoder = GoogleGeocoder::new(GoogleConfig::new("secret")).unwrap();
        let result = geocoder.find_all("   ", &ComponentRestrictions::new()).await;
        assert!(matches!(result, Err(GeocodeError::InvalidArgument { .. })));
    }
}
