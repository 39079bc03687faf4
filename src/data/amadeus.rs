//! Amadeus flight-offers search API client
//!
//! This module authenticates against the Amadeus self-service API with the
//! OAuth2 client-credentials flow and fetches raw flight offers for a query key.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{QueryKey, RawOffer};

/// Path of the OAuth2 token endpoint
const TOKEN_PATH: &str = "/v1/security/oauth2/token";

/// Path of the flight-offers search endpoint
const FLIGHT_OFFERS_PATH: &str = "/v2/shopping/flight-offers";

/// Tokens are refreshed this many seconds before the API says they expire
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 30;

/// Errors that can occur when querying the flight search API
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The token endpoint rejected the client credentials
    #[error("Authentication failed ({status}): {detail}")]
    AuthFailed { status: StatusCode, detail: String },

    /// The search endpoint returned a non-success status
    #[error("Search request failed ({status}): {detail}")]
    SearchFailed { status: StatusCode, detail: String },
}

/// Amadeus environment to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Host {
    /// Free test environment with cached, partial inventory
    #[default]
    Test,
    /// Production environment
    Production,
}

impl Host {
    pub fn base_url(self) -> &'static str {
        match self {
            Host::Test => "https://test.api.amadeus.com",
            Host::Production => "https://api.amadeus.com",
        }
    }
}

/// Anything that can answer a flight search with raw offers
///
/// The cache store is generic over this so that it can be exercised without the
/// network.
#[allow(async_fn_in_trait)]
pub trait FlightSearch {
    /// Searches offers for `key`, pricing them in `currency`
    async fn search(&self, key: &QueryKey, currency: &str) -> Result<Vec<RawOffer>, ApiError>;
}

/// Response from the OAuth2 token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds
    expires_in: i64,
}

/// Envelope around a successful flight-offers response. A body without
/// `data` is a parse error, never an empty result.
#[derive(Debug, Deserialize)]
struct OffersResponse {
    data: Vec<RawOffer>,
}

/// Envelope around an error response
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<ApiIssue>,
    /// The token endpoint reports failures in OAuth2 style instead
    error_description: Option<String>,
}

/// A single entry in an error response
#[derive(Debug, Deserialize)]
struct ApiIssue {
    title: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Client for the Amadeus flight-offers search API
#[derive(Debug)]
pub struct AmadeusClient {
    http_client: Client,
    client_id: String,
    client_secret: String,
    /// Base URL for the API (allows override for testing)
    base_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl AmadeusClient {
    /// Creates a client for the given environment and credentials
    pub fn new(host: Host, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_base_url(host.base_url(), client_id, client_secret)
    }

    /// Creates a client against a custom base URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http_client: Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, requesting a new one when needed
    async fn access_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        debug!(base_url = %self.base_url, "requesting access token");
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, TOKEN_PATH))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::AuthFailed {
                status,
                detail: error_detail(&text),
            });
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        let access = AccessToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        let value = access.value.clone();
        self.store_token(access);
        Ok(value)
    }

    /// Poisoning is ignored: the slot only ever holds a complete token.
    fn token_slot(&self) -> MutexGuard<'_, Option<AccessToken>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_token(&self, token: AccessToken) {
        *self.token_slot() = Some(token);
    }

    fn cached_token(&self) -> Option<String> {
        self.token_slot()
            .as_ref()
            .filter(|token| token.is_fresh(Utc::now()))
            .map(|token| token.value.clone())
    }
}

impl FlightSearch for AmadeusClient {
    async fn search(&self, key: &QueryKey, currency: &str) -> Result<Vec<RawOffer>, ApiError> {
        let token = self.access_token().await?;
        let params = search_params(key, currency);

        let response = self
            .http_client
            .get(format!("{}{}", self.base_url, FLIGHT_OFFERS_PATH))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::SearchFailed {
                status,
                detail: error_detail(&text),
            });
        }

        parse_offers(&text)
    }
}

/// Builds the query string for a flight-offers search
fn search_params(key: &QueryKey, currency: &str) -> Vec<(&'static str, String)> {
    vec![
        ("originLocationCode", key.origin().to_string()),
        ("destinationLocationCode", key.destination().to_string()),
        ("departureDate", key.departure().format("%Y-%m-%d").to_string()),
        ("returnDate", key.return_date().format("%Y-%m-%d").to_string()),
        ("adults", key.adults().to_string()),
        ("currencyCode", currency.to_string()),
    ]
}

/// Extracts the offer array from a search response body
fn parse_offers(body: &str) -> Result<Vec<RawOffer>, ApiError> {
    let envelope: OffersResponse = serde_json::from_str(body)?;
    Ok(envelope.data)
}

/// Pulls a readable message out of an error body, falling back to the raw text
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed
            .errors
            .iter()
            .filter_map(|issue| issue.detail.as_deref().or(issue.title.as_deref()))
            .collect::<Vec<_>>()
            .join("; "),
        Ok(ErrorResponse {
            error_description: Some(description),
            ..
        }) => description,
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_key() -> QueryKey {
        QueryKey::new(
            "SYD",
            "LON",
            NaiveDate::from_ymd_opt(2023, 3, 15).unwrap(),
            NaiveDate::from_ymd_opt(2023, 7, 26).unwrap(),
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_host_base_urls() {
        assert_eq!(Host::Test.base_url(), "https://test.api.amadeus.com");
        assert_eq!(Host::Production.base_url(), "https://api.amadeus.com");
        assert_eq!(Host::default(), Host::Test);
    }

    #[test]
    fn test_search_params_carry_query_key() {
        let params = search_params(&sample_key(), "GBP");
        assert_eq!(
            params,
            vec![
                ("originLocationCode", "SYD".to_string()),
                ("destinationLocationCode", "LON".to_string()),
                ("departureDate", "2023-03-15".to_string()),
                ("returnDate", "2023-07-26".to_string()),
                ("adults", "2".to_string()),
                ("currencyCode", "GBP".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_offers_returns_data_array_verbatim() {
        let body = r#"{
            "meta": {"count": 2},
            "data": [{"id": "1", "extra": {"nested": true}}, {"id": "2"}],
            "dictionaries": {}
        }"#;
        let offers = parse_offers(body).unwrap();
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0]["id"], "1");
        assert_eq!(offers[0]["extra"]["nested"], true);
    }

    #[test]
    fn test_parse_offers_rejects_body_without_data() {
        let result = parse_offers(r#"{"warnings": [{"detail": "partial results"}]}"#);
        match result {
            Err(ApiError::ParseError(err)) => assert!(err.to_string().contains("data")),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_offers_accepts_empty_data_array() {
        let offers = parse_offers(r#"{"meta": {"count": 0}, "data": []}"#).unwrap();
        assert!(offers.is_empty());
    }

    #[test]
    fn test_parse_offers_rejects_invalid_json() {
        let result = parse_offers("<html>gateway timeout</html>");
        assert!(matches!(result, Err(ApiError::ParseError(_))));
    }

    #[test]
    fn test_error_detail_joins_api_errors() {
        let body = r#"{"errors": [
            {"status": 400, "code": 477, "title": "INVALID FORMAT", "detail": "departureDate must be in the future"},
            {"status": 400, "code": 32171, "title": "MANDATORY DATA MISSING"}
        ]}"#;
        assert_eq!(
            error_detail(body),
            "departureDate must be in the future; MANDATORY DATA MISSING"
        );
    }

    #[test]
    fn test_error_detail_reads_oauth_description() {
        let body = r#"{"error": "invalid_client", "error_description": "Client credentials are invalid"}"#;
        assert_eq!(error_detail(body), "Client credentials are invalid");
    }

    #[test]
    fn test_error_detail_falls_back_to_raw_body() {
        assert_eq!(error_detail("  Service Unavailable \n"), "Service Unavailable");
    }

    #[test]
    fn test_access_token_freshness_respects_margin() {
        let now = Utc::now();
        let fresh = AccessToken {
            value: "abc".to_string(),
            expires_at: now + Duration::seconds(600),
        };
        let nearly_expired = AccessToken {
            value: "abc".to_string(),
            expires_at: now + Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS - 1),
        };
        assert!(fresh.is_fresh(now));
        assert!(!nearly_expired.is_fresh(now));
    }

    #[test]
    fn test_cached_token_survives_poisoned_lock() {
        let client = AmadeusClient::with_base_url("http://localhost", "id", "secret");
        client.store_token(AccessToken {
            value: "abc".to_string(),
            expires_at: Utc::now() + Duration::seconds(1800),
        });

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = client.token.lock().unwrap();
            panic!("poison the token lock");
        }));
        assert!(client.token.is_poisoned());

        assert_eq!(client.cached_token().as_deref(), Some("abc"));
        client.store_token(AccessToken {
            value: "def".to_string(),
            expires_at: Utc::now() + Duration::seconds(1800),
        });
        assert_eq!(client.cached_token().as_deref(), Some("def"));
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let client = AmadeusClient::with_base_url("http://localhost:8080/", "id", "secret");
        assert_eq!(client.base_url, "http://localhost:8080");
        assert!(client.cached_token().is_none());
    }
}
