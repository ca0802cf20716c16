// Login exchange against the token endpoints

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use super::credentials::Credentials;
use super::types::{CheckTokenResponse, Token, TokenStatus};
use crate::error::{Error, Result};

/// Keys the token may arrive under, tried in order
pub const TOKEN_ALIASES: [&str; 4] = ["token", "access_token", "auth_token", "key"];

/// Lifetime assumed when the server does not send one
pub const DEFAULT_TOKEN_LIFETIME_MINUTES: i64 = 60;

/// Performs the login exchange and reports server-side token status
///
/// Implementations are stateless; storing the token is the caller's job.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange credentials for a fresh token
    async fn authenticate(&self, credentials: &Credentials) -> Result<Token>;

    /// Ask the server whether a token is already issued for these credentials
    async fn check_token(&self, credentials: &Credentials) -> Result<TokenStatus>;
}

/// Authenticator backed by the `/get-token` and `/check-token` endpoints
pub struct HttpAuthenticator {
    client: Client,
    base_url: String,
}

impl HttpAuthenticator {
    /// `client` should carry the request and connect timeouts
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// POST the login body and return the status plus raw body text
    async fn post_credentials(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<(StatusCode, String, Option<reqwest::Error>)> {
        let url = self.url(endpoint);

        let response: Response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&credentials.login_request())
            .send()
            .await
            .map_err(|e| Error::network(format!("Failed to send {} request", endpoint), e))?;

        let status = response.status();
        let status_error = response.error_for_status_ref().err();
        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read {} response", endpoint), e))?;

        Ok((status, body, status_error))
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Token> {
        tracing::info!(username = %credentials.username(), "Generating new token...");

        let (status, body, status_error) = self.post_credentials("get-token", credentials).await?;
        if !status.is_success() {
            return Err(reject("get-token", status, &body, status_error));
        }

        let data: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Token response is not valid JSON");
            Error::AuthError("token response is not valid JSON".to_string())
        })?;

        let value = match extract_token(&data) {
            Some(v) => v,
            None => {
                tracing::error!(
                    available_keys = ?object_keys(&data),
                    "Token not found in API response"
                );
                return Err(Error::AuthError("token not found in response".to_string()));
            }
        };

        let token = Token::new(value, token_lifetime(&data));
        if let Some(exp) = token.expires_at {
            tracing::info!(
                "Token generated successfully, expires: {}",
                exp.to_rfc3339()
            );
        }

        Ok(token)
    }

    async fn check_token(&self, credentials: &Credentials) -> Result<TokenStatus> {
        tracing::info!("Checking token status from server...");

        let (status, body, status_error) =
            self.post_credentials("check-token", credentials).await?;
        if !status.is_success() {
            return Err(reject("check-token", status, &body, status_error));
        }

        let data: Value = serde_json::from_str(&body).map_err(|e| {
            crate::error::ApiError::MalformedResponse(format!(
                "check-token response is not valid JSON: {}",
                e
            ))
        })?;

        let parsed: CheckTokenResponse = serde_json::from_value(data.clone()).map_err(|e| {
            crate::error::ApiError::MalformedResponse(format!(
                "unexpected check-token response: {}",
                e
            ))
        })?;

        if !parsed.has_token {
            tracing::debug!("Server reports no active token");
            return Ok(TokenStatus::none());
        }

        let expires_at = match parsed.expires_at.as_deref() {
            Some(s) => match parse_datetime(s) {
                Ok(dt) => Some(dt),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unparseable token expiry");
                    None
                }
            },
            None => None,
        };

        Ok(TokenStatus {
            has_token: true,
            token: extract_token(&data),
            expires_at,
        })
    }
}

/// Map a non-2xx token endpoint response to the error taxonomy
///
/// A 4xx with a JSON body is an explicit rejection; anything else is treated as
/// a transport-level failure.
fn reject(
    endpoint: &str,
    status: StatusCode,
    body: &str,
    status_error: Option<reqwest::Error>,
) -> Error {
    tracing::error!(
        status = status.as_u16(),
        response_body = %truncate(body, 200),
        "{} request failed",
        endpoint
    );

    if status.is_client_error() {
        if let Ok(json) = serde_json::from_str::<Value>(body) {
            let message = server_message(&json)
                .unwrap_or_else(|| format!("{} rejected with status {}", endpoint, status));
            return Error::AuthError(message);
        }
    }

    match status_error {
        Some(e) => Error::network(format!("{} failed with status {}", endpoint, status), e),
        None => Error::AuthError(format!(
            "{} returned unexpected status {}",
            endpoint, status
        )),
    }
}

/// Pull the token out of the first alias key holding a non-empty string
pub fn extract_token(data: &Value) -> Option<String> {
    TOKEN_ALIASES.iter().find_map(|key| {
        data.get(*key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Token lifetime from the response
///
/// `expires_in_minutes` is in minutes and `expires_in` in seconds; the minutes
/// field wins when both are present. Missing or non-positive → 60 minutes.
pub fn token_lifetime(data: &Value) -> Duration {
    if let Some(minutes) = positive_number(data.get("expires_in_minutes")) {
        return Duration::minutes(minutes);
    }
    if let Some(seconds) = positive_number(data.get("expires_in")) {
        return Duration::seconds(seconds);
    }
    Duration::minutes(DEFAULT_TOKEN_LIFETIME_MINUTES)
}

/// Accept JSON numbers and numeric strings
fn positive_number(value: Option<&Value>) -> Option<i64> {
    let n = match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }?;
    (n > 0).then_some(n)
}

/// Server-provided error text from `message` or `error`
pub fn server_message(data: &Value) -> Option<String> {
    ["message", "error", "detail"].iter().find_map(|key| {
        data.get(*key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn object_keys(data: &Value) -> Vec<String> {
    data.as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

/// Parse an expiry timestamp
///
/// RFC 3339 strings keep their offset; naive ISO 8601 strings are read as local time.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let trimmed = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            if let Some(local) = Local.from_local_datetime(&naive).earliest() {
                return Ok(local.with_timezone(&Utc));
            }
        }
    }

    Err(crate::error::ApiError::MalformedResponse(format!(
        "Failed to parse datetime: {}",
        s
    ))
    .into())
}

/// Cut `s` down to at most `max` characters
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut)
}
