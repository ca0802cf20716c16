// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How the token is attached to authenticated requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Authorization: Basic base64(username:token)` (default)
    #[default]
    Basic,

    /// `Authorization: Bearer {token}`
    Bearer,
}

/// Bearer credential issued by the remote API
#[derive(Clone, PartialEq)]
pub struct Token {
    pub value: String,
    pub obtained_at: DateTime<Utc>,

    /// `None` means the expiry was never computed; such a token is never valid
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Create a token obtained now that lives for `lifetime`
    pub fn new(value: impl Into<String>, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            value: value.into(),
            obtained_at: now,
            expires_at: Some(now + lifetime),
        }
    }

    /// Create a token with a server-provided expiry instant (or none at all)
    pub fn with_expiry(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            obtained_at: Utc::now(),
            expires_at,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => !self.value.is_empty() && now < exp,
            None => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Whole minutes until expiry: `None` if unknown, 0 once passed
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        let exp = self.expires_at?;
        let remaining = exp - Utc::now();
        if remaining <= Duration::zero() {
            return Some(0);
        }
        Some(remaining.num_minutes())
    }

    /// Short prefix of the token value, safe for logs
    pub fn preview(&self) -> String {
        let prefix: String = self.value.chars().take(6).collect();
        format!("{}...", prefix)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &self.preview())
            .field("obtained_at", &self.obtained_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Login payload shared by `/get-token` and `/check-token`
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub api_key: &'a str,
}

/// Server-side token status from `/check-token`
#[derive(Debug, Clone, PartialEq)]
pub struct TokenStatus {
    pub has_token: bool,
    pub token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenStatus {
    pub fn none() -> Self {
        Self {
            has_token: false,
            token: None,
            expires_at: None,
        }
    }

    /// Whole minutes the server-side token still has, 0 when unknown or expired
    pub fn expires_in_minutes(&self) -> i64 {
        match self.expires_at {
            Some(exp) => (exp - Utc::now()).num_minutes().max(0),
            None => 0,
        }
    }
}

/// Summary returned by `AuthManager::token_info`
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub token: String,
    pub expires_in_minutes: i64,
    pub expires_at: Option<DateTime<Utc>>,

    /// True when a new token had to be generated
    pub is_new_token: bool,
}

/// Raw `/check-token` response body
#[derive(Deserialize)]
pub struct CheckTokenResponse {
    #[serde(default)]
    pub has_token: bool,
    pub expires_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_validity() {
        let token = Token::new("abc123", Duration::minutes(60));
        assert!(token.is_valid());
        assert!(token.expires_at.unwrap() > token.obtained_at);

        let expired = Token::with_expiry("abc123", Some(Utc::now() - Duration::seconds(1)));
        assert!(!expired.is_valid());
    }

    #[test]
    fn test_unknown_expiry_is_invalid() {
        let token = Token::with_expiry("abc123", None);
        assert!(!token.is_valid());
        assert_eq!(token.minutes_until_expiry(), None);
    }

    #[test]
    fn test_empty_value_is_invalid() {
        let token = Token::new("", Duration::minutes(60));
        assert!(!token.is_valid());
    }

    #[test]
    fn test_minutes_until_expiry() {
        let token = Token::with_expiry("t", Some(Utc::now() + Duration::seconds(30 * 60 + 30)));
        assert_eq!(token.minutes_until_expiry(), Some(30));

        let expired = Token::with_expiry("t", Some(Utc::now() - Duration::minutes(5)));
        assert_eq!(expired.minutes_until_expiry(), Some(0));
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let token = Token::new("supersecrettokenvalue", Duration::minutes(1));
        let printed = format!("{:?}", token);
        assert!(!printed.contains("supersecrettokenvalue"));
        assert!(printed.contains("supers..."));
    }

    #[test]
    fn test_token_status_minutes() {
        assert_eq!(TokenStatus::none().expires_in_minutes(), 0);

        let status = TokenStatus {
            has_token: true,
            token: Some("t".to_string()),
            expires_at: Some(Utc::now() - Duration::minutes(3)),
        };
        assert_eq!(status.expires_in_minutes(), 0);
    }
}
