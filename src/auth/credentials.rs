// Credential store

use super::types::LoginRequest;
use crate::error::{Error, Result};

/// Username, password and API key for one client instance
///
/// Immutable once constructed. The `Debug` impl redacts secrets.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
    api_key: String,
}

impl Credentials {
    /// Build a credential set, rejecting blank fields
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let creds = Self {
            username: username.into(),
            password: password.into(),
            api_key: api_key.into(),
        };

        for (name, value) in [
            ("username", &creds.username),
            ("password", &creds.password),
            ("api_key", &creds.api_key),
        ] {
            if value.trim().is_empty() {
                return Err(Error::ConfigError(format!("{} must not be empty", name)));
            }
        }

        Ok(creds)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// JSON body for the token endpoints
    pub fn login_request(&self) -> LoginRequest<'_> {
        LoginRequest {
            username: &self.username,
            password: &self.password,
            api_key: &self.api_key,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_key", &"<redacted>")
            .finish()
    }
}
