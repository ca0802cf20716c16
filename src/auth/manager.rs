use std::sync::Arc;
use tokio::sync::Mutex;

use super::authenticator::Authenticator;
use super::credentials::Credentials;
use super::types::{Token, TokenInfo, TokenStatus};
use crate::cache::TokenCache;
use crate::error::{Error, Result};

/// Authentication manager
/// Owns the credentials and token cache, and serializes every authentication attempt
pub struct AuthManager {
    credentials: Credentials,

    authenticator: Arc<dyn Authenticator>,

    cache: TokenCache,

    /// Held for the duration of any authentication (single-flight)
    auth_lock: Mutex<()>,
}

impl AuthManager {
    pub fn new(credentials: Credentials, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            credentials,
            authenticator,
            cache: TokenCache::new(),
            auth_lock: Mutex::new(()),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Authenticate unconditionally and cache the new token
    pub async fn authenticate(&self) -> Result<Token> {
        let _guard = self.auth_lock.lock().await;
        self.authenticate_locked().await
    }

    /// Get a valid token, authenticating if the cache has none
    /// Concurrent callers that find the cache stale wait for one shared authentication
    pub async fn ensure_valid_token(&self) -> Result<Token> {
        if let Some(token) = self.cache.valid_token().await {
            return Ok(token);
        }

        let _guard = self.auth_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = self.cache.valid_token().await {
            tracing::debug!("Token refreshed by a concurrent caller");
            return Ok(token);
        }

        tracing::info!("Refreshing token...");
        self.authenticate_locked().await
    }

    /// Replace a token the server just rejected
    /// Skips the login exchange if a concurrent caller already swapped in a different token
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<Token> {
        let _guard = self.auth_lock.lock().await;

        if let Some(token) = self.cache.valid_token().await {
            if token.value != rejected {
                tracing::debug!("Rejected token already replaced by a concurrent caller");
                return Ok(token);
            }
        }

        self.authenticate_locked().await
    }

    /// Ask the server for its view of the token and sync the cache with it
    /// Holds the auth lock across the check so a login cannot land between read and sync
    pub async fn check_token_status(&self) -> Result<TokenStatus> {
        let _guard = self.auth_lock.lock().await;
        let status = self.authenticator.check_token(&self.credentials).await?;

        if !status.has_token {
            tracing::info!("No token on server, clearing cache");
            self.cache.clear().await;
        } else if let (Some(value), Some(expires_at)) = (&status.token, status.expires_at) {
            self.cache
                .set(Token::with_expiry(value.clone(), Some(expires_at)))
                .await;
        }

        Ok(status)
    }

    /// Reuse the server's live token if it has one, otherwise generate a new token
    pub async fn token_info(&self) -> Result<TokenInfo> {
        let status = self.check_token_status().await?;
        let minutes = status.expires_in_minutes();

        if let (true, Some(token)) = (status.has_token && minutes > 0, status.token.clone()) {
            return Ok(TokenInfo {
                token,
                expires_in_minutes: minutes,
                expires_at: status.expires_at,
                is_new_token: false,
            });
        }

        if status.has_token {
            tracing::info!("Token has expired, generating a new one");
        } else {
            tracing::info!("No token found, generating a new one");
        }

        let token = self.authenticate().await?;
        Ok(TokenInfo {
            expires_in_minutes: token.minutes_until_expiry().unwrap_or(0),
            expires_at: token.expires_at,
            token: token.value,
            is_new_token: true,
        })
    }

    async fn authenticate_locked(&self) -> Result<Token> {
        let token = self
            .authenticator
            .authenticate(&self.credentials)
            .await
            .inspect_err(|e| tracing::error!("Authentication failed: {}", e))?;

        if !token.is_valid() {
            return Err(Error::AuthError(
                "authenticator returned an unusable token".to_string(),
            ));
        }

        self.cache.set(token.clone()).await;
        Ok(token)
    }
}
