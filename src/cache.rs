// Token cache

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::Token;

/// Thread-safe holder for the current token
///
/// Validity is checked lazily on every access; there is no expiry timer.
#[derive(Clone, Default)]
pub struct TokenCache {
    token: Arc<RwLock<Option<Token>>>,
}

impl TokenCache {
    /// Create an empty token cache
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a token is stored, its expiry is known and has not passed
    pub async fn is_valid(&self) -> bool {
        self.token
            .read()
            .await
            .as_ref()
            .map(Token::is_valid)
            .unwrap_or(false)
    }

    /// Stored token, valid or not
    pub async fn get(&self) -> Option<Token> {
        self.token.read().await.clone()
    }

    /// Stored token only if it is still valid
    pub async fn valid_token(&self) -> Option<Token> {
        self.token
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_valid())
            .cloned()
    }

    /// Replace the stored token
    pub async fn set(&self, token: Token) {
        tracing::debug!(token = %token.preview(), "Caching token");
        *self.token.write().await = Some(token);
    }

    /// Drop the stored token
    pub async fn clear(&self) {
        *self.token.write().await = None;
    }

    /// Minutes remaining on the stored token, `None` if there is none or expiry is unknown
    pub async fn minutes_until_expiry(&self) -> Option<i64> {
        self.token
            .read()
            .await
            .as_ref()
            .and_then(Token::minutes_until_expiry)
    }
}
