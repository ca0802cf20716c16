// WhatsApp client facade
// Wires credentials, authenticator, token cache and HTTP client together

use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::{
    AuthManager, Authenticator, Credentials, HttpAuthenticator, Token, TokenInfo, TokenStatus,
};
use crate::config::Config;
use crate::error::Result;
use crate::http_client::{Query, WhatsAppHttpClient};
use crate::messages::{MessageReceiver, MessageSender};
use crate::observer::{RequestObserver, TracingObserver};
use crate::poller::{Poller, PollerConfig};

/// Client for the WhatsApp REST API
///
/// One credential set and one token per instance. Cheap to share behind an `Arc`.
pub struct WhatsAppClient {
    http_client: Arc<WhatsAppHttpClient>,
    sender: MessageSender,
    receiver: Arc<MessageReceiver>,
}

impl WhatsAppClient {
    /// Create a client from configuration, using the HTTP token endpoints and `tracing` output
    pub fn new(config: &Config) -> Result<Self> {
        let client =
            WhatsAppHttpClient::build_client(config.http_connect_timeout, config.http_request_timeout)?;
        let authenticator = Arc::new(HttpAuthenticator::new(client.clone(), &config.base_url));
        Self::with_parts(config, client, authenticator, Arc::new(TracingObserver))
    }

    /// Create a client with an injected authenticator and request observer
    pub fn with_parts(
        config: &Config,
        client: reqwest::Client,
        authenticator: Arc<dyn Authenticator>,
        observer: Arc<dyn RequestObserver>,
    ) -> Result<Self> {
        let credentials = Credentials::new(&config.username, &config.password, &config.api_key)?;
        let auth_manager = Arc::new(AuthManager::new(credentials, authenticator));

        let http_client = Arc::new(WhatsAppHttpClient::new(
            client,
            &config.base_url,
            auth_manager,
            config.auth_scheme,
            config.auto_refresh,
            observer,
        ));

        tracing::debug!(
            base_url = %config.base_url,
            auth_scheme = ?config.auth_scheme,
            "WhatsApp client initialized"
        );

        Ok(Self {
            sender: MessageSender::new(http_client.clone()),
            receiver: Arc::new(MessageReceiver::new(http_client.clone())),
            http_client,
        })
    }

    fn auth(&self) -> &AuthManager {
        self.http_client.auth_manager()
    }

    /// Generate a new token unconditionally
    pub async fn authenticate(&self) -> Result<Token> {
        self.auth().authenticate().await
    }

    /// Cached token if still valid, otherwise a freshly generated one
    pub async fn ensure_valid_token(&self) -> Result<Token> {
        self.auth().ensure_valid_token().await
    }

    /// Server-side token status; syncs the local cache
    pub async fn check_token_status(&self) -> Result<TokenStatus> {
        self.auth().check_token_status().await
    }

    /// Reuse the server's live token or generate a new one
    pub async fn token_info(&self) -> Result<TokenInfo> {
        self.auth().token_info().await
    }

    /// Authenticated request against `path` relative to the base URL
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<Query<'_>>,
    ) -> Result<Value> {
        self.http_client.request(method, path, body, query).await
    }

    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    pub fn receiver(&self) -> &Arc<MessageReceiver> {
        &self.receiver
    }

    /// Send a text message
    pub async fn send_message(&self, to: &str, message: &str) -> Result<Value> {
        self.sender.send_message(to, message).await
    }

    /// Poller sharing this client's receiver (and its message cursor)
    pub fn poller(&self, config: PollerConfig) -> Poller {
        Poller::new(self.receiver.clone(), config)
    }

    pub fn http_client(&self) -> &Arc<WhatsAppHttpClient> {
        &self.http_client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CountingAuthenticator;
    use crate::observer::NoopObserver;

    #[tokio::test]
    async fn test_with_parts_shares_one_token_cache() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/send")
            .with_status(200)
            .with_body(r#"{"status":"sent"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/unread-count")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"count":0}"#)
            .create_async()
            .await;

        let mut config = Config::new("ssc", "hunter2", "key-123");
        config.base_url = server.url();

        let auth = Arc::new(CountingAuthenticator::new());
        let client = WhatsAppClient::with_parts(
            &config,
            reqwest::Client::new(),
            auth.clone(),
            Arc::new(NoopObserver),
        )
        .unwrap();

        client.send_message("919999999999", "hi").await.unwrap();
        client.receiver().unread_count().await.unwrap();
        let token = client.ensure_valid_token().await.unwrap();

        assert_eq!(token.value, "token-1");
        assert_eq!(auth.calls(), 1);
    }

    #[test]
    fn test_rejects_blank_credentials() {
        let config = Config::new("ssc", "", "key-123");
        assert!(WhatsAppClient::new(&config).is_err());
    }
}
