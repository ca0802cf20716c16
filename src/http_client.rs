use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{server_message, truncate, AuthManager, AuthScheme, Token};
use crate::error::{ApiError, Error, Result};
use crate::observer::{Outcome, RequestEvent, RequestObserver, MAX_BODY_EXCERPT};

/// Query string parameters for an authenticated request
pub type Query<'a> = &'a [(&'a str, String)];

/// HTTP client for the WhatsApp API
/// Attaches the cached token to every call and retries once after a 401
pub struct WhatsAppHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    base_url: String,

    auth_manager: Arc<AuthManager>,

    auth_scheme: AuthScheme,

    /// Re-authenticate and retry once on 401
    auto_refresh: bool,

    observer: Arc<dyn RequestObserver>,
}

impl WhatsAppHttpClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        auth_manager: Arc<AuthManager>,
        auth_scheme: AuthScheme,
        auto_refresh: bool,
        observer: Arc<dyn RequestObserver>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_manager,
            auth_scheme,
            auto_refresh,
            observer,
        }
    }

    /// Build the shared reqwest client with explicit timeouts
    pub fn build_client(connect_timeout: u64, request_timeout: u64) -> Result<Client> {
        Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .user_agent(concat!("whatsapp-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {}", e)))
    }

    /// Execute an authenticated request and return the parsed JSON body
    ///
    /// - stale or missing token: authenticates first
    /// - 401 on the first attempt: re-authenticates and retries exactly once
    /// - anything else non-2xx: `ApiError::Status`
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<Query<'_>>,
    ) -> Result<Value> {
        let path = path.trim_start_matches('/');
        let url = format!("{}/{}", self.base_url, path);
        let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

        let mut token = self.auth_manager.ensure_valid_token().await?;
        let mut attempt = 1;

        loop {
            let event = |outcome| RequestEvent {
                request_id: request_id.clone(),
                method: method.clone(),
                path: path.to_string(),
                attempt,
                outcome,
            };

            self.observer.on_event(&event(Outcome::Sending));

            let response = match self
                .send_once(method.clone(), &url, body, query, &token)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    let err = Error::network(format!("{} {} failed", method, path), e);
                    if let Error::NetworkError { kind, source, .. } = &err {
                        self.observer.on_event(&event(Outcome::TransportError {
                            kind: kind.to_string(),
                            message: source.to_string(),
                        }));
                    }
                    return Err(err);
                }
            };

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && attempt == 1 && self.auto_refresh {
                self.observer.on_event(&event(Outcome::Unauthorized));
                token = self.auth_manager.refresh_rejected(&token.value).await?;
                attempt += 1;
                continue;
            }

            let text = response.text().await.map_err(|e| {
                Error::network(format!("Failed to read {} response body", path), e)
            })?;

            if status.is_success() {
                self.observer.on_event(&event(Outcome::Succeeded {
                    status: status.as_u16(),
                }));
                return classify_success_body(&text);
            }

            self.observer.on_event(&event(Outcome::Failed {
                status: status.as_u16(),
                body_excerpt: truncate(&text, MAX_BODY_EXCERPT),
            }));
            return Err(classify_error_body(status, &text));
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        query: Option<Query<'_>>,
        token: &Token,
    ) -> std::result::Result<Response, reqwest::Error> {
        let mut builder = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        builder = match self.auth_scheme {
            AuthScheme::Basic => builder.basic_auth(
                self.auth_manager.credentials().username(),
                Some(&token.value),
            ),
            AuthScheme::Bearer => builder.bearer_auth(&token.value),
        };

        if let Some(query) = query {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await
    }

    pub async fn get(&self, path: &str, query: Option<Query<'_>>) -> Result<Value> {
        self.request(Method::GET, path, None, query).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        query: Option<Query<'_>>,
    ) -> Result<Value> {
        self.request(Method::POST, path, body, query).await
    }

    pub fn auth_manager(&self) -> &Arc<AuthManager> {
        &self.auth_manager
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Parse a 2xx body; an empty body is `Null`, anything unparseable is malformed
pub fn classify_success_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| {
        ApiError::MalformedResponse(format!(
            "{} (body: {})",
            e,
            truncate(text, MAX_BODY_EXCERPT)
        ))
        .into()
    })
}

/// Turn a non-2xx response into `ApiError::Status`, preferring the server's message
pub fn classify_error_body(status: StatusCode, text: &str) -> Error {
    let message = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|json| server_message(&json))
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("no response body")
                    .to_string()
            } else {
                truncate(text, MAX_BODY_EXCERPT)
            }
        });

    ApiError::Status {
        status: status.as_u16(),
        message,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{test_credentials, CountingAuthenticator};
    use crate::observer::NoopObserver;
    use chrono::{Duration as ChronoDuration, Utc};
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<RequestEvent>>,
    }

    impl RequestObserver for RecordingObserver {
        fn on_event(&self, event: &RequestEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn client_for(
        server: &mockito::Server,
        auth: Arc<CountingAuthenticator>,
        scheme: AuthScheme,
        observer: Arc<dyn RequestObserver>,
    ) -> WhatsAppHttpClient {
        let manager = Arc::new(AuthManager::new(test_credentials(), auth));
        WhatsAppHttpClient::new(
            WhatsAppHttpClient::build_client(5, 5).unwrap(),
            server.url(),
            manager,
            scheme,
            true,
            observer,
        )
    }

    #[test]
    fn test_classify_success_body() {
        assert_eq!(classify_success_body(r#"{"ok":true}"#).unwrap(), json!({"ok": true}));
        assert_eq!(classify_success_body("  ").unwrap(), Value::Null);

        let err = classify_success_body("<html>").unwrap_err();
        assert!(err.is_malformed_response());
    }

    #[test]
    fn test_classify_error_body() {
        let err = classify_error_body(StatusCode::BAD_REQUEST, r#"{"message":"invalid number"}"#);
        assert_eq!(err.to_string(), "WhatsApp API error: 400 - invalid number");

        let err = classify_error_body(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.to_string(), "WhatsApp API error: 503 - Service Unavailable");

        let err = classify_error_body(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_malformed_response());
    }

    #[tokio::test]
    async fn test_basic_auth_uses_username_and_token() {
        let mut server = mockito::Server::new_async().await;
        // base64("ssc:token-1")
        let mock = server
            .mock("GET", "/unread-count")
            .match_header("authorization", "Basic c3NjOnRva2VuLTE=")
            .match_header("content-type", "application/json")
            .match_query(Matcher::UrlEncoded("api_key".into(), "key-123".into()))
            .with_status(200)
            .with_body(r#"{"count":3}"#)
            .create_async()
            .await;

        let auth = Arc::new(CountingAuthenticator::new());
        let client = client_for(&server, auth.clone(), AuthScheme::Basic, Arc::new(NoopObserver));

        let query = [("api_key", "key-123".to_string())];
        let body = client.get("/unread-count", Some(&query[..])).await.unwrap();

        assert_eq!(body["count"], 3);
        assert_eq!(auth.calls(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bearer_scheme() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("authorization", "Bearer token-1")
            .match_body(Matcher::Json(json!({"to": "123"})))
            .with_status(200)
            .with_body(r#"{"status":"sent"}"#)
            .create_async()
            .await;

        let auth = Arc::new(CountingAuthenticator::new());
        let client = client_for(&server, auth, AuthScheme::Bearer, Arc::new(NoopObserver));

        let body = client.post("send", Some(&json!({"to": "123"})), None).await.unwrap();
        assert_eq!(body["status"], "sent");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_401_refreshes_and_retries_once() {
        let mut server = mockito::Server::new_async().await;
        let rejected = server
            .mock("GET", "/receive")
            .match_header("authorization", "Bearer token-1")
            .with_status(401)
            .with_body(r#"{"message":"token expired"}"#)
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("GET", "/receive")
            .match_header("authorization", "Bearer token-2")
            .with_status(200)
            .with_body(r#"{"messages":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let auth = Arc::new(CountingAuthenticator::new());
        let observer = Arc::new(RecordingObserver::default());
        let client = client_for(&server, auth.clone(), AuthScheme::Bearer, observer.clone());

        let body = client.get("receive", None).await.unwrap();
        assert_eq!(body, json!({"messages": []}));
        assert_eq!(auth.calls(), 2);
        rejected.assert_async().await;
        accepted.assert_async().await;

        let outcomes: Vec<Outcome> = observer
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.outcome.clone())
            .collect();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Sending,
                Outcome::Unauthorized,
                Outcome::Sending,
                Outcome::Succeeded { status: 200 },
            ]
        );
    }

    #[tokio::test]
    async fn test_second_401_surfaces_as_api_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/receive")
            .with_status(401)
            .with_body(r#"{"message":"unauthorized"}"#)
            .expect(2)
            .create_async()
            .await;

        let auth = Arc::new(CountingAuthenticator::new());
        let client = client_for(&server, auth.clone(), AuthScheme::Basic, Arc::new(NoopObserver));

        let err = client.get("receive", None).await.unwrap_err();
        assert!(err.is_api_error());
        assert_eq!(err.status(), Some(401));
        assert_eq!(auth.calls(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_401_without_auto_refresh_fails_immediately() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/receive")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let auth = Arc::new(CountingAuthenticator::new());
        let manager = Arc::new(AuthManager::new(test_credentials(), auth.clone()));
        let client = WhatsAppHttpClient::new(
            Client::new(),
            server.url(),
            manager,
            AuthScheme::Basic,
            false,
            Arc::new(NoopObserver),
        );

        let err = client.get("receive", None).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(auth.calls(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_valid_cached_token_skips_authentication() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/status")
            .match_header("authorization", "Bearer cached")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let auth = Arc::new(CountingAuthenticator::new());
        let client = client_for(&server, auth.clone(), AuthScheme::Bearer, Arc::new(NoopObserver));
        client
            .auth_manager()
            .cache()
            .set(Token::with_expiry(
                "cached",
                Some(Utc::now() + ChronoDuration::minutes(5)),
            ))
            .await;

        client.get("status", None).await.unwrap();
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_401_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .with_status(500)
            .with_body("internal failure")
            .expect(1)
            .create_async()
            .await;

        let auth = Arc::new(CountingAuthenticator::new());
        let observer = Arc::new(RecordingObserver::default());
        let client = client_for(&server, auth.clone(), AuthScheme::Basic, observer.clone());

        let err = client.post("send", None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "WhatsApp API error: 500 - internal failure");
        assert_eq!(auth.calls(), 1);
        mock.assert_async().await;

        let events = observer.events.lock().unwrap();
        assert_eq!(
            events.last().unwrap().outcome,
            Outcome::Failed {
                status: 500,
                body_excerpt: "internal failure".to_string()
            }
        );
        assert!(events.iter().all(|e| e.request_id == events[0].request_id));
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/receive")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let auth = Arc::new(CountingAuthenticator::new());
        let client = client_for(&server, auth, AuthScheme::Basic, Arc::new(NoopObserver));

        let err = client.get("receive", None).await.unwrap_err();
        assert!(err.is_malformed_response());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let auth = Arc::new(CountingAuthenticator::new());
        let manager = Arc::new(AuthManager::new(test_credentials(), auth));
        let observer = Arc::new(RecordingObserver::default());
        let client = WhatsAppHttpClient::new(
            Client::new(),
            format!("http://{}", addr),
            manager,
            AuthScheme::Basic,
            true,
            observer.clone(),
        );

        let err = client.get("receive", None).await.unwrap_err();
        assert!(err.is_network_error());
        assert!(matches!(
            observer.events.lock().unwrap().last().unwrap().outcome,
            Outcome::TransportError { .. }
        ));
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out_as_network_error() {
        // Accept connections and hold them open without ever responding
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let auth = Arc::new(CountingAuthenticator::new());
        let manager = Arc::new(AuthManager::new(test_credentials(), auth));
        let observer = Arc::new(RecordingObserver::default());
        let client = WhatsAppHttpClient::new(
            WhatsAppHttpClient::build_client(1, 1).unwrap(),
            format!("http://{}", addr),
            manager,
            AuthScheme::Basic,
            true,
            observer.clone(),
        );

        let err = client.get("receive", None).await.unwrap_err();
        assert!(err.is_network_error(), "unexpected error: {err:?}");
        match &err {
            Error::NetworkError { kind, .. } => {
                assert_eq!(*kind, crate::error::NetworkErrorKind::Timeout)
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let events = observer.events.lock().unwrap();
        assert!(matches!(
            &events.last().unwrap().outcome,
            Outcome::TransportError { kind, .. } if kind == "timeout"
        ));

        silent.abort();
    }
}
