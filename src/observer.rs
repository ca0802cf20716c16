// Request observation
// Structured facts about each outbound request, handed to an injected observer

use reqwest::Method;

/// Longest error body excerpt passed to observers
pub const MAX_BODY_EXCERPT: usize = 512;

/// What happened to one attempt of a request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Attempt is about to be sent
    Sending,

    /// 2xx response
    Succeeded { status: u16 },

    /// 401 on the first attempt; the token will be refreshed and the call retried
    Unauthorized,

    /// Non-2xx response that will be surfaced to the caller
    Failed { status: u16, body_excerpt: String },

    /// No response received
    TransportError { kind: String, message: String },
}

/// One observation about a request attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEvent {
    /// Short id shared by every attempt of one logical call
    pub request_id: String,
    pub method: Method,
    pub path: String,

    /// 1 for the first attempt, 2 for the retry after re-authentication
    pub attempt: u32,
    pub outcome: Outcome,
}

/// Receives request events from the HTTP client
pub trait RequestObserver: Send + Sync {
    fn on_event(&self, event: &RequestEvent);
}

/// Default observer: emits `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RequestObserver for TracingObserver {
    fn on_event(&self, event: &RequestEvent) {
        let RequestEvent {
            request_id,
            method,
            path,
            attempt,
            outcome,
        } = event;

        match outcome {
            Outcome::Sending => tracing::debug!(
                request_id = %request_id,
                method = %method,
                path = %path,
                attempt = attempt,
                "Sending HTTP request"
            ),
            Outcome::Succeeded { status } => tracing::debug!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = status,
                attempt = attempt,
                "Request successful"
            ),
            Outcome::Unauthorized => tracing::warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                "Unauthorized. Refreshing token and retrying once..."
            ),
            Outcome::Failed {
                status,
                body_excerpt,
            } => tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = status,
                response_body = %body_excerpt,
                attempt = attempt,
                "HTTP request failed with error response"
            ),
            Outcome::TransportError { kind, message } => tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                error_kind = %kind,
                error = %message,
                attempt = attempt,
                "HTTP request error"
            ),
        }
    }
}

/// Observer that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RequestObserver for NoopObserver {
    fn on_event(&self, _event: &RequestEvent) {}
}
