// Error handling module
// Defines the client error taxonomy and transport error classification

use thiserror::Error;

/// Errors that can occur while talking to the WhatsApp API
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials rejected or no usable token in the server response
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Transport failure (DNS, connect, timeout, unreadable response)
    #[error("Network error: {context} ({kind}): {source}")]
    NetworkError {
        context: String,
        kind: NetworkErrorKind,
        #[source]
        source: reqwest::Error,
    },

    /// Error response or malformed body from an authenticated endpoint
    #[error(transparent)]
    ApiError(#[from] ApiError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// API-level failures, split so callers can tell HTTP errors from bad payloads
#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response that the single 401 retry did not recover
    #[error("WhatsApp API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// 2xx response whose body is not the expected structure
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Coarse category of a transport failure, used for logging and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    ConnectionFailed,
    Request,
    Body,
    Decode,
    Status,
    Unknown,
}

impl NetworkErrorKind {
    /// Categorize a reqwest error
    pub fn of(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::ConnectionFailed
        } else if e.is_status() {
            Self::Status
        } else if e.is_request() {
            Self::Request
        } else if e.is_body() {
            Self::Body
        } else if e.is_decode() {
            Self::Decode
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed => "connection_failed",
            Self::Request => "request_error",
            Self::Body => "body_error",
            Self::Decode => "decode_error",
            Self::Status => "status_error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Wrap a transport error with a short description of what was being attempted
    pub fn network(context: impl Into<String>, source: reqwest::Error) -> Self {
        Error::NetworkError {
            context: context.into(),
            kind: NetworkErrorKind::of(&source),
            source,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ApiError(ApiError::Status { status, .. }) => Some(*status),
            Error::NetworkError { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::AuthError(_))
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, Error::NetworkError { .. })
    }

    pub fn is_api_error(&self) -> bool {
        matches!(self, Error::ApiError(_))
    }

    pub fn is_malformed_response(&self) -> bool {
        matches!(self, Error::ApiError(ApiError::MalformedResponse(_)))
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;
