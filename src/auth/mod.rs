// Authentication module
// Credentials, token lifecycle and the login exchange

mod authenticator;
mod credentials;
mod manager;
mod types;

pub use authenticator::{
    extract_token, parse_datetime, server_message, token_lifetime, Authenticator,
    HttpAuthenticator, DEFAULT_TOKEN_LIFETIME_MINUTES, TOKEN_ALIASES,
};
pub use credentials::Credentials;
pub use manager::AuthManager;
pub use types::{AuthScheme, Token, TokenInfo, TokenStatus};

pub(crate) use authenticator::truncate;

#[cfg(test)]
pub(crate) use manager::tests::{credentials as test_credentials, CountingAuthenticator};
