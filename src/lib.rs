// WhatsApp Client - Library root

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod messages;
pub mod models;
pub mod observer;
pub mod poller;

pub use client::WhatsAppClient;
pub use error::{ApiError, Error, Result};
