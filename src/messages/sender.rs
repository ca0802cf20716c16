use serde_json::Value;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::http_client::WhatsAppHttpClient;
use crate::models::SendMessageRequest;

/// Sends WhatsApp messages
pub struct MessageSender {
    http_client: Arc<WhatsAppHttpClient>,
}

impl MessageSender {
    pub fn new(http_client: Arc<WhatsAppHttpClient>) -> Self {
        Self { http_client }
    }

    /// Send a text message to `to`; returns the server's JSON response
    pub async fn send_message(&self, to: &str, message: &str) -> Result<Value> {
        let to = to.trim();
        if to.is_empty() {
            return Err(Error::ValidationError("recipient must not be empty".to_string()));
        }
        if message.is_empty() {
            return Err(Error::ValidationError("message must not be empty".to_string()));
        }

        let api_key = self.http_client.auth_manager().credentials().api_key();
        let body = serde_json::to_value(SendMessageRequest {
            to,
            message,
            api_key,
        })
        .map_err(|e| Error::ValidationError(format!("Failed to encode message: {}", e)))?;

        tracing::info!("Sending message to {}", to);
        let response = self
            .http_client
            .post("send", Some(&body), None)
            .await
            .inspect_err(|e| tracing::error!("Failed to send message: {}", e))?;
        tracing::info!("Message sent successfully");

        Ok(response)
    }
}
