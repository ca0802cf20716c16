use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::auth::truncate;
use crate::error::{Error, Result};
use crate::http_client::WhatsAppHttpClient;
use crate::models::whatsapp::decode;
use crate::models::{DebugInfo, MarkReadResponse, Message, ReceiveResponse, UnreadCount};

/// Timeout for the unauthenticated `/status` probe
const STATUS_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives WhatsApp messages and manages read state
///
/// Tracks the id of the most recent message seen so each fetch only returns newer ones.
pub struct MessageReceiver {
    http_client: Arc<WhatsAppHttpClient>,

    /// Id of the newest message returned so far
    last_message_id: Mutex<Option<String>>,
}

impl MessageReceiver {
    pub fn new(http_client: Arc<WhatsAppHttpClient>) -> Self {
        Self {
            http_client,
            last_message_id: Mutex::new(None),
        }
    }

    fn api_key(&self) -> String {
        self.http_client
            .auth_manager()
            .credentials()
            .api_key()
            .to_string()
    }

    pub async fn last_message_id(&self) -> Option<String> {
        self.last_message_id.lock().await.clone()
    }

    /// Fetch incoming messages newer than the last one seen
    ///
    /// The first message of a non-empty batch is the most recent and becomes the new cursor.
    pub async fn receive_messages(&self, limit: u32, mark_as_read: bool) -> Result<ReceiveResponse> {
        tracing::info!("Fetching incoming messages...");

        let mut cursor = self.last_message_id.lock().await;

        let mut query = vec![("api_key", self.api_key()), ("limit", limit.to_string())];
        if let Some(after) = cursor.as_ref() {
            query.push(("after", after.clone()));
        }
        if mark_as_read {
            query.push(("mark_read", "true".to_string()));
        }

        let body = self.http_client.get("receive", Some(&query[..])).await?;
        let response: ReceiveResponse = decode(body, "receive")?;
        tracing::info!("Received {} messages", response.messages.len());

        if let Some(id) = response.messages.first().and_then(Message::id_string) {
            tracing::info!("Updated last message ID to: {}", id);
            *cursor = Some(id);
        }

        Ok(response)
    }

    /// Number of unread messages
    pub async fn unread_count(&self) -> Result<u64> {
        tracing::info!("Checking unread message count...");

        let query = [("api_key", self.api_key())];
        let body = self.http_client.get("unread-count", Some(&query[..])).await?;
        let count: UnreadCount = decode(body, "unread-count")?;

        tracing::info!("Unread message count: {}", count.count);
        Ok(count.count)
    }

    /// Mark messages as read; an empty slice marks every unread message
    pub async fn mark_messages_as_read(&self, message_ids: &[String]) -> Result<MarkReadResponse> {
        tracing::info!("Marking messages as read...");

        let mut query = vec![("api_key", self.api_key())];
        if !message_ids.is_empty() {
            query.push(("message_ids", message_ids.join(",")));
        }

        let body = self.http_client.post("mark-read", None, Some(&query[..])).await?;
        let response: MarkReadResponse = decode(body, "mark-read")?;

        tracing::info!("Marked messages as read: {}", response.marked_count);
        Ok(response)
    }

    /// Fetch a single message by id
    pub async fn message_by_id(&self, message_id: &str) -> Result<Message> {
        let message_id = message_id.trim();
        if message_id.is_empty()
            || message_id == "."
            || message_id == ".."
            || message_id.contains('/')
        {
            return Err(Error::ValidationError(format!(
                "invalid message id: {:?}",
                message_id
            )));
        }

        tracing::info!("Fetching message with ID: {}", message_id);

        let query = [("api_key", self.api_key())];
        let body = self
            .http_client
            .get(
                &format!("message/{}", urlencoding::encode(message_id)),
                Some(&query[..]),
            )
            .await?;
        let message: Message = decode(body, "message")?;

        tracing::info!(
            "Retrieved message: {}",
            truncate(message.body.as_deref().unwrap_or("No content"), 50)
        );
        Ok(message)
    }

    /// Probe the unauthenticated `/status` endpoint and report what the client is using
    pub async fn debug_connection(&self) -> DebugInfo {
        let auth = self.http_client.auth_manager();
        let token_length = auth
            .cache()
            .get()
            .await
            .map(|t| t.value.len())
            .unwrap_or(0);

        let mut info = DebugInfo {
            username: auth.credentials().username().to_string(),
            token_length,
            api_key_length: auth.credentials().api_key().len(),
            base_url: self.http_client.base_url().to_string(),
            ..Default::default()
        };

        tracing::info!("Testing API connectivity...");
        let url = format!("{}/status", self.http_client.base_url());
        let result = self
            .http_client
            .client()
            .get(&url)
            .timeout(STATUS_PROBE_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                tracing::info!("API connectivity test successful: {}", status);
                info.status_code = Some(status);
                info.status_response = Some(text.chars().take(100).collect());
            }
            Err(e) => {
                tracing::error!("API connectivity test failed: {}", e);
                info.connectivity_error = Some(e.to_string());
            }
        }

        info
    }
}
