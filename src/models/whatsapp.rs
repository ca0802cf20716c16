use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, Result};

// ==================================================================================================
// Request Models
// ==================================================================================================

/// Body of `POST /send`
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub to: &'a str,
    pub message: &'a str,
    pub api_key: &'a str,
}

// ==================================================================================================
// Response Models
// ==================================================================================================

/// Incoming WhatsApp message
///
/// Only the fields the client relies on are typed; everything else is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Message id as a string, whether the server sent a string or a number
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// `GET /receive` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiveResponse {
    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /unread-count` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnreadCount {
    #[serde(default)]
    pub count: u64,
}

/// `POST /mark-read` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkReadResponse {
    #[serde(default)]
    pub marked_count: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Connectivity report from `MessageReceiver::debug_connection`
/// Carries secret lengths only, never values
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugInfo {
    pub username: String,
    pub token_length: usize,
    pub api_key_length: usize,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connectivity_error: Option<String>,
}

/// Decode a parsed body into a typed response; an empty body decodes as `{}`
pub(crate) fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    let value = if value.is_null() {
        Value::Object(Map::new())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|e| {
        ApiError::MalformedResponse(format!("unexpected {} response: {}", what, e)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_keeps_unknown_fields() {
        let msg: Message = serde_json::from_value(json!({
            "id": "wamid.1",
            "from": "919999999999",
            "body": "hello",
            "type": "text"
        }))
        .unwrap();

        assert_eq!(msg.id_string().as_deref(), Some("wamid.1"));
        assert_eq!(msg.body.as_deref(), Some("hello"));
        assert_eq!(msg.extra["type"], "text");
    }

    #[test]
    fn test_numeric_message_id() {
        let msg: Message = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(msg.id_string().as_deref(), Some("42"));

        let msg: Message = serde_json::from_value(json!({"id": null})).unwrap();
        assert_eq!(msg.id_string(), None);
    }

    #[test]
    fn test_receive_response_defaults() {
        let resp: ReceiveResponse = decode(json!({"status": "ok"}), "receive").unwrap();
        assert!(resp.messages.is_empty());
        assert_eq!(resp.extra["status"], "ok");
    }

    #[test]
    fn test_decode_empty_body_uses_defaults() {
        let resp: MarkReadResponse = decode(Value::Null, "mark-read").unwrap();
        assert_eq!(resp.marked_count, 0);
    }

    #[test]
    fn test_decode_reports_malformed() {
        let err = decode::<UnreadCount>(json!({"count": "many"}), "unread-count").unwrap_err();
        assert!(err.is_malformed_response());
        assert!(err.to_string().contains("unread-count"));
    }

    #[test]
    fn test_debug_info_skips_empty_fields() {
        let info = DebugInfo {
            username: "ssc".to_string(),
            base_url: "https://example.test/api".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&info).unwrap();
        assert!(value.get("status_code").is_none());
        assert_eq!(value["token_length"], 0);
    }
}
