// Data models for the WhatsApp API payloads

pub mod whatsapp;

pub use whatsapp::{
    DebugInfo, MarkReadResponse, Message, ReceiveResponse, SendMessageRequest, UnreadCount,
};
