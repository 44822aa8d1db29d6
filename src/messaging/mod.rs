mod twilio;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;

pub use twilio::TwilioWhatsApp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Voice,
}

/// Provider-neutral inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomingMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    pub fn sent(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing sender")]
    MissingSender,
    #[error("sender {0:?} is not an E.164 number")]
    InvalidSender(String),
    #[error("message has neither text nor media")]
    EmptyMessage,
}

/// The messaging capabilities the webhook pipeline needs.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Maps provider form parameters onto an [`IncomingMessage`].
    fn parse_incoming(
        &self,
        params: &[(String, String)],
        received_at: OffsetDateTime,
    ) -> Result<IncomingMessage, WebhookError>;

    /// Never fails; delivery problems are reported in the result.
    async fn send_text(&self, to: &str, text: &str) -> SendResult;

    /// Checks the request signature. Always true when validation is disabled.
    fn validate_webhook(&self, signature: Option<&str>, params: &[(String, String)]) -> bool;
}
