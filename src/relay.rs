use crate::ai::AiClient;
use crate::telegram::MessageDelivery;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::log::{debug, warn};

/// Platform-defined chat identifier, numeric for Telegram but opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Int(i64),
    Str(String),
}
impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Str(id) => f.write_str(id),
        }
    }
}

/// The one value extracted from an update payload. Lives for a single webhook
/// invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundUpdate {
    pub chat_id: ChatId,
    pub text: String,
}
impl InboundUpdate {
    /// Pulls chat id and text out of a raw update payload. Updates without a
    /// message (edits, callback queries, member events) and messages without
    /// a usable chat id return None and are ignored by the relay. A missing
    /// text field becomes an empty string, which the relay also ignores.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let message = payload.get("message")?;

        let chat_id = match message.pointer("/chat/id") {
            Some(Value::Number(id)) => ChatId::Int(id.as_i64()?),
            Some(Value::String(id)) => ChatId::Str(id.clone()),
            _ => return None,
        };

        let text = message
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(Self { chat_id, text })
    }
}

/// Webhook relay core: extract the message, generate a reply, deliver it.
/// Holds only immutable client handles, so invocations are independent and
/// safe to run concurrently.
#[derive(Clone)]
pub struct Relay {
    ai: AiClient,
    delivery: Arc<dyn MessageDelivery>,
}
impl Relay {
    pub fn new(ai: AiClient, delivery: Arc<dyn MessageDelivery>) -> Self {
        Self { ai, delivery }
    }

    /// Handles one update payload. Non-message updates and empty texts are
    /// no-ops; a failed delivery is logged and swallowed so the webhook
    /// acknowledgment never depends on downstream health.
    pub async fn process(&self, payload: Value) -> Result<()> {
        debug!("Received update payload: {payload}");

        let Some(update) = InboundUpdate::from_payload(&payload) else {
            debug!("Ignoring update without a message");
            return Ok(());
        };

        let text = update.text.trim();
        if text.is_empty() {
            debug!("Ignoring empty message from chat {}", update.chat_id);
            return Ok(());
        }

        debug!("chat {}: {text:?}", update.chat_id);
        let reply = self.ai.generate_reply(text).await;

        if let Err(e) = self.delivery.deliver(&update.chat_id, &reply).await {
            warn!("Failed to deliver reply to chat {}: {e}", update.chat_id);
        }

        Ok(())
    }
}
