use crate::config::TelegramConfig;
use crate::relay::ChatId;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::log::debug;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("Telegram API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Outbound reply delivery. Strictly single attempt: retrying a send that may
/// already have gone through risks duplicate user-visible messages.
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    async fn deliver(&self, chat_id: &ChatId, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a ChatId,
    text: &'a str,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    ok: bool,

    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramClient {
    client: Client,
    send_message_url: String,
}
impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .context("Failed to build Telegram reqwest client")?;

        Ok(Self {
            client,
            send_message_url: format!(
                "{}/bot{}/sendMessage",
                config.base_url.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }
}

#[async_trait]
impl MessageDelivery for TelegramClient {
    async fn deliver(&self, chat_id: &ChatId, text: &str) -> Result<(), DeliveryError> {
        let request_body = SendMessageRequest { chat_id, text };
        let response = self
            .client
            .post(&self.send_message_url)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DeliveryError::Api(format!("{status}: {error_text}")));
        }

        let body: SendMessageResponse = response.json().await?;
        if !body.ok {
            return Err(DeliveryError::Api(
                body.description
                    .unwrap_or_else(|| "sendMessage answered ok=false".to_string()),
            ));
        }

        debug!("Delivered reply to chat {chat_id}");
        Ok(())
    }
}
