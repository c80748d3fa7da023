use crate::ai::AiClient;
use crate::config::AppConfig;
use crate::http::create_app;
use crate::relay::Relay;
use crate::telegram::TelegramClient;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::log::info;

pub async fn run(config: AppConfig) -> Result<()> {
    let ai = AiClient::new(&config.ai)?;
    let delivery = Arc::new(TelegramClient::new(&config.telegram)?);
    let relay = Relay::new(ai, delivery);

    let address = config.http.address;
    let app = create_app(relay);

    info!("Starting HTTP server on {address}");
    axum_server::bind(address)
        .serve(app.into_make_service())
        .await
        .context("HTTP server error")
}
