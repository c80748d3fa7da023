use crate::http::types::{HealthResponse, WebhookAck};
use crate::http::HttpState;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::Value;
use tracing::log::{debug, error};

/// Inbound update endpoint. Reads raw bytes instead of using the `Json`
/// extractor so a malformed body still gets acknowledged, keeping the
/// never-fail webhook contract.
pub async fn webhook(State(state): State<HttpState>, body: Bytes) -> WebhookAck {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("Discarding webhook body that is not valid JSON: {e}");
            return WebhookAck::ok();
        }
    };

    match state.relay.process(payload).await {
        Ok(()) => WebhookAck::ok(),
        Err(e) => {
            error!("Webhook processing failed: {e:?}");
            WebhookAck::error()
        }
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::current())
}
