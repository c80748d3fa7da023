use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum AckStatus {
    Ok,
    Error,
}

/// Webhook acknowledgment. Always renders as HTTP 200: Telegram disables or
/// retry-storms webhooks that answer with error statuses, so downstream
/// failures must never surface here.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    status: AckStatus,
}
impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            status: AckStatus::Ok,
        }
    }

    pub fn error() -> Self {
        Self {
            status: AckStatus::Error,
        }
    }
}
impl IntoResponse for WebhookAck {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
    pub version: &'static str,
}
impl HealthResponse {
    pub fn current() -> Self {
        Self {
            message: "Kivi AI Assistant is running",
            version: crate::VERSION,
        }
    }
}

#[cfg(test)]
mod ack_tests {
    use super::*;

    #[test]
    fn test_ack_serialization() {
        assert_eq!(
            serde_json::to_string(&WebhookAck::ok()).unwrap(),
            r#"{"status":"ok"}"#
        );
        assert_eq!(
            serde_json::to_string(&WebhookAck::error()).unwrap(),
            r#"{"status":"error"}"#
        );
    }
}
