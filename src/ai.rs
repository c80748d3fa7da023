use crate::config::{AiConfig, AiProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::log::{debug, error, warn};

const MAX_ATTEMPTS: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(20);

const SYSTEM_PROMPT: &str = "You are Kivi, a friendly personal assistant. \
    Reply to chat messages in short, clear, conversational sentences. Keep \
    answers brief and helpful, and never mention that you are an AI model.";

/// Reply used whenever every completion attempt has failed.
pub const FALLBACK_REPLY: &str =
    "Sorry, the AI service is temporarily unavailable. Please try again in a moment!";

#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Unrecognized response shape")]
    UnrecognizedShape,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Success body shapes observed across providers, plus the two failure
/// shapes. Resolved in one place so every backend tolerates all of them.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionShape {
    /// Chat-completion object: `choices[0].message.content`.
    ChatMessage(String),
    /// Text-generation list: `[0].generated_text`.
    GeneratedTextList(String),
    /// Explicit `error` field in an otherwise well-formed body.
    Error(String),
    Unrecognized,
}
impl CompletionShape {
    pub fn from_response(body: &Value) -> Self {
        if let Some(error) = body.get("error") {
            let message = error
                .as_str()
                .map(str::to_string)
                .or_else(|| {
                    error
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| error.to_string());
            return Self::Error(message);
        }

        if let Some(content) = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
        {
            return Self::ChatMessage(content.to_string());
        }

        if let Some(text) = body.pointer("/0/generated_text").and_then(Value::as_str) {
            return Self::GeneratedTextList(text.to_string());
        }

        Self::Unrecognized
    }

    fn into_reply(self) -> Result<String, CompletionError> {
        match self {
            Self::ChatMessage(text) | Self::GeneratedTextList(text) => Ok(text),
            Self::Error(message) => Err(CompletionError::Provider(message)),
            Self::Unrecognized => Err(CompletionError::UnrecognizedShape),
        }
    }
}

/// A single completion attempt against a provider. Retry lives in
/// [`AiClient`], not here.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, text: &str) -> Result<String, CompletionError>;
}

/// Injectable backoff delay so retry tests run without wall-clock waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

pub struct OpenAiBackend {
    client: Client,
    completions_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}
impl OpenAiBackend {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()
            .context("Failed to build OpenAI reqwest client")?;

        let base = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            client,
            completions_url: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_new_tokens,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, text: &str) -> Result<String, CompletionError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        debug!("Sending chat completion request to {}", self.completions_url);
        let response = self
            .client
            .post(&self.completions_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CompletionError::Provider(format!("{status}: {error_text}")));
        }

        let body: Value = response.json().await?;
        CompletionShape::from_response(&body).into_reply()
    }
}

pub struct HuggingFaceBackend {
    client: Client,
    model_url: String,
    api_key: String,
    temperature: f32,
    max_new_tokens: u32,
}
impl HuggingFaceBackend {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()
            .context("Failed to build HuggingFace reqwest client")?;

        let base = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api-inference.huggingface.co".to_string());

        Ok(Self {
            client,
            model_url: format!("{}/models/{}", base.trim_end_matches('/'), config.model),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_new_tokens: config.max_new_tokens,
        })
    }
}

#[async_trait]
impl CompletionBackend for HuggingFaceBackend {
    async fn complete(&self, text: &str) -> Result<String, CompletionError> {
        // Text-generation endpoints take one prompt string, so the persona
        // instruction is folded into it.
        let prompt = format!("{SYSTEM_PROMPT}\n\n{text}");
        let request_body = json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": self.max_new_tokens,
                "temperature": self.temperature,
                "return_full_text": false,
            },
        });

        debug!("Sending text generation request to {}", self.model_url);
        let response = self
            .client
            .post(&self.model_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CompletionError::Provider(format!("{status}: {error_text}")));
        }

        let body: Value = response.json().await?;
        CompletionShape::from_response(&body).into_reply()
    }
}

/// Completion client with bounded retry. `generate_reply` always produces a
/// displayable string, degrading to [`FALLBACK_REPLY`] once retries are
/// exhausted.
#[derive(Clone)]
pub struct AiClient {
    backend: Arc<dyn CompletionBackend>,
    sleeper: Arc<dyn Sleeper>,
}
impl AiClient {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let backend: Arc<dyn CompletionBackend> = match config.provider {
            AiProvider::OpenAi => Arc::new(OpenAiBackend::new(config)?),
            AiProvider::HuggingFace => Arc::new(HuggingFaceBackend::new(config)?),
        };

        Ok(Self {
            backend,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_backend(
        backend: Arc<dyn CompletionBackend>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self { backend, sleeper }
    }

    pub async fn generate_reply(&self, text: &str) -> String {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.backend.complete(text).await {
                Ok(reply) => {
                    debug!("Completion succeeded on attempt {attempt}/{MAX_ATTEMPTS}");
                    return reply;
                }
                Err(e) => warn!("Completion attempt {attempt}/{MAX_ATTEMPTS} failed: {e}"),
            }

            if attempt < MAX_ATTEMPTS {
                self.sleeper.sleep(RETRY_BACKOFF).await;
            }
        }

        error!("All completion attempts failed, replying with fallback");
        FALLBACK_REPLY.to_string()
    }
}

#[cfg(test)]
mod shape_tests {
    use super::*;

    #[test]
    fn test_chat_message_shape() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
        });
        assert_eq!(
            CompletionShape::from_response(&body),
            CompletionShape::ChatMessage("hi there".to_string())
        );
    }

    #[test]
    fn test_generated_text_list_shape() {
        let body = json!([{"generated_text": "hi there"}]);
        assert_eq!(
            CompletionShape::from_response(&body),
            CompletionShape::GeneratedTextList("hi there".to_string())
        );
    }

    #[test]
    fn test_error_field_as_string() {
        let body = json!({"error": "Model overloaded"});
        assert_eq!(
            CompletionShape::from_response(&body),
            CompletionShape::Error("Model overloaded".to_string())
        );
    }

    #[test]
    fn test_error_field_as_object() {
        let body = json!({"error": {"message": "Invalid API key", "type": "auth"}});
        assert_eq!(
            CompletionShape::from_response(&body),
            CompletionShape::Error("Invalid API key".to_string())
        );
    }

    #[test]
    fn test_error_takes_priority_over_choices() {
        let body = json!({
            "error": "rate limited",
            "choices": [{"message": {"content": "should not be used"}}]
        });
        assert!(matches!(
            CompletionShape::from_response(&body),
            CompletionShape::Error(_)
        ));
    }

    #[test]
    fn test_unrecognized_shapes() {
        for body in [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{"message": {}}]}),
            json!([]),
            json!([{"text": "wrong key"}]),
            json!("bare string"),
        ] {
            assert_eq!(
                CompletionShape::from_response(&body),
                CompletionShape::Unrecognized,
                "body: {body}"
            );
        }
    }
}

#[cfg(test)]
mod retry_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedBackend {
        attempts: AtomicUsize,
        script: Vec<Result<String, String>>,
    }
    impl ScriptedBackend {
        fn new(script: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicUsize::new(0),
                script,
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _text: &str) -> Result<String, CompletionError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.script.get(attempt) {
                Some(Ok(reply)) => Ok(reply.clone()),
                Some(Err(message)) => Err(CompletionError::Provider(message.clone())),
                None => panic!("Backend called more times than scripted"),
            }
        }
    }

    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }
    impl RecordingSleeper {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                slept: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success_makes_no_retry() {
        let backend = ScriptedBackend::new(vec![Ok("hi there".to_string())]);
        let sleeper = RecordingSleeper::new();
        let client = AiClient::with_backend(backend.clone(), sleeper.clone());

        assert_eq!(client.generate_reply("hello").await, "hi there");
        assert_eq!(backend.attempts(), 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_attempt_success_after_backoff() {
        let backend = ScriptedBackend::new(vec![
            Err("overloaded".to_string()),
            Ok("recovered".to_string()),
        ]);
        let sleeper = RecordingSleeper::new();
        let client = AiClient::with_backend(backend.clone(), sleeper.clone());

        assert_eq!(client.generate_reply("hello").await, "recovered");
        assert_eq!(backend.attempts(), 2);
        assert_eq!(*sleeper.slept.lock().unwrap(), vec![RETRY_BACKOFF]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_fallback() {
        let backend = ScriptedBackend::new(vec![
            Err("down".to_string()),
            Err("still down".to_string()),
        ]);
        let sleeper = RecordingSleeper::new();
        let client = AiClient::with_backend(backend.clone(), sleeper.clone());

        assert_eq!(client.generate_reply("hello").await, FALLBACK_REPLY);

        // Retry ceiling is exactly two attempts, with one backoff between.
        assert_eq!(backend.attempts(), 2);
        assert_eq!(sleeper.slept.lock().unwrap().len(), 1);
    }
}
