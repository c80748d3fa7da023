use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub ai: AiConfig,
}
impl AppConfig {
    /// Loads the optional TOML config file and resolves required credentials
    /// from the environment. Credentials never come from the file, so a
    /// missing file just means defaults everywhere.
    pub fn load(config_filepath: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_filepath {
            Some(path) => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {path:?}"))?;
                toml::from_str(&content)
                    .with_context(|| format!("Failed to parse TOML config file: {path:?}"))?
            }
            None => match fs::read_to_string("config.toml") {
                Ok(content) => toml::from_str(&content)
                    .context("Failed to parse TOML config file: \"config.toml\"")?,
                Err(_) => AppConfig::default(),
            },
        };

        config.telegram.bot_token = require_env("TELEGRAM_BOT_TOKEN")?;
        config.ai.api_key = require_env("AI_API_KEY")?;

        Ok(config)
    }
}

fn require_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("Missing required {name} environment variable!"),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_address")]
    pub address: SocketAddr,
}
impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_base_url")]
    pub base_url: String,

    /// Resolved from TELEGRAM_BOT_TOKEN, never from the config file.
    #[serde(skip)]
    pub bot_token: String,
}
impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            base_url: default_telegram_base_url(),
            bot_token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    OpenAi,
    HuggingFace,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProvider,

    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Provider API base, defaults per provider when unset.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Resolved from AI_API_KEY, never from the config file.
    #[serde(skip)]
    pub api_key: String,
}
impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            model: default_ai_model(),
            base_url: None,
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            api_key: String::new(),
        }
    }
}

fn default_http_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080)
}
fn default_telegram_base_url() -> String {
    "https://api.telegram.org".to_string()
}
fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_new_tokens() -> u32 {
    200
}
fn default_temperature() -> f32 {
    0.7
}
