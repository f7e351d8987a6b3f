use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::session::SessionSettings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidgetConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_seed_greeting")]
    pub seed_greeting: bool,
    #[serde(default)]
    pub initial_message: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
            max_message_length: default_max_message_length(),
            max_messages: default_max_messages(),
            batch_size: default_batch_size(),
            debounce_ms: default_debounce_ms(),
            seed_greeting: default_seed_greeting(),
            initial_message: None,
            user_name: None,
        }
    }
}

impl WidgetConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            inactivity_timeout: self.inactivity_timeout(),
            greeting_override: self.initial_message.clone(),
            user_name: self.user_name.clone(),
            seed_greeting: self.seed_greeting,
        }
    }
}

fn default_title() -> String {
    "Chat with us".into()
}

fn default_inactivity_timeout_ms() -> u64 {
    180_000
}

fn default_max_message_length() -> usize {
    1000
}

fn default_max_messages() -> usize {
    crate::store::DEFAULT_MAX_MESSAGES
}

fn default_batch_size() -> usize {
    crate::window::DEFAULT_BATCH_SIZE
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_seed_greeting() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_correlation_header")]
    pub correlation_header: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoint: default_endpoint(),
            api_key: None,
            correlation_header: default_correlation_header(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TransportConfig {
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }
}

fn default_base_url() -> String {
    "http://localhost:3001".into()
}

fn default_endpoint() -> String {
    "cruise-availability-details/genai/availability".into()
}

fn default_correlation_header() -> String {
    "X-Conversation-Id".into()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FallbackConfig {
    /// JSON document to use instead of the bundled one.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_avatar_path")]
    pub avatar_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            avatar_path: default_avatar_path(),
        }
    }
}

fn default_avatar_path() -> String {
    "avatar-store.json".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)
            .map_err(|err| ChatError::Config(format!("Failed to parse configuration: {err}")))?;
        Ok(cfg)
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    fn apply_env(&mut self) {
        if let Ok(timeout) = env::var("CHAT_WIDGET_INACTIVITY_TIMEOUT") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.widget.inactivity_timeout_ms = parsed;
            }
        }
        if let Ok(title) = env::var("CHAT_WIDGET_TITLE") {
            self.widget.title = title;
        }
        if let Ok(max_len) = env::var("CHAT_WIDGET_MAX_MESSAGE_LENGTH") {
            if let Ok(parsed) = max_len.parse::<usize>() {
                self.widget.max_message_length = parsed;
            }
        }
        if let Ok(url) = env::var("CHAT_WIDGET_API_URL") {
            self.transport.base_url = url;
        }
        if let Ok(key) = env::var("CHAT_WIDGET_API_KEY") {
            self.transport.api_key = Some(key);
        }
        if let Ok(path) = env::var("CHAT_WIDGET_FALLBACK_PATH") {
            self.fallback.path = Some(path);
        }
    }
}
