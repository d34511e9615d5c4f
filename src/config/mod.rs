//! Engine configuration (code > env, DeepSeek-compatible defaults).

use std::time::Duration;

/// Default endpoint of the reference deployment.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// Default model of the reference deployment.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Built-in persona text; `append_system_prompt` adds to it, never replaces.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional AI assistant. \
You can use tools to perform file and shell operations. \
Answer the user's questions concisely and accurately.";

/// Configuration for a [`TurnController`](crate::turn::TurnController).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Hard cap on one request/stream exchange.
    pub request_timeout: Duration,
    pub system_prompt: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            request_timeout: Duration::from_secs(30),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from environment variables (`DEEPSEEK_API_KEY`,
    /// `DEEPSEEK_BASE_URL`, `DEEPSEEK_MODEL`), picking up `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
            config.api_key = key;
        }
        if let Ok(url) = std::env::var("DEEPSEEK_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("DEEPSEEK_MODEL") {
            config.model = model;
        }

        config
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Append caller-supplied persona text after the built-in prompt.
    /// Empty input leaves the prompt unchanged.
    pub fn append_system_prompt(&mut self, extra: &str) {
        if !extra.is_empty() {
            self.system_prompt.push('\n');
            self.system_prompt.push_str(extra);
        }
    }
}
