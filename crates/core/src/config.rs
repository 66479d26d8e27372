use crate::error::ConfigError;
use serde::Serialize;
use url::Url;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_COLLECTION: &str = "boardgame_rules_v0";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_HISTORY_MAX_TURNS: usize = 10;

/// Connection and model parameters, resolved once at startup and passed
/// to every component that needs them.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub qdrant_url: String,
    #[serde(skip)]
    pub qdrant_api_key: Option<String>,
    pub collection: String,
    pub embed_model: String,
    pub chat_model: String,
    pub top_k: usize,
    pub openai_base_url: String,
    #[serde(skip)]
    pub openai_api_key: Option<String>,
    pub history: bool,
    pub history_max_turns: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            qdrant_api_key: None,
            collection: DEFAULT_COLLECTION.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_api_key: None,
            history: false,
            history_max_turns: DEFAULT_HISTORY_MAX_TURNS,
        }
    }
}

impl Settings {
    /// Rejects malformed values instead of falling back to defaults.
    pub fn validate(self) -> Result<Self, ConfigError> {
        Url::parse(&self.qdrant_url).map_err(|source| ConfigError::InvalidUrl {
            field: "qdrant_url",
            source,
        })?;
        Url::parse(&self.openai_base_url).map_err(|source| ConfigError::InvalidUrl {
            field: "openai_base_url",
            source,
        })?;

        if self.collection.trim().is_empty() {
            return Err(ConfigError::Empty("collection"));
        }
        if self.embed_model.trim().is_empty() {
            return Err(ConfigError::Empty("embed_model"));
        }
        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::Empty("chat_model"));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Zero("top_k"));
        }
        if self.history && self.history_max_turns == 0 {
            return Err(ConfigError::Zero("history_max_turns"));
        }

        Ok(Self {
            qdrant_api_key: non_blank(self.qdrant_api_key),
            openai_api_key: non_blank(self.openai_api_key),
            openai_base_url: self.openai_base_url.trim_end_matches('/').to_string(),
            qdrant_url: self.qdrant_url.trim_end_matches('/').to_string(),
            ..self
        })
    }

    /// Log-safe one-line summary; secrets only show whether they are set.
    pub fn redacted(&self) -> String {
        format!(
            "qdrant_url={} qdrant_api_key={} collection={} embed_model={} chat_model={} top_k={} openai_base_url={} openai_api_key={} history={} history_max_turns={}",
            self.qdrant_url,
            mask(&self.qdrant_api_key),
            self.collection,
            self.embed_model,
            self.chat_model,
            self.top_k,
            self.openai_base_url,
            mask(&self.openai_api_key),
            self.history,
            self.history_max_turns,
        )
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn mask(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "***"
    } else {
        "(none)"
    }
}
