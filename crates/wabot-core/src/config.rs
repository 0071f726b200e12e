use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::WabotError;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default = "default_personas", rename = "persona")]
    pub personas: Vec<PersonaConfig>,
    #[serde(default)]
    pub market: MarketConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            api: ApiConfig::default(),
            delivery: DeliveryConfig::default(),
            notify: NotifyConfig::default(),
            memory: MemoryConfig::default(),
            gemini: GeminiConfig::default(),
            personas: default_personas(),
            market: MarketConfig::default(),
        }
    }
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Prepended to local phone numbers.
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Characters that introduce a chat command.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<char>,
    /// Chats the dispatcher never answers.
    #[serde(default)]
    pub muted: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            country_code: default_country_code(),
            prefixes: default_prefixes(),
            muted: Vec::new(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Shared secret for the send endpoints. Empty rejects every request.
    #[serde(default)]
    pub secret: String,
    /// HMAC key for `X-Hub-Signature-256`. Empty disables verification.
    #[serde(default)]
    pub webhook_secret: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_api_host(),
            port: default_api_port(),
            secret: String::new(),
            webhook_secret: String::new(),
        }
    }
}

/// Retry, pacing and media limits for outbound delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_api_attempts")]
    pub api_attempts: u32,
    #[serde(default = "default_two")]
    pub bulk_attempts: u32,
    #[serde(default = "default_two")]
    pub reply_attempts: u32,
    #[serde(default = "default_two")]
    pub webhook_attempts: u32,
    /// Linear backoff unit.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_bulk_pacing_ms")]
    pub bulk_pacing_ms: u64,
    #[serde(default = "default_webhook_pacing_ms")]
    pub webhook_pacing_ms: u64,
    #[serde(default = "default_max_media_bytes")]
    pub max_media_bytes: usize,
    /// Longest data URL the transport accepts as a text message.
    #[serde(default = "default_max_inline_chars")]
    pub max_inline_chars: usize,
    #[serde(default = "default_thumbnail_px")]
    pub thumbnail_px: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_attempts: default_api_attempts(),
            bulk_attempts: default_two(),
            reply_attempts: default_two(),
            webhook_attempts: default_two(),
            backoff_ms: default_backoff_ms(),
            bulk_pacing_ms: default_bulk_pacing_ms(),
            webhook_pacing_ms: default_webhook_pacing_ms(),
            max_media_bytes: default_max_media_bytes(),
            max_inline_chars: default_max_inline_chars(),
            thumbnail_px: default_thumbnail_px(),
        }
    }
}

/// Static webhook notification targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub targets: Vec<String>,
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_path")]
    pub path: String,
    /// Entries kept per conversation key.
    #[serde(default = "default_memory_cap")]
    pub cap: usize,
    /// Entries handed to the generator as context.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
            cap: default_memory_cap(),
            history_turns: default_history_turns(),
        }
    }
}

/// Gemini generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_image_model")]
    pub image_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
            image_model: default_gemini_image_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// One assistant persona: `!<keyword> <question>` is answered as `<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub keyword: String,
    pub name: String,
}

/// Market-data scraper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

// --- Defaults ---

fn default_name() -> String {
    "WhatsApp Bot".to_string()
}
fn default_data_dir() -> String {
    "~/.wabot".to_string()
}
fn default_country_code() -> String {
    "62".to_string()
}
fn default_prefixes() -> Vec<char> {
    vec!['!', '/']
}
fn default_true() -> bool {
    true
}
fn default_api_host() -> String {
    "0.0.0.0".to_string()
}
fn default_api_port() -> u16 {
    3000
}
fn default_api_attempts() -> u32 {
    3
}
fn default_two() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_bulk_pacing_ms() -> u64 {
    1000
}
fn default_webhook_pacing_ms() -> u64 {
    500
}
fn default_max_media_bytes() -> usize {
    15 * 1024 * 1024
}
fn default_max_inline_chars() -> usize {
    4000
}
fn default_thumbnail_px() -> u32 {
    64
}
fn default_memory_path() -> String {
    "~/.wabot/memory.json".to_string()
}
fn default_memory_cap() -> usize {
    50
}
fn default_history_turns() -> usize {
    6
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_gemini_image_model() -> String {
    "gemini-2.0-flash-preview-image-generation".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_personas() -> Vec<PersonaConfig> {
    vec![
        PersonaConfig {
            keyword: "fiq".into(),
            name: "Fiq".into(),
        },
        PersonaConfig {
            keyword: "apik".into(),
            name: "!apik".into(),
        },
    ]
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

impl Config {
    /// Apply process environment overrides.
    pub fn apply_env(&mut self) -> Result<(), WabotError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), WabotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            self.api.port = port
                .trim()
                .parse()
                .map_err(|e| WabotError::Config(format!("invalid PORT '{port}': {e}")))?;
        }
        if let Some(secret) = get("API_SECRET") {
            self.api.secret = secret;
        }
        if let Some(secret) = get("GITHUB_WEBHOOK_SECRET") {
            self.api.webhook_secret = secret;
        }
        if let Some(targets) = get("NOTIFICATION_TARGETS") {
            self.notify.targets = split_list(&targets, ',');
        }
        if let Some(muted) = get("NO_RESPONSE") {
            self.bot.muted = split_list(&muted, ';');
        }
        if let Some(key) = get("API_KEY_GEMINI") {
            self.gemini.api_key = key;
        }
        if let Some(path) = get("MEMORY_FILE") {
            self.memory.path = path;
        }
        Ok(())
    }

    /// `(keyword, name)` pairs for the command classifier.
    pub fn persona_keywords(&self) -> Vec<(String, String)> {
        self.personas
            .iter()
            .map(|p| (p.keyword.clone(), p.name.clone()))
            .collect()
    }

    /// Whether the bot should stay silent in `chat_id`.
    pub fn is_muted(&self, chat_id: &str) -> bool {
        let chat_id = chat_id.trim();
        self.bot.muted.iter().any(|m| m.trim() == chat_id)
    }
}

fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Load configuration from a TOML file. A missing file yields the defaults.
pub fn load(path: &str) -> Result<Config, WabotError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| WabotError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| WabotError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
