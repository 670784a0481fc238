use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WovenConfig {
    pub llm: LlmConfig,
    pub retry: RetrySettings,
    pub story: StoryConfig,
    pub storage: StorageConfig,
}

impl WovenConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: WovenConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("WOVEN_DB_PATH") {
            self.storage.db_path = v;
            self.storage.enabled = true;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `openai`, `anthropic` or `mock`.
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            base_url: None,
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    /// Extra multiplier applied to the backoff delay after a rate-limit error.
    pub rate_limit_factor: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 2_000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
            rate_limit_factor: 2.0,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    pub short_turns: usize,
    pub long_turns: usize,
    /// Let long stories end once the character reaches the target emotion
    /// past the halfway point.
    pub early_finish: bool,
    /// Append "<name> responded: ..." to the running summary.
    pub summarize_responses: bool,
    pub fallback_question: String,
    pub choice_history_limit: usize,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            short_turns: 10,
            long_turns: 17,
            early_finish: true,
            summarize_responses: false,
            fallback_question: "What are you feeling in this moment?".to_string(),
            choice_history_limit: crate::state::DEFAULT_CHOICE_HISTORY_LIMIT,
        }
    }
}

impl StoryConfig {
    pub fn total_turns(&self, length: crate::StoryLength) -> usize {
        match length {
            crate::StoryLength::Short => self.short_turns,
            crate::StoryLength::Long => self.long_turns,
        }
        .max(1)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            db_path: "woven.db".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
