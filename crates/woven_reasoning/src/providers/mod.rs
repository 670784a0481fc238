pub mod anthropic;
pub mod mock;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use mock::MockGenerator;
pub use openai::OpenAiClient;

use crate::llm::TextGenerator;
use crate::retry::{RetryPolicy, RetryingGenerator};
use anyhow::Result;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::sync::Arc;
use std::time::Duration;
use woven_core::WovenConfig;

/// Build the configured provider, wrapped in the configured retry policy.
pub fn build_generator(config: &WovenConfig) -> Result<Arc<dyn TextGenerator>> {
    let llm = &config.llm;
    let timeout = Duration::from_secs(llm.timeout_secs.max(1));
    let base: Arc<dyn TextGenerator> = match llm.provider.to_ascii_lowercase().as_str() {
        "openai" => Arc::new(OpenAiClient::new(&llm.model, llm.base_url.as_deref(), timeout)?),
        "anthropic" => Arc::new(AnthropicClient::new(&llm.model, llm.base_url.as_deref(), timeout)?),
        "mock" => Arc::new(MockGenerator::new()),
        other => anyhow::bail!("Unknown LLM provider '{}' (expected openai, anthropic or mock)", other),
    };
    tracing::info!("Using {} provider with model {}", base.name(), llm.model);
    Ok(Arc::new(RetryingGenerator::new(base, RetryPolicy::from(&config.retry))))
}

/// Seconds-form `Retry-After` header, if present.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
