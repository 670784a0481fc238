use async_trait::async_trait;
use std::time::Duration;

/// Sampling parameters for one generation request.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

impl From<&woven_core::config::LlmConfig> for GenerationParams {
    fn from(cfg: &woven_core::config::LlmConfig) -> Self {
        Self {
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }
}

/// Failure of a single generation request, classified for the retry loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    /// 429 from the provider. `retry_after` carries the server hint when given.
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    /// Network failure, timeout or 5xx. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Auth, bad request, malformed payload. Retrying won't help.
    #[error("generation failed: {0}")]
    Fatal(String),
    #[error("all {attempts} attempts failed; last error: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<GenerationError>,
    },
}

impl GenerationError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. } | GenerationError::Transient(_)
        )
    }

    /// Classify an HTTP error status the way every provider does.
    pub fn from_status(
        provider: &str,
        status: reqwest::StatusCode,
        body: &str,
        retry_after: Option<Duration>,
    ) -> Self {
        let message = format!(
            "{} ({}): {}",
            provider,
            status,
            body.chars().take(200).collect::<String>()
        );
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            GenerationError::RateLimited {
                message,
                retry_after,
            }
        } else if status.is_server_error() || status == reqwest::StatusCode::REQUEST_TIMEOUT {
            GenerationError::Transient(message)
        } else {
            GenerationError::Fatal(message)
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_builder() {
            GenerationError::Fatal(e.to_string())
        } else {
            GenerationError::Transient(e.to_string())
        }
    }
}

/// A text-generation service: one system instruction plus one composed
/// prompt in, raw reply text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError>;
}
