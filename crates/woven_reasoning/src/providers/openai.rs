//! OpenAI-compatible chat completions provider.
//!
//! Works against api.openai.com and anything speaking the same protocol
//! (Ollama, vLLM, LM Studio) via `base_url`.

use crate::api_types::{ChatMessage, ChatRequest, ChatResponse};
use crate::llm::{GenerationError, GenerationParams, TextGenerator};
use anyhow::{Context, Result};
use reqwest::Client;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(model: &str, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        let base_url = base_url
            .map(str::to_string)
            .or_else(|| env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            base_url,
            model: model.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TextGenerator for OpenAiClient {
    fn name(&self) -> &str {
        "OpenAI"
    }

    #[tracing::instrument(skip(self, system, prompt, params), fields(model = %self.model))]
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        tracing::debug!(
            "OpenAI request: prompt {} chars, max_tokens={}, temperature={:.2}",
            prompt.len(),
            params.max_tokens,
            params.temperature
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = super::retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(self.name(), status, &text, retry_after));
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(parsed.into_text().unwrap_or_default())
    }
}
