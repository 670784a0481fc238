use crate::api_types::{ChatMessage, MessagesRequest, MessagesResponse};
use crate::llm::{GenerationError, GenerationParams, TextGenerator};
use anyhow::{Context, Result};
use reqwest::Client;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(model: &str, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY is not set")?;
        let base_url = base_url
            .map(str::to_string)
            .or_else(|| env::var("ANTHROPIC_BASE_URL").ok())
            .unwrap_or_else(|| "https://api.anthropic.com".to_string())
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
impl TextGenerator for AnthropicClient {
    fn name(&self) -> &str {
        "Anthropic"
    }

    #[tracing::instrument(skip(self, system, prompt, params), fields(model = %self.model))]
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: self.model.clone(),
            system: (!system.is_empty()).then(|| system.to_string()),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: params.max_tokens,
            temperature: Some(params.temperature),
        };

        tracing::debug!(
            "LLM params: max_tokens={}, temperature={:.2}",
            params.max_tokens,
            params.temperature
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = super::retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(self.name(), status, &text, retry_after));
        }

        let resp_text = response.text().await?;
        tracing::debug!(
            "Anthropic raw response (first 500 chars): {}",
            resp_text.chars().take(500).collect::<String>()
        );
        let parsed: MessagesResponse = serde_json::from_str(&resp_text)
            .map_err(|e| GenerationError::Fatal(format!("Failed to parse Anthropic response: {e}")))?;
        if parsed.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!("Anthropic reply hit max_tokens; trailing sections may be missing");
        }
        Ok(parsed.into_text())
    }
}
