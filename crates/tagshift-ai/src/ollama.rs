//! Ollama `/api/generate` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::generate::{GenerateError, GenerateRequest, GenerationOptions, Generator, parse_generate_body};

/// HTTP client for an Ollama-compatible generate endpoint.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GeneratePayload<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerationOptions,
}

impl OllamaClient {
    /// `base_url` is like `http://localhost:11434` (a trailing slash is dropped).
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, GenerateError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl Generator for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError> {
        let url = self.endpoint();
        let payload = GeneratePayload {
            model: &self.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: request.options,
        };

        debug!(url = %url, model = %self.model, prompt_chars = request.prompt.len(), "calling generator");
        let resp = self.client.post(&url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerateError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let text = parse_generate_body(&body)?;
        info!(model = %self.model, chars = text.len(), "generation complete");
        Ok(text)
    }
}
