//! The generative-text boundary.
//!
//! The engine only sees [`Generator`]; the concrete backend (Ollama over HTTP,
//! or a stub in tests) is chosen at the application edge.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("generator unavailable: {0}")]
    Unavailable(String),
}

/// Sampling options sent with every request. Defaults are fully deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            repeat_penalty: 1.0,
        }
    }
}

/// One prompt for the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub options: GenerationOptions,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    /// Produce raw text for `request`. The text is not yet sanitized.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError>;
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Extract generated text from a generate-endpoint body.
///
/// Accepts a single JSON object or newline-delimited JSON chunks whose
/// `response` fragments are concatenated until one reports `done`.
/// Malformed lines are skipped.
pub fn parse_generate_body(body: &str) -> Result<String, GenerateError> {
    if let Ok(chunk) = serde_json::from_str::<GenerateChunk>(body.trim()) {
        return Ok(chunk.response);
    }

    let mut text = String::new();
    let mut parsed_any = false;
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Ok(chunk) = serde_json::from_str::<GenerateChunk>(line) else {
            continue;
        };
        parsed_any = true;
        text.push_str(&chunk.response);
        if chunk.done {
            break;
        }
    }

    if parsed_any {
        Ok(text)
    } else {
        Err(GenerateError::Malformed(format!(
            "no JSON chunks in {} byte body",
            body.len()
        )))
    }
}
