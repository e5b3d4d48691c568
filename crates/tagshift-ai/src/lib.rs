//! AI layer: text embeddings for retrieval, the generative-text boundary,
//! and cleanup of generated markup.

mod hashing;
pub mod generate;
pub mod sanitize;
pub mod similarity;

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "http")]
mod ollama;

pub use generate::{GenerateError, GenerateRequest, GenerationOptions, Generator, parse_generate_body};
pub use hashing::HashingEmbedder;
pub use sanitize::sanitize_response;
pub use similarity::{cosine_sim, normalize, top_k};

#[cfg(feature = "onnx")]
pub use embedder::OnnxEmbedder;
#[cfg(feature = "http")]
pub use ollama::OllamaClient;

/// Turns text into fixed-length vectors for cosine-similarity search.
///
/// Implementations return L2-normalised vectors of length [`dim`](Self::dim).
pub trait TextEmbedder: Send + Sync {
    /// Identifier stored with a persisted index; changing it invalidates the index.
    fn model_id(&self) -> &str;

    fn dim(&self) -> usize;

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}
