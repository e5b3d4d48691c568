//! Feature-hashing embedder: token counts folded into a fixed-size vector.
//!
//! Needs no model files, so it is the default for small example corpora
//! where tag names and attribute tokens carry most of the signal.

use xxhash_rust::xxh3::xxh3_64;

use crate::TextEmbedder;
use crate::similarity::normalize;

/// Weight of the parts of a hyphenated token (`helix-image` → `helix`, `image`).
const PART_WEIGHT: f32 = 0.5;

pub struct HashingEmbedder {
    dim: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self {
            dim,
            model_id: format!("hashing-xxh3-{dim}"),
        }
    }

    /// Embed one text without going through the fallible trait API.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        let mut v = vec![0.0f32; self.dim];
        for token in tokens(&text) {
            self.add(&mut v, token, 1.0);
            if token.contains('-') {
                for part in token.split('-').filter(|p| !p.is_empty()) {
                    self.add(&mut v, part, PART_WEIGHT);
                }
            }
        }
        normalize(&mut v);
        v
    }

    fn add(&self, v: &mut [f32], token: &str, weight: f32) {
        let slot = (xxh3_64(token.as_bytes()) % self.dim as u64) as usize;
        v[slot] += weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl TextEmbedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Alphanumeric runs, keeping `-` and `_` inside names.
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_sim;

    #[test]
    fn vectors_are_unit_length() {
        let e = HashingEmbedder::new(64);
        let v = e.vector("<helix-image src=\"a.png\"></helix-image>");
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::default();
        assert!(e.vector("  <> ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn deterministic_and_identical_text_scores_one() {
        let e = HashingEmbedder::default();
        let a = e.vector("helix-card title=x");
        let b = e.vector("helix-card title=x");
        assert_eq!(a, b);
        assert!((cosine_sim(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_tag_names_score_higher() {
        let e = HashingEmbedder::default();
        let doc = e.vector("helix-image helix-core-image src=a.png <helix-image src=\"a.png\">");
        let near = e.vector("helix-image");
        let far = e.vector("helix-accordion");
        assert!(cosine_sim(&doc, &near) > cosine_sim(&doc, &far));
    }

    #[test]
    fn model_id_encodes_dimension() {
        let e = HashingEmbedder::new(128);
        assert_eq!(e.model_id(), "hashing-xxh3-128");
        assert_eq!(e.dim(), 128);
        let batch = e.embed_batch(&["a", "b"]).unwrap();
        assert_eq!(batch.len(), 2);
    }
}
