//! ONNX Runtime sentence-transformer embedder.
//!
//! Mean-pooled embeddings from a model such as all-MiniLM-L6-v2. The model
//! directory must contain `model.onnx` and `tokenizer.json`.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, anyhow, ensure};
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use tokenizers::{Encoding, PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::TextEmbedder;
use crate::similarity::normalize;

const MAX_TOKENS: usize = 256;
const FALLBACK_DIM: usize = 384;

/// Sentence embedder backed by an ONNX session.
///
/// `Session::run` takes `&mut self`, so the session sits behind a mutex and
/// one embedder can be shared across tasks.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dim: usize,
    model_id: String,
}

impl OnnxEmbedder {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        for required in [&model_path, &tokenizer_path] {
            ensure!(required.exists(), "{} not found", required.display());
        }

        let session = Session::builder()?
            .commit_from_file(&model_path)
            .with_context(|| format!("loading {}", model_path.display()))?;
        let dim = output_dim(&session).unwrap_or(FALLBACK_DIM);
        let tokenizer = load_tokenizer(&tokenizer_path)?;
        let model_id = model_id_for(model_dir);

        info!(dim, model = %model_id, "loaded embedding model");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dim,
            model_id,
        })
    }
}

impl TextEmbedder for OnnxEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("tokenize: {e}"))?;
        let batch = TokenBatch::new(&encodings);
        let shape = batch.shape();
        debug!(rows = batch.rows, cols = batch.cols, "running embedding model");

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("embedding session lock poisoned"))?;
        let outputs = session.run(ort::inputs![
            "input_ids" => Tensor::from_array((shape, batch.ids.into_boxed_slice()))?,
            "attention_mask" => Tensor::from_array((shape, batch.mask.clone().into_boxed_slice()))?,
            "token_type_ids" => Tensor::from_array((shape, batch.types.into_boxed_slice()))?,
        ])?;

        // Last hidden state: [rows, seq, dim].
        let (hidden_shape, hidden) = outputs[0].try_extract_tensor::<f32>()?;
        let hidden_shape: &[i64] = hidden_shape;
        let &[rows, seq, dim] = hidden_shape else {
            return Err(anyhow!("expected a rank-3 output, got {hidden_shape:?}"));
        };
        ensure!(
            rows as usize == batch.rows && dim as usize == self.dim,
            "output shape {hidden_shape:?} does not match {} texts of dimension {}",
            batch.rows,
            self.dim
        );

        Ok(mean_pool(
            hidden,
            &batch.mask,
            batch.cols,
            seq as usize,
            self.dim,
        ))
    }
}

// ── Helpers ──

/// Token ids, attention mask and type ids for a batch, padded to one width.
struct TokenBatch {
    rows: usize,
    cols: usize,
    ids: Vec<i64>,
    mask: Vec<i64>,
    types: Vec<i64>,
}

impl TokenBatch {
    fn new(encodings: &[Encoding]) -> Self {
        let rows = encodings.len();
        let cols = encodings.iter().map(Encoding::len).max().unwrap_or(0);
        let mut batch = Self {
            rows,
            cols,
            ids: Vec::with_capacity(rows * cols),
            mask: Vec::with_capacity(rows * cols),
            types: Vec::with_capacity(rows * cols),
        };
        for encoding in encodings {
            push_padded(&mut batch.ids, encoding.get_ids(), cols);
            push_padded(&mut batch.mask, encoding.get_attention_mask(), cols);
            push_padded(&mut batch.types, encoding.get_type_ids(), cols);
        }
        batch
    }

    fn shape(&self) -> [i64; 2] {
        [self.rows as i64, self.cols as i64]
    }
}

fn push_padded(dst: &mut Vec<i64>, src: &[u32], width: usize) {
    dst.extend(src.iter().map(|&v| i64::from(v)));
    dst.resize(dst.len() + width.saturating_sub(src.len()), 0);
}

/// Average the hidden states of unmasked tokens per row, then L2-normalize.
///
/// `hidden` is `[rows, seq, dim]` flattened; `mask` is `[rows, mask_cols]`.
fn mean_pool(hidden: &[f32], mask: &[i64], mask_cols: usize, seq: usize, dim: usize) -> Vec<Vec<f32>> {
    if seq == 0 || mask_cols == 0 || dim == 0 {
        return Vec::new();
    }
    hidden
        .chunks_exact(seq * dim)
        .zip(mask.chunks_exact(mask_cols))
        .map(|(states, row_mask)| {
            let mut pooled = vec![0.0f32; dim];
            let mut weight = 0.0f32;
            for (token, &m) in states.chunks_exact(dim).zip(row_mask) {
                if m == 0 {
                    continue;
                }
                let m = m as f32;
                for (acc, h) in pooled.iter_mut().zip(token) {
                    *acc += h * m;
                }
                weight += m;
            }
            if weight > 0.0 {
                pooled.iter_mut().for_each(|p| *p /= weight);
            }
            normalize(&mut pooled);
            pooled
        })
        .collect()
}

fn load_tokenizer(path: &Path) -> anyhow::Result<Tokenizer> {
    let mut tokenizer =
        Tokenizer::from_file(path).map_err(|e| anyhow!("load {}: {e}", path.display()))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_TOKENS,
            ..Default::default()
        }))
        .map_err(|e| anyhow!("set truncation: {e}"))?;
    tokenizer.with_padding(Some(PaddingParams::default()));
    Ok(tokenizer)
}

/// Embedding width from the model's first output, when it is static.
fn output_dim(session: &Session) -> Option<usize> {
    let ValueType::Tensor { shape, .. } = session.outputs().first()?.dtype() else {
        return None;
    };
    shape
        .last()
        .and_then(|&d| usize::try_from(d).ok())
        .filter(|&d| d > 0)
}

fn model_id_for(model_dir: &Path) -> String {
    let name = model_dir
        .file_name()
        .map_or_else(|| "model".into(), |n| n.to_string_lossy());
    format!("onnx:{name}")
}
