//! Layered configuration: compiled defaults → `tagshift.toml` → environment.
//!
//! CLI flags are applied last by the binary, directly on the loaded value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::markup::DEFAULT_PREFIX;

/// Project config file looked up in the working directory.
pub const CONFIG_FILE: &str = "tagshift.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Which text embedder backs the similarity index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Feature-hashed token counts; needs no model files.
    #[default]
    Hashing,
    /// ONNX sentence-transformer loaded from `index.model_dir`.
    Onnx,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TagshiftConfig {
    pub markup: MarkupConfig,
    pub index: IndexConfig,
    pub generation: GenerationConfig,
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Tag-name prefix of the V1 component family.
    pub prefix: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Arrow IPC file holding the persisted index.
    pub path: PathBuf,
    pub embedder: EmbedderKind,
    /// Directory with `model.onnx` and `tokenizer.json` (onnx embedder only).
    pub model_dir: PathBuf,
    /// Vector dimension for the hashing embedder.
    pub dim: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".tagshift/index.arrow"),
            embedder: EmbedderKind::Hashing,
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            dim: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub enabled: bool,
    /// Base URL of the Ollama-compatible generate endpoint.
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:11434".to_string(),
            model: "llama3:latest".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Generation is skipped when the best retrieval similarity reaches this.
    pub generation_threshold: f32,
    /// Added to the best similarity when generation succeeds.
    pub generation_bonus: f32,
    /// Minimum similarity for a retrieved example to guide a migration.
    pub min_similarity: f32,
    /// Confidence reported when every tag had a synthesized rule.
    pub rule_confidence: f32,
    /// Number of similar examples retrieved for the whole fragment.
    pub similar_examples: usize,
    /// Number of example pairs placed in a generation prompt.
    pub prompt_examples: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            generation_threshold: 0.9,
            generation_bonus: 0.1,
            min_similarity: 0.3,
            rule_confidence: 1.0,
            similar_examples: 3,
            prompt_examples: 2,
        }
    }
}

impl TagshiftConfig {
    /// Load defaults, then `path` (or `./tagshift.toml` if present), then
    /// process environment overrides, and validate.
    ///
    /// An explicit `path` must exist; the implicit project file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let project = Path::new(CONFIG_FILE);
                if project.exists() {
                    Self::from_file(project)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Parse a TOML string. Missing keys take their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Recognised: `TAGSHIFT_PREFIX`, `TAGSHIFT_INDEX`, `OLLAMA_URL`,
    /// `LLM_MODEL`, `TAGSHIFT_GENERATION_TIMEOUT_SECS`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup("TAGSHIFT_PREFIX") {
            self.markup.prefix = prefix;
        }
        if let Some(path) = lookup("TAGSHIFT_INDEX") {
            self.index.path = PathBuf::from(path);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.generation.url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.generation.model = model;
        }
        if let Some(secs) = lookup("TAGSHIFT_GENERATION_TIMEOUT_SECS") {
            self.generation.timeout_secs =
                secs.trim().parse().map_err(|_| ConfigError::Invalid {
                    field: "TAGSHIFT_GENERATION_TIMEOUT_SECS".to_string(),
                    message: format!("not a number of seconds: {secs:?}"),
                })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.markup.prefix.trim().is_empty() {
            return Err(invalid("markup.prefix", "must not be empty"));
        }
        if self.index.dim == 0 {
            return Err(invalid("index.dim", "must be greater than 0"));
        }
        if self.generation.timeout_secs == 0 {
            return Err(invalid("generation.timeout_secs", "must be greater than 0"));
        }
        let m = &self.migration;
        for (field, value) in [
            ("migration.generation_threshold", m.generation_threshold),
            ("migration.generation_bonus", m.generation_bonus),
            ("migration.min_similarity", m.min_similarity),
            ("migration.rule_confidence", m.rule_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be between 0.0 and 1.0"));
            }
        }
        if m.similar_examples == 0 {
            return Err(invalid("migration.similar_examples", "must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.to_string(),
    }
}
