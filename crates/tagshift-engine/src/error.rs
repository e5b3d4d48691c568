use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no rules and no indexed examples; ingest a corpus first")]
    EmptyCorpus,

    #[error("invalid option {field}: {message}")]
    InvalidOption { field: &'static str, message: String },
}
