//! Storage layer: example corpora in, persisted similarity index out.

mod error;
pub use error::StoreError;

pub mod corpus;
pub mod index;

pub use corpus::{load_corpus, read_parquet};
pub use index::{IndexStats, SimilarityIndex, query_text, searchable_text};
