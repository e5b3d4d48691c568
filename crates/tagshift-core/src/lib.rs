pub mod config;
pub mod example;
pub mod markup;
pub mod record;
pub mod schema;

pub use config::{ConfigError, EmbedderKind, TagshiftConfig};
pub use example::MigrationExample;
pub use markup::{TagFamily, TagSpan};
pub use record::{Method, MigrationResult, RetrievalRecord};
