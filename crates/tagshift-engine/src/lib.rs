//! The migration engine.
//!
//! [`Migrator`] ties the rule store, the similarity index and an optional
//! [`Generator`](tagshift_ai::Generator) together and turns one V1 fragment
//! into a [`MigrationResult`](tagshift_core::MigrationResult).

mod error;
pub mod orchestrator;
pub mod prompt;

pub use error::EngineError;
pub use orchestrator::{MigrationOptions, Migrator};
pub use prompt::{PromptRule, SYSTEM_PROMPT, build_prompt};
