//! Index pipeline: reads a corpus, embeds it, writes the similarity index.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tagshift_ai::TextEmbedder;
use tagshift_core::TagFamily;
use tagshift_rules::{RuleStore, SynthesisSummary};
use tagshift_store::{IndexStats, SimilarityIndex};

pub struct IndexRun {
    pub corpus: PathBuf,
    pub stats: IndexStats,
    pub rules: SynthesisSummary,
    pub elapsed_secs: f64,
}

/// Run the full index pipeline: load corpus → synthesize rules (for the
/// report) → embed → write the index file.
pub fn run_index(
    corpus: &Path,
    index_path: &Path,
    embedder: Arc<dyn TextEmbedder>,
    family: TagFamily,
) -> anyhow::Result<IndexRun> {
    let start = Instant::now();

    let examples = tagshift_store::load_corpus(corpus, &family)
        .with_context(|| format!("loading corpus {}", corpus.display()))?;
    eprintln!("  Read {} examples from {}", examples.len(), corpus.display());

    let (_, rules) = RuleStore::synthesize_with_summary(&examples, &family);

    if let Some(dir) = index_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating index directory {}", dir.display()))?;
    }

    eprintln!("  Embedding with {}...", embedder.model_id());
    let index = SimilarityIndex::build(examples, embedder, family, Some(index_path))
        .with_context(|| format!("building index {}", index_path.display()))?;

    Ok(IndexRun {
        corpus: corpus.to_path_buf(),
        stats: index.stats(),
        rules,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}
