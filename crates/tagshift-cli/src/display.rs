//! Human-readable output for the `tagshift` subcommands.
//!
//! Result markup goes to stdout; summaries and cards go to stderr so that
//! `tagshift migrate < in.html > out.html` stays clean.

use serde_json::{Value, json};
use tagshift_core::{MigrationResult, RetrievalRecord};
use tagshift_rules::PageAssets;
use tagshift_store::IndexStats;

use crate::pipeline::IndexRun;

const PREVIEW_CHARS: usize = 80;

// ── Index ──

pub fn print_index_run(run: &IndexRun) {
    eprintln!();
    eprintln!("=== Index built ===");
    eprintln!("  {:<14} {}", "corpus", run.corpus.display());
    eprintln!("  {:<14} {}", "documents", run.stats.documents);
    eprintln!(
        "  {:<14} {} ({} examples skipped)",
        "rules", run.rules.rules, run.rules.skipped
    );
    eprintln!("  {:<14} {}", "components", run.stats.components.len());
    eprintln!("  {:<14} {:.1}s", "elapsed", run.elapsed_secs);
    if let Some(path) = &run.stats.path {
        println!("{}", path.display());
    }
}

pub fn index_run_json(run: &IndexRun) -> Value {
    json!({
        "corpus": run.corpus.display().to_string(),
        "rules": run.rules.rules,
        "skipped": run.rules.skipped,
        "elapsed_secs": run.elapsed_secs,
        "index": stats_json(&run.stats),
    })
}

// ── Stats ──

pub fn print_stats(stats: &IndexStats) {
    println!("=== Similarity index ===");
    if let Some(path) = &stats.path {
        println!("  {:<14} {}", "path", path.display());
    }
    println!("  {:<14} {}", "documents", stats.documents);
    println!("  {:<14} {} (dim {})", "model", stats.model, stats.dim);
    println!(
        "  {:<14} {}",
        "built_at",
        stats.built_at.as_deref().unwrap_or("never")
    );
    if stats.components.is_empty() {
        return;
    }
    println!();
    println!("Components");
    let mut counts: Vec<(&String, &usize)> = stats.components.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (name, count) in counts {
        println!("  {name:<32} {count}");
    }
}

pub fn stats_json(stats: &IndexStats) -> Value {
    json!({
        "path": stats.path.as_ref().map(|p| p.display().to_string()),
        "documents": stats.documents,
        "model": stats.model,
        "dim": stats.dim,
        "built_at": stats.built_at,
        "components": stats.components,
    })
}

// ── Search ──

pub fn print_records(records: &[RetrievalRecord]) {
    if records.is_empty() {
        println!("No similar examples.");
        return;
    }
    for (rank, r) in records.iter().enumerate() {
        println!(
            "{:>2}. [{:.3}] {} → {}  (id {}, {} attrs)",
            rank + 1,
            r.similarity_score,
            r.v1_component,
            r.v2_component,
            r.id,
            r.attribute_count
        );
        println!("      v1: {}", preview(&r.v1));
        println!("      v2: {}", preview(&r.v2));
    }
}

// ── Migrate ──

pub fn print_migration(result: &MigrationResult) {
    println!("{}", result.output());

    eprintln!();
    eprintln!("=== Migration ===");
    eprintln!("  {:<14} {}", "method", result.method);
    eprintln!("  {:<14} {:.3}", "confidence", result.confidence_score);
    eprintln!(
        "  {:<14} {}",
        "changed",
        if result.suggested_v2.is_some() { "yes" } else { "no" }
    );
    for r in &result.similar_examples {
        eprintln!(
            "  {:<14} [{:.3}] {} → {} (id {})",
            "similar", r.similarity_score, r.v1_component, r.v2_component, r.id
        );
    }
}

// ── Rename ──

pub fn print_assets(assets: &PageAssets) {
    for (label, text) in [("body", &assets.body), ("css", &assets.css), ("js", &assets.js)] {
        if text.is_empty() {
            continue;
        }
        println!("=== {label} ===");
        println!("{text}");
    }
}

/// First line of `markup`, cut to [`PREVIEW_CHARS`].
fn preview(markup: &str) -> String {
    let line = markup.lines().next().unwrap_or_default();
    match line.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &line[..cut]),
        None if markup.lines().nth(1).is_some() => format!("{line}…"),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn preview_cuts_long_and_multiline_markup() {
        assert_eq!(preview("<a></a>"), "<a></a>");
        assert_eq!(preview("<a>\n</a>"), "<a>…");
        let long = "x".repeat(100);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS + 1);
    }

    #[test]
    fn stats_json_shape() {
        let stats = IndexStats {
            documents: 2,
            components: BTreeMap::from([("helix-a".to_string(), 2)]),
            model: "hashing-xxh3-384".into(),
            dim: 384,
            built_at: None,
            path: None,
        };
        let value = stats_json(&stats);
        assert_eq!(value["documents"], 2);
        assert_eq!(value["components"]["helix-a"], 2);
        assert!(value["built_at"].is_null());
    }
}
