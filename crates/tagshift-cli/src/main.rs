mod display;
mod pipeline;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tagshift_ai::{HashingEmbedder, OllamaClient, TextEmbedder};
use tagshift_core::config::TagshiftConfig;
use tagshift_core::{EmbedderKind, TagFamily};
use tagshift_engine::{MigrationOptions, Migrator};
use tagshift_rules::{PageAssets, RuleStore, TagMapper};
use tagshift_store::SimilarityIndex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Migrate V1 custom-element markup to V2 with learned rules, retrieval and generation.
#[derive(Parser)]
#[command(name = "tagshift", version)]
struct Cli {
    /// Config file (default: ./tagshift.toml when present)
    #[arg(long, global = true, env = "TAGSHIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Similarity index file
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Tag-name prefix of the V1 component family
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an example corpus and build the similarity index
    Index {
        /// Corpus file (.parquet, .json, .jsonl)
        corpus: PathBuf,
    },

    /// Synthesize transformation rules and export them as JSON
    Rules {
        /// Corpus file to synthesize from
        #[arg(required_unless_present = "from_index", conflicts_with = "from_index")]
        corpus: Option<PathBuf>,
        /// Synthesize from the examples stored in the index instead
        #[arg(long)]
        from_index: bool,
        /// Write the export here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Retrieve the examples most similar to a query
    Search {
        query: String,
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },

    /// Migrate a V1 fragment
    Migrate {
        /// Input file, or `-` / nothing for stdin
        input: Option<PathBuf>,
        /// Rules and retrieval only; never call the generator
        #[arg(long)]
        no_generate: bool,
        /// Rule export to use instead of synthesizing from the index
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Show index statistics
    Stats,

    /// Rename tags (names only) in page body, CSS and JS
    Rename {
        #[arg(long)]
        body: Option<PathBuf>,
        #[arg(long)]
        css: Option<PathBuf>,
        #[arg(long)]
        js: Option<PathBuf>,
        /// Rule export to take the name mapping from
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    info!("tagshift v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let family = TagFamily::new(&config.markup.prefix)
        .with_context(|| format!("invalid tag prefix {:?}", config.markup.prefix))?;

    match cli.command {
        Commands::Index { ref corpus } => {
            let embedder = build_embedder(&config)?;
            let run = pipeline::run_index(corpus, &config.index.path, embedder, family)?;
            match cli.output {
                OutputFormat::Json => print_json(&display::index_run_json(&run))?,
                OutputFormat::Text => display::print_index_run(&run),
            }
        }

        Commands::Rules {
            ref corpus,
            from_index,
            ref out,
        } => {
            let examples = match corpus {
                Some(path) if !from_index => tagshift_store::load_corpus(path, &family)
                    .with_context(|| format!("loading corpus {}", path.display()))?,
                _ => {
                    let index = open_index(&config, family.clone())?;
                    index.examples().cloned().collect()
                }
            };
            let (rules, summary) = RuleStore::synthesize_with_summary(&examples, &family);
            eprintln!(
                "  Synthesized {} rules from {} examples ({} skipped)",
                summary.rules, summary.examples, summary.skipped
            );
            match out {
                Some(path) => {
                    rules
                        .save(path)
                        .with_context(|| format!("writing rules to {}", path.display()))?;
                    eprintln!("  Wrote {}", path.display());
                }
                None => println!("{}", rules.to_json()?),
            }
        }

        Commands::Search { ref query, k } => {
            let index = open_index(&config, family)?;
            let records = index.query(query, k);
            match cli.output {
                OutputFormat::Json => print_json(&records)?,
                OutputFormat::Text => display::print_records(&records),
            }
        }

        Commands::Migrate {
            ref input,
            no_generate,
            ref rules,
        } => {
            let fragment = read_input(input.as_deref())?;
            let index = open_index(&config, family.clone())?;
            let rules = load_rules(rules.as_deref(), &index, &family)?;

            let mut options = MigrationOptions::from_config(&config);
            options.generate &= !no_generate;
            let generate = options.generate;
            let mut migrator = Migrator::new(Arc::new(rules), Arc::new(index), options)
                .context("initializing migrator (run `tagshift index <corpus>` first)")?;
            if generate {
                let client = OllamaClient::new(
                    &config.generation.url,
                    &config.generation.model,
                    Duration::from_secs(config.generation.timeout_secs),
                )
                .context("building generation client")?;
                migrator = migrator.with_generator(Arc::new(client));
            }

            let result = migrator.migrate(&fragment).await;
            match cli.output {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Text => display::print_migration(&result),
            }
        }

        Commands::Stats => {
            let index = open_index(&config, family)?;
            let stats = index.stats();
            match cli.output {
                OutputFormat::Json => print_json(&display::stats_json(&stats))?,
                OutputFormat::Text => display::print_stats(&stats),
            }
        }

        Commands::Rename {
            ref body,
            ref css,
            ref js,
            ref rules,
        } => {
            if body.is_none() && css.is_none() && js.is_none() {
                bail!("nothing to rename; pass --body, --css or --js");
            }
            let index = open_index(&config, family.clone())?;
            let rules = load_rules(rules.as_deref(), &index, &family)?;
            let mapper = TagMapper::from_rules(&rules).context("building tag mapper")?;
            if mapper.is_empty() {
                warn!("no tag mappings available; output equals input");
            }

            let assets = PageAssets {
                body: read_optional(body.as_deref())?,
                css: read_optional(css.as_deref())?,
                js: read_optional(js.as_deref())?,
            };
            let renamed = mapper.rename_assets(&assets);
            match cli.output {
                OutputFormat::Json => print_json(&renamed)?,
                OutputFormat::Text => display::print_assets(&renamed),
            }
        }
    }

    Ok(())
}

// ── Setup ──

fn load_config(cli: &Cli) -> anyhow::Result<TagshiftConfig> {
    let mut config = TagshiftConfig::load(cli.config.as_deref()).context("loading configuration")?;
    apply_flags(&mut config, cli.index.as_deref(), cli.prefix.as_deref());
    config.validate().context("validating configuration")?;
    Ok(config)
}

/// CLI flags win over file and environment.
fn apply_flags(config: &mut TagshiftConfig, index: Option<&Path>, prefix: Option<&str>) {
    if let Some(path) = index {
        config.index.path = path.to_path_buf();
    }
    if let Some(prefix) = prefix {
        config.markup.prefix = prefix.to_string();
    }
}

fn build_embedder(config: &TagshiftConfig) -> anyhow::Result<Arc<dyn TextEmbedder>> {
    match config.index.embedder {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(config.index.dim))),
        #[cfg(feature = "onnx")]
        EmbedderKind::Onnx => {
            let embedder = tagshift_ai::OnnxEmbedder::load(&config.index.model_dir)
                .with_context(|| format!("loading model from {}", config.index.model_dir.display()))?;
            Ok(Arc::new(embedder))
        }
        #[cfg(not(feature = "onnx"))]
        EmbedderKind::Onnx => bail!("index.embedder = \"onnx\" needs a build with the `onnx` feature"),
    }
}

fn open_index(config: &TagshiftConfig, family: TagFamily) -> anyhow::Result<SimilarityIndex> {
    let embedder = build_embedder(config)?;
    SimilarityIndex::open(&config.index.path, embedder, family)
        .with_context(|| format!("opening index {}", config.index.path.display()))
}

/// Rules from an export file, or synthesized from the indexed corpus.
fn load_rules(
    path: Option<&Path>,
    index: &SimilarityIndex,
    family: &TagFamily,
) -> anyhow::Result<RuleStore> {
    if let Some(path) = path {
        return RuleStore::load(path).with_context(|| format!("loading rules {}", path.display()));
    }
    let examples: Vec<_> = index.examples().cloned().collect();
    Ok(RuleStore::synthesize(&examples, family))
}

// ── I/O helpers ──

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn read_optional(path: Option<&Path>) -> anyhow::Result<String> {
    path.map_or(Ok(String::new()), |p| {
        std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rules_needs_a_source() {
        assert!(Cli::try_parse_from(["tagshift", "rules"]).is_err());
        assert!(Cli::try_parse_from(["tagshift", "rules", "--from-index"]).is_ok());
        assert!(Cli::try_parse_from(["tagshift", "rules", "c.json", "--from-index"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tagshift", "migrate", "-", "--no-generate", "--output", "json", "--prefix", "foo-",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.prefix.as_deref(), Some("foo-"));
        assert!(matches!(
            cli.command,
            Commands::Migrate {
                no_generate: true,
                ..
            }
        ));
    }

    #[test]
    fn flags_override_config() {
        let mut config = TagshiftConfig::default();
        apply_flags(&mut config, Some(Path::new("/tmp/i.arrow")), Some("acme-"));
        assert_eq!(config.index.path, PathBuf::from("/tmp/i.arrow"));
        assert_eq!(config.markup.prefix, "acme-");

        let before = config.clone();
        apply_flags(&mut config, None, None);
        assert_eq!(config, before);
    }

    #[test]
    fn hashing_embedder_uses_configured_dim() {
        let mut config = TagshiftConfig::default();
        config.index.dim = 64;
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.dim(), 64);
        assert_eq!(embedder.model_id(), "hashing-xxh3-64");
    }
}
