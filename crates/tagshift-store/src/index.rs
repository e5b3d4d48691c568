//! Persisted similarity index over migration examples.
//!
//! One Arrow IPC file holds one corpus generation: the examples, their
//! searchable text and embeddings, with the embedder model, dimension and
//! build time in the schema metadata. The corpus is small enough that every
//! query is a brute-force cosine scan over the in-memory vectors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, FixedSizeListBuilder, Float32Array, Float32Builder,
    StringArray,
};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use tagshift_ai::{TextEmbedder, top_k};
use tagshift_core::markup::scan_start_tags;
use tagshift_core::schema::index as schema;
use tagshift_core::{MigrationExample, RetrievalRecord, TagFamily};
use tracing::{debug, info, warn};

use crate::StoreError;

const EMBED_BATCH_SIZE: usize = 64;

struct IndexEntry {
    example: MigrationExample,
    embedding: Vec<f32>,
}

/// Summary of the current corpus generation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub documents: usize,
    /// Component name → number of examples.
    pub components: BTreeMap<String, usize>,
    pub model: String,
    pub dim: usize,
    pub built_at: Option<String>,
    pub path: Option<PathBuf>,
}

/// Nearest-neighbour search over migration examples.
///
/// Reads take `&self`; [`ingest`](Self::ingest) replaces the whole corpus and
/// takes `&mut self`. To swap a new generation in while readers hold the old
/// one, build a fresh index with [`build`](Self::build) and replace an `Arc`.
pub struct SimilarityIndex {
    embedder: Arc<dyn TextEmbedder>,
    family: TagFamily,
    path: Option<PathBuf>,
    entries: Vec<IndexEntry>,
    built_at: Option<String>,
}

impl SimilarityIndex {
    /// An empty index that is never written to disk.
    pub fn in_memory(embedder: Arc<dyn TextEmbedder>, family: TagFamily) -> Self {
        Self {
            embedder,
            family,
            path: None,
            entries: Vec::new(),
            built_at: None,
        }
    }

    /// Open the index persisted at `path`, or an empty one if the file does not exist yet.
    ///
    /// Fails with [`StoreError::ModelMismatch`] if the file was built with a
    /// different embedder, and with [`StoreError::InvalidIndex`] if it was
    /// built for another tag prefix.
    pub fn open(
        path: &Path,
        embedder: Arc<dyn TextEmbedder>,
        family: TagFamily,
    ) -> Result<Self, StoreError> {
        let mut index = Self::in_memory(embedder, family);
        index.path = Some(path.to_path_buf());
        if !path.exists() {
            debug!(path = %path.display(), "no index file yet");
            return Ok(index);
        }

        let reader = FileReader::try_new(std::fs::File::open(path)?, None)?;
        let meta = reader.schema().metadata().clone();
        let found = meta.get(schema::META_MODEL).cloned().unwrap_or_default();
        if found != index.embedder.model_id() {
            return Err(StoreError::ModelMismatch {
                expected: index.embedder.model_id().to_string(),
                found,
            });
        }
        let dim: usize = meta
            .get(schema::META_DIM)
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| StoreError::InvalidIndex("missing dimension metadata".into()))?;
        if dim != index.embedder.dim() {
            return Err(StoreError::InvalidIndex(format!(
                "index dimension {dim} does not match embedder dimension {}",
                index.embedder.dim()
            )));
        }
        let prefix = meta
            .get(schema::META_PREFIX)
            .ok_or_else(|| StoreError::InvalidIndex("missing prefix metadata".into()))?;
        if prefix != index.family.prefix() {
            return Err(StoreError::InvalidIndex(format!(
                "index was built for tag prefix {prefix:?}, not {:?}",
                index.family.prefix()
            )));
        }

        for batch in reader {
            index.entries.extend(entries_from_batch(&batch?, dim)?);
        }
        index.built_at = meta.get(schema::META_BUILT_AT).cloned();
        info!(path = %path.display(), documents = index.entries.len(), "opened similarity index");
        Ok(index)
    }

    /// Build a fresh index from `examples`, persisting it to `path` if given.
    pub fn build(
        examples: Vec<MigrationExample>,
        embedder: Arc<dyn TextEmbedder>,
        family: TagFamily,
        path: Option<&Path>,
    ) -> Result<Self, StoreError> {
        let mut index = Self::in_memory(embedder, family);
        index.path = path.map(Path::to_path_buf);
        index.ingest(examples)?;
        Ok(index)
    }

    /// Replace the corpus with `examples`.
    ///
    /// The new generation is embedded and, for a persisted index, written to
    /// a temporary file that is then renamed over the old one. On any error
    /// the previous corpus stays in place, in memory and on disk.
    pub fn ingest(&mut self, examples: Vec<MigrationExample>) -> Result<usize, StoreError> {
        if examples.is_empty() {
            return Err(StoreError::EmptyCorpus);
        }

        let texts: Vec<String> = examples.iter().map(searchable_text).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(EMBED_BATCH_SIZE) {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let vectors = self
                .embedder
                .embed_batch(&refs)
                .map_err(|e| StoreError::Embedding(e.to_string()))?;
            embeddings.extend(vectors);
        }

        let built_at = Utc::now().to_rfc3339();
        let entries: Vec<IndexEntry> = examples
            .into_iter()
            .zip(embeddings)
            .map(|(example, embedding)| IndexEntry { example, embedding })
            .collect();

        if let Some(path) = &self.path {
            write_index(
                path,
                &entries,
                &texts,
                self.embedder.as_ref(),
                &built_at,
                self.family.prefix(),
            )?;
        }

        let count = entries.len();
        self.entries = entries;
        self.built_at = Some(built_at);
        info!(
            documents = count,
            model = %self.embedder.model_id(),
            "ingested migration examples"
        );
        Ok(count)
    }

    /// Up to `k` examples most similar to `text`, best first.
    ///
    /// Never fails: an empty index or an embedding error yields no records.
    pub fn query(&self, text: &str, k: usize) -> Vec<RetrievalRecord> {
        if self.entries.is_empty() || k == 0 {
            return Vec::new();
        }
        let q = query_text(text, &self.family);
        let vector = match self.embedder.embed(&q) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed");
                return Vec::new();
            }
        };

        top_k(
            &vector,
            self.entries.iter().map(|e| e.embedding.as_slice()),
            k,
        )
        .into_iter()
        .map(|(i, score)| {
            let ex = &self.entries[i].example;
            RetrievalRecord {
                id: ex.id.clone(),
                v1: ex.v1_markup.clone(),
                v2: ex.v2_markup.clone(),
                v1_component: ex.v1_tag.clone(),
                v2_component: ex.v2_tag.clone(),
                similarity_score: score,
                attribute_count: ex.attributes.len(),
            }
        })
        .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn family(&self) -> &TagFamily {
        &self.family
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The stored corpus generation, in ingestion order.
    pub fn examples(&self) -> impl Iterator<Item = &MigrationExample> {
        self.entries.iter().map(|e| &e.example)
    }

    pub fn stats(&self) -> IndexStats {
        let mut components = BTreeMap::new();
        for entry in &self.entries {
            *components
                .entry(entry.example.component().to_string())
                .or_insert(0) += 1;
        }
        IndexStats {
            documents: self.entries.len(),
            components,
            model: self.embedder.model_id().to_string(),
            dim: self.embedder.dim(),
            built_at: self.built_at.clone(),
            path: self.path.clone(),
        }
    }
}

// ── Text rendering ──

/// The text embedded for one example: tag names, descriptive metadata,
/// `key=value` attributes and both markups, lowercased.
pub fn searchable_text(example: &MigrationExample) -> String {
    let mut parts: Vec<&str> = vec![example.v1_tag.as_str(), example.v2_tag.as_str()];
    for field in [
        &example.component_name,
        &example.title,
        &example.description,
        &example.tags,
    ] {
        if let Some(value) = field {
            parts.push(value);
        }
    }
    let attrs: Vec<String> = example
        .attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    parts.extend(attrs.iter().map(String::as_str));
    parts.push(&example.v1_markup);
    parts.push(&example.v2_markup);
    parts.retain(|p| !p.is_empty());
    parts.join(" ").to_lowercase()
}

/// Query text for `input`. Markup queries are enriched with the root tag
/// name and its `key=value` attributes so they line up with [`searchable_text`].
pub fn query_text(input: &str, family: &TagFamily) -> String {
    if !input.contains('<') {
        return input.to_lowercase();
    }
    let root = family
        .root(input)
        .or_else(|| scan_start_tags(input).into_iter().next());
    let Some(root) = root else {
        return input.to_lowercase();
    };
    let mut parts = vec![root.name.clone()];
    parts.extend(
        root.attribute_map()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}")),
    );
    parts.push(input.to_string());
    parts.join(" ").to_lowercase()
}

// ── Persistence ──

fn write_index(
    path: &Path,
    entries: &[IndexEntry],
    texts: &[String],
    embedder: &dyn TextEmbedder,
    built_at: &str,
    prefix: &str,
) -> Result<(), StoreError> {
    let dim = embedder.dim();
    let schema = Arc::new(schema::example_index_schema_with_metadata(
        dim,
        embedder.model_id(),
        built_at,
        prefix,
    ));

    let text_col = |f: fn(&MigrationExample) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(
            entries.iter().map(|e| f(&e.example)).collect::<Vec<_>>(),
        ))
    };
    let opt_col = |f: fn(&MigrationExample) -> Option<&str>| -> ArrayRef {
        Arc::new(StringArray::from(
            entries.iter().map(|e| f(&e.example)).collect::<Vec<_>>(),
        ))
    };

    let attributes: Vec<String> = entries
        .iter()
        .map(|e| serde_json::to_string(&e.example.attributes))
        .collect::<Result<_, _>>()?;

    let mut embedding_builder =
        FixedSizeListBuilder::new(Float32Builder::with_capacity(entries.len() * dim), dim as i32)
            .with_field(schema::embedding_item());
    for entry in entries {
        if entry.embedding.len() != dim {
            return Err(StoreError::Embedding(format!(
                "embedder returned {} values, expected {dim}",
                entry.embedding.len()
            )));
        }
        embedding_builder.values().append_slice(&entry.embedding);
        embedding_builder.append(true);
    }

    let columns: Vec<ArrayRef> = vec![
        text_col(|e| e.id.as_str()),
        text_col(|e| e.v1_markup.as_str()),
        text_col(|e| e.v2_markup.as_str()),
        text_col(|e| e.v1_tag.as_str()),
        text_col(|e| e.v2_tag.as_str()),
        Arc::new(StringArray::from(attributes)),
        opt_col(|e| e.title.as_deref()),
        opt_col(|e| e.component_name.as_deref()),
        opt_col(|e| e.description.as_deref()),
        opt_col(|e| e.tags.as_deref()),
        opt_col(|e| e.source.as_deref()),
        opt_col(|e| e.created_by.as_deref()),
        opt_col(|e| e.created_at.as_deref()),
        Arc::new(StringArray::from(
            texts.iter().map(String::as_str).collect::<Vec<_>>(),
        )),
        Arc::new(embedding_builder.finish()),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    {
        let mut writer = FileWriter::try_new(tmp.as_file_mut(), &schema)?;
        writer.write(&batch)?;
        writer.finish()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

    info!(path = %path.display(), rows = batch.num_rows(), "wrote similarity index");
    Ok(())
}

fn text_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::InvalidIndex(format!("missing text column {name:?}")))
}

fn entries_from_batch(batch: &RecordBatch, dim: usize) -> Result<Vec<IndexEntry>, StoreError> {
    let id = text_column(batch, "id")?;
    let v1 = text_column(batch, "v1")?;
    let v2 = text_column(batch, "v2")?;
    let v1_tag = text_column(batch, "v1_tag")?;
    let v2_tag = text_column(batch, "v2_tag")?;
    let attributes = text_column(batch, "attributes")?;
    let provenance: Vec<&StringArray> = schema::PROVENANCE_COLUMNS
        .iter()
        .map(|name| text_column(batch, name))
        .collect::<Result<_, _>>()?;
    let embeddings = batch
        .column_by_name("embedding")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| StoreError::InvalidIndex("missing embedding column".into()))?;

    let optional = |col: &StringArray, i: usize| (!col.is_null(i)).then(|| col.value(i).to_string());

    let mut entries = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let values = embeddings.value(i);
        let floats = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| StoreError::InvalidIndex("embedding values are not f32".into()))?;
        if floats.len() != dim {
            return Err(StoreError::InvalidIndex(format!(
                "row {i} has {} embedding values, expected {dim}",
                floats.len()
            )));
        }

        let example = MigrationExample {
            id: id.value(i).to_string(),
            v1_markup: v1.value(i).to_string(),
            v2_markup: v2.value(i).to_string(),
            v1_tag: v1_tag.value(i).to_string(),
            v2_tag: v2_tag.value(i).to_string(),
            attributes: serde_json::from_str(attributes.value(i))?,
            title: optional(provenance[0], i),
            component_name: optional(provenance[1], i),
            description: optional(provenance[2], i),
            tags: optional(provenance[3], i),
            source: optional(provenance[4], i),
            created_by: optional(provenance[5], i),
            created_at: optional(provenance[6], i),
        };
        entries.push(IndexEntry {
            example,
            embedding: floats.values().to_vec(),
        });
    }
    Ok(entries)
}
