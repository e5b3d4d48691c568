//! Example-corpus loading from Parquet and JSON.
//!
//! A corpus is a table with at least `v1` and `v2` text columns. Optional
//! `id`, `title`, `component_name`, `description`, `tags`, `source`,
//! `created_by` and `created_at` columns pass through into example metadata.

use std::path::Path;

use arrow::array::{Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use tagshift_core::{MigrationExample, TagFamily};
use tracing::{info, warn};

use crate::StoreError;

/// One corpus row as it appears in JSON input.
#[derive(Debug, Default, Deserialize)]
struct CorpusRow {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    v1: Option<String>,
    #[serde(default)]
    v2: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    component_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Load a corpus file, choosing the reader by extension.
///
/// Rows with a blank `v1` or `v2` are skipped. Ids default to the row ordinal.
pub fn load_corpus(path: &Path, family: &TagFamily) -> Result<Vec<MigrationExample>, StoreError> {
    if !path.exists() {
        return Err(StoreError::CorpusNotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let examples = match ext.as_str() {
        "parquet" => examples_from_batches(&read_parquet(path)?, family)?,
        "json" | "jsonl" | "ndjson" => {
            let text = std::fs::read_to_string(path)?;
            examples_from_json(&text, family)?
        }
        _ => return Err(StoreError::UnsupportedFormat(path.to_path_buf())),
    };

    info!(path = %path.display(), examples = examples.len(), "loaded corpus");
    Ok(examples)
}

/// Read a Parquet file into Arrow RecordBatches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Parse a JSON array of row objects, or one object per line.
pub fn examples_from_json(
    text: &str,
    family: &TagFamily,
) -> Result<Vec<MigrationExample>, StoreError> {
    let rows: Vec<CorpusRow> = if text.trim_start().starts_with('[') {
        serde_json::from_str(text)?
    } else {
        let mut rows = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<CorpusRow>(line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(line = n + 1, error = %e, "skipping malformed corpus line");
                    rows.push(CorpusRow::default());
                }
            }
        }
        rows
    };
    Ok(rows
        .into_iter()
        .enumerate()
        .filter_map(|(ordinal, row)| row_to_example(ordinal, row, family))
        .collect())
}

/// Convert Arrow batches with `v1`/`v2` columns into examples.
///
/// Columns of any type castable to Utf8 are accepted (Utf8, LargeUtf8,
/// integers for `id`, timestamps for `created_at`).
pub fn examples_from_batches(
    batches: &[RecordBatch],
    family: &TagFamily,
) -> Result<Vec<MigrationExample>, StoreError> {
    let mut examples = Vec::new();
    let mut ordinal = 0usize;

    for batch in batches {
        let v1 = required_column(batch, "v1")?;
        let v2 = required_column(batch, "v2")?;
        let id = optional_column(batch, "id")?;
        let title = optional_column(batch, "title")?;
        let component_name = optional_column(batch, "component_name")?;
        let description = optional_column(batch, "description")?;
        let tags = optional_column(batch, "tags")?;
        let source = optional_column(batch, "source")?;
        let created_by = optional_column(batch, "created_by")?;
        let created_at = optional_column(batch, "created_at")?;

        for i in 0..batch.num_rows() {
            let row = CorpusRow {
                id: value_at(id.as_ref(), i).map(serde_json::Value::String),
                v1: value_at(Some(&v1), i),
                v2: value_at(Some(&v2), i),
                title: value_at(title.as_ref(), i),
                component_name: value_at(component_name.as_ref(), i),
                description: value_at(description.as_ref(), i),
                tags: value_at(tags.as_ref(), i),
                source: value_at(source.as_ref(), i),
                created_by: value_at(created_by.as_ref(), i),
                created_at: value_at(created_at.as_ref(), i),
            };
            if let Some(example) = row_to_example(ordinal, row, family) {
                examples.push(example);
            }
            ordinal += 1;
        }
    }
    Ok(examples)
}

fn row_to_example(ordinal: usize, row: CorpusRow, family: &TagFamily) -> Option<MigrationExample> {
    let v1 = row.v1.as_deref().map(str::trim).unwrap_or_default();
    let v2 = row.v2.as_deref().map(str::trim).unwrap_or_default();
    if v1.is_empty() || v2.is_empty() {
        warn!(row = ordinal, "skipping corpus row with blank v1/v2");
        return None;
    }

    let id = match row.id {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => ordinal.to_string(),
    };

    let mut example = MigrationExample::from_pair(id, v1, v2, family);
    example.title = non_blank(row.title);
    example.component_name = non_blank(row.component_name);
    example.description = non_blank(row.description);
    example.tags = non_blank(row.tags);
    example.source = non_blank(row.source);
    example.created_by = non_blank(row.created_by);
    example.created_at = non_blank(row.created_at);
    Some(example)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required_column(batch: &RecordBatch, name: &str) -> Result<StringArray, StoreError> {
    optional_column(batch, name)?.ok_or_else(|| StoreError::MissingColumn(name.to_string()))
}

fn optional_column(batch: &RecordBatch, name: &str) -> Result<Option<StringArray>, StoreError> {
    let Some(col) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let utf8 = cast(col, &DataType::Utf8)?;
    let strings = utf8
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StoreError::MissingColumn(name.to_string()))?
        .clone();
    Ok(Some(strings))
}

fn value_at(col: Option<&StringArray>, i: usize) -> Option<String> {
    let col = col?;
    (!col.is_null(i)).then(|| col.value(i).to_string())
}
