/// Arrow schema definitions for the persisted similarity index.
pub mod index {
    use arrow::datatypes::{DataType, Field, Schema};
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Schema metadata key: embedding model identifier.
    pub const META_MODEL: &str = "tagshift.model";
    /// Schema metadata key: embedding dimension.
    pub const META_DIM: &str = "tagshift.dim";
    /// Schema metadata key: RFC 3339 build timestamp.
    pub const META_BUILT_AT: &str = "tagshift.built_at";
    /// Schema metadata key: tag prefix the corpus was indexed with.
    pub const META_PREFIX: &str = "tagshift.prefix";

    /// Nullable provenance columns, in schema order.
    pub const PROVENANCE_COLUMNS: [&str; 7] = [
        "title",
        "component_name",
        "description",
        "tags",
        "source",
        "created_by",
        "created_at",
    ];

    /// Item field of the embedding list.
    pub fn embedding_item() -> Arc<Field> {
        Arc::new(Field::new("item", DataType::Float32, true))
    }

    /// Schema for one generation of the migration-example index.
    ///
    /// `attributes` holds the V1 root attributes as a JSON object string.
    pub fn example_index_schema(dim: usize) -> Schema {
        let mut fields = vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("v1", DataType::Utf8, false),
            Field::new("v2", DataType::Utf8, false),
            Field::new("v1_tag", DataType::Utf8, false),
            Field::new("v2_tag", DataType::Utf8, false),
            Field::new("attributes", DataType::Utf8, false),
        ];
        fields.extend(
            PROVENANCE_COLUMNS
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, true)),
        );
        fields.push(Field::new("searchable", DataType::Utf8, false));
        fields.push(Field::new(
            "embedding",
            DataType::FixedSizeList(embedding_item(), dim as i32),
            false,
        ));
        Schema::new(fields)
    }

    /// [`example_index_schema`] with model, dimension and build-time metadata attached.
    pub fn example_index_schema_with_metadata(
        dim: usize,
        model: &str,
        built_at: &str,
        prefix: &str,
    ) -> Schema {
        let metadata = HashMap::from([
            (META_MODEL.to_string(), model.to_string()),
            (META_DIM.to_string(), dim.to_string()),
            (META_BUILT_AT.to_string(), built_at.to_string()),
            (META_PREFIX.to_string(), prefix.to_string()),
        ]);
        example_index_schema(dim).with_metadata(metadata)
    }
}
