//! Retrieval and migration result records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One nearest-neighbour hit from the similarity index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub id: String,
    pub v1: String,
    pub v2: String,
    pub v1_component: String,
    pub v2_component: String,
    /// Cosine similarity clamped to [0, 1]; 1 means identical text.
    pub similarity_score: f32,
    pub attribute_count: usize,
}

/// How a migration suggestion was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Every tag had a synthesized rule; no generation call.
    RuleOnly,
    /// Retrieved examples (and rules derived from them) only.
    RetrievalOnly,
    /// Generation was invoked and produced at least one span.
    RetrievalPlusGeneration,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleOnly => "rule_only",
            Self::RetrievalOnly => "retrieval_only",
            Self::RetrievalPlusGeneration => "retrieval_plus_generation",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one migration run. Created per call, never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub input_v1: String,
    /// `None` when no rule, retrieval, or generation changed the input.
    pub suggested_v2: Option<String>,
    pub confidence_score: f32,
    pub method: Method,
    pub similar_examples: Vec<RetrievalRecord>,
}

impl MigrationResult {
    /// A no-match result: nothing suggested, zero confidence.
    pub fn unmigrated(input: &str, similar_examples: Vec<RetrievalRecord>) -> Self {
        Self {
            input_v1: input.to_string(),
            suggested_v2: None,
            confidence_score: 0.0,
            method: Method::RetrievalOnly,
            similar_examples,
        }
    }

    /// The suggested V2 markup, or the untouched input when there is none.
    pub fn output(&self) -> &str {
        self.suggested_v2.as_deref().unwrap_or(&self.input_v1)
    }

    /// Best similarity among the retrieved examples (0 if none).
    pub fn best_similarity(&self) -> f32 {
        self.similar_examples
            .first()
            .map_or(0.0, |r| r.similarity_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_serializes_snake_case() {
        let json = serde_json::to_string(&Method::RetrievalPlusGeneration).unwrap();
        assert_eq!(json, "\"retrieval_plus_generation\"");
        let parsed: Method = serde_json::from_str("\"rule_only\"").unwrap();
        assert_eq!(parsed, Method::RuleOnly);
        assert_eq!(Method::RetrievalOnly.to_string(), "retrieval_only");
    }

    #[test]
    fn unmigrated_result_outputs_input() {
        let result = MigrationResult::unmigrated("<helix-x></helix-x>", vec![]);
        assert_eq!(result.output(), "<helix-x></helix-x>");
        assert_eq!(result.confidence_score, 0.0);
        assert_eq!(result.best_similarity(), 0.0);
    }

    #[test]
    fn result_json_shape() {
        let result = MigrationResult {
            input_v1: "<helix-a></helix-a>".into(),
            suggested_v2: Some("<helix-core-a></helix-core-a>".into()),
            confidence_score: 0.75,
            method: Method::RetrievalOnly,
            similar_examples: vec![RetrievalRecord {
                id: "migration_0_1a2b3c4d".into(),
                v1: "<helix-a></helix-a>".into(),
                v2: "<helix-core-a></helix-core-a>".into(),
                v1_component: "helix-a".into(),
                v2_component: "helix-core-a".into(),
                similarity_score: 0.75,
                attribute_count: 0,
            }],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["method"], "retrieval_only");
        assert_eq!(value["similar_examples"][0]["v2_component"], "helix-core-a");
        assert!(value["suggested_v2"].is_string());
    }
}
