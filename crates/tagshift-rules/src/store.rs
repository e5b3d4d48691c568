//! Transformation rules synthesized from an example corpus.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tagshift_core::{MigrationExample, TagFamily};
use thiserror::Error;
use tracing::{info, warn};

use crate::diff::{AttributeChange, AttributeDiff, NestedChanges, diff_pair};

/// Most citations kept per rule.
pub const MAX_RULE_EXAMPLES: usize = 5;
/// Characters kept of each cited markup side before `...`.
pub const EXAMPLE_TRUNCATE_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule for {tag} has an empty new_tag")]
    EmptyTarget { tag: String },
}

/// A truncated example pair cited by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleExample {
    pub old: String,
    pub new: String,
}

/// How one V1 tag becomes its V2 counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationRule {
    pub new_tag: String,
    #[serde(default)]
    pub added_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub removed_attributes: BTreeSet<String>,
    #[serde(default)]
    pub modified_attributes: BTreeMap<String, AttributeChange>,
    #[serde(default)]
    pub preserved_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub renamed_attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_element_changes: Option<NestedChanges>,
    #[serde(default)]
    pub examples: Vec<RuleExample>,
}

impl TransformationRule {
    /// Seed a rule from a complete diff. Returns `None` for partial diffs.
    pub fn from_diff(diff: AttributeDiff) -> Option<Self> {
        let new_tag = diff.new_tag.filter(|t| !t.is_empty())?;
        diff.old_tag.as_ref()?;
        Some(Self {
            new_tag,
            added_attributes: diff.added,
            removed_attributes: diff.removed,
            modified_attributes: diff.modified,
            preserved_attributes: diff.preserved,
            renamed_attributes: diff.renamed,
            nested_element_changes: diff.nested,
            examples: Vec::new(),
        })
    }

    /// Cite an example pair, up to [`MAX_RULE_EXAMPLES`].
    pub fn cite(&mut self, v1: &str, v2: &str) {
        if self.examples.len() < MAX_RULE_EXAMPLES {
            self.examples.push(RuleExample {
                old: truncate(v1),
                new: truncate(v2),
            });
        }
    }

    /// Names this rule introduces as new attributes (renames excluded).
    pub fn new_attributes(&self) -> impl Iterator<Item = (&String, &String)> {
        let targets: BTreeSet<&String> = self.renamed_attributes.values().collect();
        self.added_attributes
            .iter()
            .filter(move |(name, _)| !targets.contains(name))
    }
}

fn truncate(markup: &str) -> String {
    match markup.char_indices().nth(EXAMPLE_TRUNCATE_CHARS) {
        Some((cut, _)) => format!("{}...", &markup[..cut]),
        None => markup.to_string(),
    }
}

/// V1 tag → rule, for one corpus generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleStore {
    rules: HashMap<String, TransformationRule>,
}

/// Counts from one synthesis pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisSummary {
    pub examples: usize,
    pub skipped: usize,
    pub rules: usize,
}

impl RuleStore {
    /// Diff every example and key the result by V1 tag.
    ///
    /// The first complete diff for a tag establishes its rule; later examples
    /// for the same tag are only cited. Examples missing a root on either
    /// side are skipped.
    pub fn synthesize(examples: &[MigrationExample], family: &TagFamily) -> Self {
        Self::synthesize_with_summary(examples, family).0
    }

    pub fn synthesize_with_summary(
        examples: &[MigrationExample],
        family: &TagFamily,
    ) -> (Self, SynthesisSummary) {
        let mut rules: HashMap<String, TransformationRule> = HashMap::new();
        let mut skipped = 0;

        for example in examples {
            let diff = diff_pair(&example.v1_markup, &example.v2_markup, family);
            let Some(old_tag) = diff.old_tag.clone() else {
                warn!(id = %example.id, "skipping example: no V1 root element");
                skipped += 1;
                continue;
            };
            if let Some(rule) = rules.get_mut(&old_tag) {
                if diff.new_tag.is_none() {
                    warn!(id = %example.id, tag = %old_tag, "skipping example: no V2 root element");
                    skipped += 1;
                    continue;
                }
                rule.cite(&example.v1_markup, &example.v2_markup);
                continue;
            }
            let Some(mut rule) = TransformationRule::from_diff(diff) else {
                warn!(id = %example.id, tag = %old_tag, "skipping example: no V2 root element");
                skipped += 1;
                continue;
            };
            rule.cite(&example.v1_markup, &example.v2_markup);
            rules.insert(old_tag, rule);
        }

        let summary = SynthesisSummary {
            examples: examples.len(),
            skipped,
            rules: rules.len(),
        };
        info!(
            examples = summary.examples,
            skipped = summary.skipped,
            rules = summary.rules,
            "synthesized transformation rules"
        );
        (Self { rules }, summary)
    }

    pub fn get(&self, tag: &str) -> Option<&TransformationRule> {
        self.rules.get(tag)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// V1 tags with a rule, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Rules ordered by V1 tag.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TransformationRule)> {
        self.tags().into_iter().filter_map(|t| Some((t, self.rules.get(t)?)))
    }

    /// Pretty JSON in the rule export shape (`{tag: rule}`), keys sorted.
    pub fn to_json(&self) -> Result<String, RuleError> {
        let sorted: BTreeMap<&String, &TransformationRule> = self.rules.iter().collect();
        Ok(serde_json::to_string_pretty(&sorted)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        let rules: HashMap<String, TransformationRule> = serde_json::from_str(json)?;
        if let Some((tag, _)) = rules.iter().find(|(_, r)| r.new_tag.trim().is_empty()) {
            return Err(RuleError::EmptyTarget { tag: tag.clone() });
        }
        let rules = rules
            .into_iter()
            .map(|(tag, rule)| (tag.to_ascii_lowercase(), rule))
            .collect();
        Ok(Self { rules })
    }

    pub fn save(&self, path: &Path) -> Result<(), RuleError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, RuleError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(id: &str, v1: &str, v2: &str) -> MigrationExample {
        MigrationExample::from_pair(id, v1, v2, &TagFamily::default())
    }

    #[test]
    fn first_example_wins_later_ones_cite() {
        let examples = vec![
            example("0", r#"<helix-a x="1"></helix-a>"#, r#"<helix-core-a y="1"></helix-core-a>"#),
            example("1", r#"<helix-a x="2"></helix-a>"#, r#"<helix-other-a></helix-other-a>"#),
        ];
        let store = RuleStore::synthesize(&examples, &TagFamily::default());
        let rule = store.get("helix-a").unwrap();
        assert_eq!(rule.new_tag, "helix-core-a");
        assert_eq!(rule.renamed_attributes["x"], "y");
        assert_eq!(rule.examples.len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn skips_examples_without_roots() {
        let examples = vec![
            example("0", "<div>plain</div>", "<helix-b></helix-b>"),
            example("1", "<helix-a></helix-a>", "<div></div>"),
            example("2", "<helix-c></helix-c>", "<helix-core-c></helix-core-c>"),
        ];
        let (store, summary) =
            RuleStore::synthesize_with_summary(&examples, &TagFamily::default());
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.rules, 1);
        assert!(store.get("helix-a").is_none());
        assert_eq!(store.tags(), vec!["helix-c"]);
    }

    #[test]
    fn citations_are_bounded_and_truncated() {
        let long = format!("<helix-a>{}</helix-a>", "é".repeat(150));
        let examples: Vec<_> = (0..8)
            .map(|i| example(&i.to_string(), &long, "<helix-b></helix-b>"))
            .collect();
        let store = RuleStore::synthesize(&examples, &TagFamily::default());
        let rule = store.get("helix-a").unwrap();
        assert_eq!(rule.examples.len(), MAX_RULE_EXAMPLES);
        let cited = &rule.examples[0].old;
        assert!(cited.ends_with("..."));
        assert_eq!(cited.chars().count(), EXAMPLE_TRUNCATE_CHARS + 3);
        assert_eq!(rule.examples[0].new, "<helix-b></helix-b>");
    }

    #[test]
    fn new_attributes_excludes_rename_targets() {
        let examples = vec![example(
            "0",
            r#"<helix-a src="p.png"></helix-a>"#,
            r#"<helix-b source="p.png" loading="lazy"></helix-b>"#,
        )];
        let store = RuleStore::synthesize(&examples, &TagFamily::default());
        let rule = store.get("helix-a").unwrap();
        let added: Vec<_> = rule.new_attributes().map(|(k, _)| k.as_str()).collect();
        assert_eq!(added, vec!["loading"]);
    }

    #[test]
    fn json_export_import() {
        let examples = vec![example(
            "0",
            r#"<helix-a id="1" role="x"></helix-a>"#,
            r#"<helix-core-a role="y"></helix-core-a>"#,
        )];
        let store = RuleStore::synthesize(&examples, &TagFamily::default());
        let json = store.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let rule = &value["helix-a"];
        assert_eq!(rule["new_tag"], "helix-core-a");
        assert_eq!(rule["removed_attributes"][0], "id");
        assert_eq!(rule["modified_attributes"]["role"]["new"], "y");
        assert!(rule["examples"].is_array());

        let restored = RuleStore::from_json(&json).unwrap();
        assert_eq!(restored, store);
    }

    #[test]
    fn import_rejects_empty_target() {
        let err = RuleStore::from_json(r#"{"helix-a": {"new_tag": ""}}"#).unwrap_err();
        assert!(matches!(err, RuleError::EmptyTarget { .. }));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let examples = vec![example("0", "<helix-a></helix-a>", "<helix-b></helix-b>")];
        let store = RuleStore::synthesize(&examples, &TagFamily::default());
        store.save(&path).unwrap();
        assert_eq!(RuleStore::load(&path).unwrap(), store);
    }
}
