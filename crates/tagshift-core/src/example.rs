//! Known V1 → V2 migration pairs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::markup::{StartTag, TagFamily, scan_start_tags};

/// One known V1 → V2 migration pair.
///
/// Built by corpus ingestion and never mutated afterwards; re-ingesting a
/// corpus produces new examples rather than patching old ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationExample {
    pub id: String,
    pub v1_markup: String,
    pub v2_markup: String,
    /// Root tag of `v1_markup` (empty if none could be found).
    pub v1_tag: String,
    /// Root tag of `v2_markup` (empty if none could be found).
    pub v2_tag: String,
    /// Attributes of the V1 root element.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form labels, as entered (usually comma separated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// ISO 8601 timestamp string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl MigrationExample {
    /// Build an example from a raw pair, deriving root tags and V1 root attributes.
    ///
    /// Markup is trimmed. The root is the first family element; markup with no
    /// family element falls back to its first start tag of any name.
    pub fn from_pair(id: impl Into<String>, v1: &str, v2: &str, family: &TagFamily) -> Self {
        let v1 = v1.trim();
        let v2 = v2.trim();
        let v1_root = root_element(v1, family);
        let v2_root = root_element(v2, family);

        Self {
            id: id.into(),
            v1_markup: v1.to_string(),
            v2_markup: v2.to_string(),
            v1_tag: v1_root.as_ref().map(|t| t.name.clone()).unwrap_or_default(),
            v2_tag: v2_root.as_ref().map(|t| t.name.clone()).unwrap_or_default(),
            attributes: v1_root.map(|t| t.attribute_map()).unwrap_or_default(),
            title: None,
            component_name: None,
            description: None,
            tags: None,
            source: None,
            created_by: None,
            created_at: None,
        }
    }

    /// Component name for display and search: explicit name, else the V1 tag.
    pub fn component(&self) -> &str {
        self.component_name.as_deref().unwrap_or(&self.v1_tag)
    }
}

fn root_element(markup: &str, family: &TagFamily) -> Option<StartTag> {
    family
        .root(markup)
        .or_else(|| scan_start_tags(markup).into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_tags_and_root_attributes() {
        let family = TagFamily::default();
        let ex = MigrationExample::from_pair(
            "7",
            r#" <helix-image src="a.png" alt="A"><helix-caption lang="en">c</helix-caption></helix-image> "#,
            r#"<helix-core-image source="a.png" alt="A"></helix-core-image>"#,
            &family,
        );
        assert_eq!(ex.id, "7");
        assert_eq!(ex.v1_tag, "helix-image");
        assert_eq!(ex.v2_tag, "helix-core-image");
        assert_eq!(ex.attributes.len(), 2);
        assert_eq!(ex.attributes["src"], "a.png");
        assert!(!ex.attributes.contains_key("lang"));
        assert!(ex.v1_markup.starts_with("<helix-image"));
    }

    #[test]
    fn falls_back_to_any_root_tag() {
        let family = TagFamily::default();
        let ex = MigrationExample::from_pair("1", "<div id=\"x\">a</div>", "plain text", &family);
        assert_eq!(ex.v1_tag, "div");
        assert_eq!(ex.v2_tag, "");
        assert_eq!(ex.attributes["id"], "x");
    }

    #[test]
    fn component_prefers_explicit_name() {
        let family = TagFamily::default();
        let mut ex = MigrationExample::from_pair("1", "<helix-a></helix-a>", "<helix-b></helix-b>", &family);
        assert_eq!(ex.component(), "helix-a");
        ex.component_name = Some("Hero banner".into());
        assert_eq!(ex.component(), "Hero banner");
    }

    #[test]
    fn json_roundtrip_skips_empty_metadata() {
        let family = TagFamily::default();
        let ex = MigrationExample::from_pair("1", "<helix-a x=\"1\"></helix-a>", "<helix-b></helix-b>", &family);
        let json = serde_json::to_string(&ex).unwrap();
        assert!(!json.contains("title"));
        let parsed: MigrationExample = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ex);
    }
}
