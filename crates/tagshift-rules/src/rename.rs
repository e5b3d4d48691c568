//! Name-only tag renaming across markup, stylesheets and scripts.
//!
//! Unlike [`crate::apply`], this touches nothing but tag names, so it also
//! works on CSS selectors (`helix-a > p`) and script strings
//! (`querySelector("helix-a")`).

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::store::RuleStore;

/// V1 tag name → V2 tag name. V1 names match case-insensitively.
#[derive(Debug, Clone)]
pub struct TagMapper {
    names: BTreeMap<String, String>,
    pattern: Option<Regex>,
}

/// Body, CSS and JS of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAssets {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
}

impl TagMapper {
    pub fn new<I, K, V>(pairs: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let names: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
            .filter(|(k, v)| !k.is_empty() && !k.eq_ignore_ascii_case(v))
            .collect();

        let pattern = if names.is_empty() {
            None
        } else {
            // Longest first so `helix-ab` is tried before `helix-a`.
            let mut keys: Vec<&String> = names.keys().collect();
            keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            let alternation = keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!("(?i:{alternation})"))?)
        };
        Ok(Self { names, pattern })
    }

    /// One mapping per rule: V1 tag → rule's `new_tag`.
    pub fn from_rules(rules: &RuleStore) -> Result<Self, regex::Error> {
        Self::new(rules.iter().map(|(tag, rule)| (tag, rule.new_tag.as_str())))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, v1: &str) -> Option<&str> {
        self.names.get(&v1.to_ascii_lowercase()).map(String::as_str)
    }

    /// Replace whole-name occurrences of every mapped tag in `text`.
    pub fn rename(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for m in pattern.find_iter(text) {
            let before_ok = m.start() == 0 || !is_name_byte(bytes[m.start() - 1]);
            let after_ok = bytes.get(m.end()).is_none_or(|&b| !is_name_byte(b));
            if !(before_ok && after_ok) {
                continue;
            }
            if let Some(target) = self.names.get(&m.as_str().to_ascii_lowercase()) {
                out.push_str(&text[cursor..m.start()]);
                out.push_str(target);
                cursor = m.end();
            }
        }
        out.push_str(&text[cursor..]);
        out
    }

    pub fn rename_assets(&self, assets: &PageAssets) -> PageAssets {
        PageAssets {
            body: self.rename(&assets.body),
            css: self.rename(&assets.css),
            js: self.rename(&assets.js),
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_whole_names_only() {
        let mapper = TagMapper::new([("helix-a", "helix-core-a")]).unwrap();
        assert_eq!(
            mapper.rename("<helix-a></helix-a><helix-ab></helix-ab> my-helix-a"),
            "<helix-core-a></helix-core-a><helix-ab></helix-ab> my-helix-a"
        );
    }

    #[test]
    fn names_match_regardless_of_case() {
        let mapper = TagMapper::new([("Helix-A", "helix-core-a")]).unwrap();
        assert_eq!(mapper.get("HELIX-A"), Some("helix-core-a"));
        assert_eq!(
            mapper.rename("<HELIX-A></Helix-a> HELIX-A > p"),
            "<helix-core-a></helix-core-a> helix-core-a > p"
        );
        assert_eq!(mapper.rename("<HELIX-AB>"), "<HELIX-AB>");
    }

    #[test]
    fn longest_name_wins() {
        let mapper =
            TagMapper::new([("helix-a", "x-a"), ("helix-ab", "x-ab")]).unwrap();
        assert_eq!(mapper.rename("helix-ab helix-a"), "x-ab x-a");
    }

    #[test]
    fn renames_css_and_js() {
        let mapper = TagMapper::new([("helix-card", "helix-core-card")]).unwrap();
        let assets = PageAssets {
            body: "<helix-card>x</helix-card>".into(),
            css: "helix-card > p { color: red }".into(),
            js: "document.querySelector('helix-card')".into(),
        };
        let out = mapper.rename_assets(&assets);
        assert_eq!(out.body, "<helix-core-card>x</helix-core-card>");
        assert_eq!(out.css, "helix-core-card > p { color: red }");
        assert_eq!(out.js, "document.querySelector('helix-core-card')");
    }

    #[test]
    fn empty_mapper_is_identity() {
        let mapper = TagMapper::new(Vec::<(String, String)>::new()).unwrap();
        assert!(mapper.is_empty());
        assert_eq!(mapper.rename("<helix-a>"), "<helix-a>");
    }

    #[test]
    fn identity_pairs_are_dropped() {
        let mapper = TagMapper::new([("helix-a", "helix-a"), ("helix-b", "helix-c")]).unwrap();
        assert_eq!(mapper.len(), 1);
        assert_eq!(mapper.get("helix-b"), Some("helix-c"));
    }

    #[test]
    fn built_from_rules() {
        use tagshift_core::{MigrationExample, TagFamily};
        let family = TagFamily::default();
        let examples = vec![MigrationExample::from_pair(
            "0",
            "<helix-a></helix-a>",
            "<helix-core-a></helix-core-a>",
            &family,
        )];
        let rules = RuleStore::synthesize(&examples, &family);
        let mapper = TagMapper::from_rules(&rules).unwrap();
        assert_eq!(mapper.rename("helix-a, .helix-a-x {}"), "helix-core-a, .helix-a-x {}");
    }
}
