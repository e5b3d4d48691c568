//! Structural diff of one V1/V2 example pair.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tagshift_core::TagFamily;
use tagshift_core::markup::{StartTag, bound_element, scan_start_tags};

/// An attribute present on both sides with different values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub old: String,
    pub new: String,
}

/// Nested tag names inside the root element, before and after.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedChanges {
    pub old_nested: Vec<String>,
    pub new_nested: Vec<String>,
    pub old_other: Vec<String>,
    pub new_other: Vec<String>,
}

/// Root rename, attribute delta and nested-content delta of one pair.
///
/// Every V1 root attribute lands in exactly one of `removed`, `modified` or
/// `preserved`; every V2-only attribute lands in `added`. `renamed` is derived
/// from the other two and does not take attributes out of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeDiff {
    pub old_tag: Option<String>,
    pub new_tag: Option<String>,
    pub added: BTreeMap<String, String>,
    pub removed: BTreeSet<String>,
    pub modified: BTreeMap<String, AttributeChange>,
    pub preserved: BTreeMap<String, String>,
    /// Removed attribute → added attribute carrying the same value.
    pub renamed: BTreeMap<String, String>,
    pub nested: Option<NestedChanges>,
}

impl AttributeDiff {
    /// Both roots were found, so the diff can seed a rule.
    pub fn is_complete(&self) -> bool {
        self.old_tag.is_some() && self.new_tag.is_some()
    }
}

/// Diff the root elements of `v1` and `v2`.
///
/// The root on each side is the first start tag of the family. A side with no
/// root contributes no attributes and no nested content; the result is a
/// partial diff rather than an error.
pub fn diff_pair(v1: &str, v2: &str, family: &TagFamily) -> AttributeDiff {
    let old_root = family.root(v1);
    let new_root = family.root(v2);

    let old_attrs = old_root
        .as_ref()
        .map(StartTag::attribute_map)
        .unwrap_or_default();
    let new_attrs = new_root
        .as_ref()
        .map(StartTag::attribute_map)
        .unwrap_or_default();

    let mut diff = AttributeDiff {
        old_tag: old_root.as_ref().map(|t| t.name.clone()),
        new_tag: new_root.as_ref().map(|t| t.name.clone()),
        ..Default::default()
    };

    for (name, value) in &new_attrs {
        match old_attrs.get(name) {
            None => {
                diff.added.insert(name.clone(), value.clone());
            }
            Some(old) if old != value => {
                diff.modified.insert(
                    name.clone(),
                    AttributeChange {
                        old: old.clone(),
                        new: value.clone(),
                    },
                );
            }
            Some(_) => {
                diff.preserved.insert(name.clone(), value.clone());
            }
        }
    }
    for name in old_attrs.keys() {
        if !new_attrs.contains_key(name) {
            diff.removed.insert(name.clone());
        }
    }

    diff.renamed = detect_renames(&old_attrs, &diff.removed, &diff.added);

    if let (Some(old), Some(new)) = (&old_root, &new_root) {
        diff.nested = nested_changes(v1, old, v2, new, family);
    }
    diff
}

/// A removed attribute is a rename when its non-empty value appears under
/// exactly one added attribute not already claimed.
fn detect_renames(
    old_attrs: &BTreeMap<String, String>,
    removed: &BTreeSet<String>,
    added: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut renamed = BTreeMap::new();
    let mut claimed = BTreeSet::new();
    for name in removed {
        let Some(value) = old_attrs.get(name).filter(|v| !v.is_empty()) else {
            continue;
        };
        let mut candidates = added
            .iter()
            .filter(|(_, v)| *v == value)
            .map(|(k, _)| k);
        if let (Some(target), None) = (candidates.next(), candidates.next())
            && claimed.insert(target.clone())
        {
            renamed.insert(name.clone(), target.clone());
        }
    }
    renamed
}

fn nested_changes(
    v1: &str,
    old_root: &StartTag,
    v2: &str,
    new_root: &StartTag,
    family: &TagFamily,
) -> Option<NestedChanges> {
    let old_inner = bound_element(v1, old_root.start, &old_root.name)
        .inner(v1)
        .trim();
    let new_inner = bound_element(v2, new_root.start, &new_root.name)
        .inner(v2)
        .trim();
    if old_inner == new_inner {
        return None;
    }

    let (old_nested, old_other) = split_tags(old_inner, family);
    let (new_nested, new_other) = split_tags(new_inner, family);
    if old_nested == new_nested && old_other == new_other {
        return None;
    }
    Some(NestedChanges {
        old_nested,
        new_nested,
        old_other,
        new_other,
    })
}

/// Family tag names and other tag names, each in document order.
fn split_tags(content: &str, family: &TagFamily) -> (Vec<String>, Vec<String>) {
    scan_start_tags(content)
        .into_iter()
        .map(|t| t.name)
        .partition(|name| family.contains(name))
}
