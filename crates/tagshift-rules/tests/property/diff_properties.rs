use std::collections::BTreeMap;

use proptest::prelude::*;
use tagshift_core::{MigrationExample, TagFamily};
use tagshift_rules::{RuleStore, apply_rules, diff_pair};

fn attrs() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-e]", "[xyz]{0,2}", 0..5)
}

fn render(tag: &str, attrs: &BTreeMap<String, String>, body: &str) -> String {
    let rendered: String = attrs
        .iter()
        .map(|(k, v)| format!(" {k}=\"{v}\""))
        .collect();
    format!("<{tag}{rendered}>{body}</{tag}>")
}

proptest! {
    #[test]
    fn every_v1_attribute_is_classified_once(old in attrs(), new in attrs()) {
        let v1 = render("helix-a", &old, "t");
        let v2 = render("helix-core-a", &new, "t");
        let d = diff_pair(&v1, &v2, &TagFamily::default());

        for name in d.added.keys() {
            prop_assert!(!d.removed.contains(name));
            prop_assert!(!old.contains_key(name));
        }
        for name in old.keys() {
            let hits = [
                d.removed.contains(name),
                d.modified.contains_key(name),
                d.preserved.contains_key(name),
            ]
            .iter()
            .filter(|hit| **hit)
            .count();
            prop_assert_eq!(hits, 1, "{} classified {} times", name, hits);
        }
        prop_assert_eq!(d.added.len() + d.modified.len() + d.preserved.len(), new.len());
    }

    #[test]
    fn renames_pair_removed_with_added(old in attrs(), new in attrs()) {
        let v1 = render("helix-a", &old, "");
        let v2 = render("helix-core-a", &new, "");
        let d = diff_pair(&v1, &v2, &TagFamily::default());
        let mut targets = Vec::new();
        for (from, to) in &d.renamed {
            prop_assert!(d.removed.contains(from));
            prop_assert_eq!(&d.added[to], &old[from]);
            prop_assert!(!targets.contains(&to));
            targets.push(to);
        }
    }

    #[test]
    fn applying_a_rule_to_its_own_v1_yields_v2_attributes(old in attrs(), new in attrs()) {
        let family = TagFamily::default();
        let v1 = render("helix-a", &old, "t");
        let v2 = render("helix-core-a", &new, "t");
        let example = MigrationExample::from_pair("0", &v1, &v2, &family);
        let rules = RuleStore::synthesize(&[example], &family);
        let applied = apply_rules(&v1, |t| rules.get(t));
        let root = family.root(&applied.text).unwrap();
        prop_assert_eq!(root.name.as_str(), "helix-core-a");
        // Renamed values travel with the rename; everything else matches V2.
        prop_assert_eq!(root.attribute_map(), new);
    }
}
