//! Generation prompt assembly.

use std::fmt::Write;

use tagshift_core::RetrievalRecord;
use tagshift_rules::TransformationRule;

// ── Prompt templates ──

pub const SYSTEM_PROMPT: &str = "\
You are a precise HTML migration tool. Return ONLY the migrated HTML content, \
with no explanation, no commentary and no Markdown fences.";

const OUTPUT_INSTRUCTIONS: &str = "\
CRITICAL OUTPUT INSTRUCTIONS:
- Return ONLY the migrated HTML content
- Do NOT include explanatory text, comments, or phrases like 'Here is the updated content'
- Output must be valid, well-formed HTML
- Preserve exact spacing and formatting where possible
";

const UNIVERSAL_RULES: &str = "\
UNIVERSAL ATTRIBUTE RULES:
- id attributes: Preserve exactly as they are unless a rule renames them
- src, href, alt, title attributes: Preserve values unchanged
- Custom data-* attributes: Preserve unless explicitly removed

STRUCTURAL PRESERVATION:
- Maintain original nesting and hierarchy
- Keep all content inside proper parent containers
- Preserve order of elements and attributes where possible

FALLBACK RULES:
- If no specific rule exists for a component, keep its tag name and preserve all attributes
";

// ── Types ──

/// A rule as it appears in a prompt, under the V1 tag it was keyed by.
#[derive(Debug, Clone, Copy)]
pub struct PromptRule<'a> {
    pub old_tag: &'a str,
    pub rule: &'a TransformationRule,
}

// ── Assembly ──

/// Build the generation prompt for one top-level span.
///
/// `examples` are placed in the order given; callers pass the retrieved
/// records they want shown, best first.
pub fn build_prompt(span: &str, rules: &[PromptRule<'_>], examples: &[&RetrievalRecord]) -> String {
    let mut prompt = String::with_capacity(2048 + span.len());
    prompt.push_str(
        "Transform the V1 component markup below to its V2 form with precise attribute handling.\n\n",
    );
    prompt.push_str(OUTPUT_INSTRUCTIONS);

    if !rules.is_empty() {
        prompt.push_str("\nDYNAMIC TRANSFORMATION RULES:\n");
        for r in rules {
            write_rule(&mut prompt, r);
        }
    }

    prompt.push('\n');
    prompt.push_str(UNIVERSAL_RULES);

    if !examples.is_empty() {
        prompt.push_str("\nSIMILAR MIGRATIONS:\n");
        for (n, ex) in examples.iter().enumerate() {
            let _ = write!(
                prompt,
                "\nExample {n} (similarity {score:.2}):\nV1:\n{v1}\nV2:\n{v2}\n",
                n = n + 1,
                score = ex.similarity_score,
                v1 = ex.v1,
                v2 = ex.v2,
            );
        }
    }

    let _ = write!(prompt, "\nCONTENT TO MIGRATE:\n{span}\n\nMIGRATED OUTPUT:");
    prompt
}

fn write_rule(prompt: &mut String, r: &PromptRule<'_>) {
    let rule = r.rule;
    let _ = writeln!(prompt, "\n=== {} → {} ===", r.old_tag, rule.new_tag);
    let _ = writeln!(prompt, "- Transform tag name: '{}' to '{}'", r.old_tag, rule.new_tag);

    let added: Vec<String> = rule
        .new_attributes()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect();
    if !added.is_empty() {
        let _ = writeln!(prompt, "- ADD attributes: {}", added.join(", "));
    }

    let removed: Vec<&str> = rule
        .removed_attributes
        .iter()
        .filter(|name| !rule.renamed_attributes.contains_key(*name))
        .map(String::as_str)
        .collect();
    if !removed.is_empty() {
        let _ = writeln!(prompt, "- REMOVE attributes: {}", removed.join(", "));
    }

    if !rule.modified_attributes.is_empty() {
        let modified: Vec<String> = rule
            .modified_attributes
            .iter()
            .map(|(k, c)| format!("{k}: \"{}\" → \"{}\"", c.old, c.new))
            .collect();
        let _ = writeln!(prompt, "- MODIFY attributes: {}", modified.join(", "));
    }

    if !rule.preserved_attributes.is_empty() {
        let names: Vec<&str> = rule.preserved_attributes.keys().map(String::as_str).collect();
        let _ = writeln!(
            prompt,
            "- PRESERVE attributes (keep values unchanged): {}",
            names.join(", ")
        );
    }

    if !rule.renamed_attributes.is_empty() {
        let renamed: Vec<String> = rule
            .renamed_attributes
            .iter()
            .map(|(old, new)| format!("{old} → {new}"))
            .collect();
        let _ = writeln!(
            prompt,
            "- RENAME attributes (keep their values): {}",
            renamed.join(", ")
        );
    }

    if let Some(nested) = &rule.nested_element_changes {
        if nested.old_nested != nested.new_nested {
            let _ = writeln!(
                prompt,
                "- Transform nested components: [{}] → [{}]",
                nested.old_nested.join(", "),
                nested.new_nested.join(", ")
            );
        }
        if nested.old_other != nested.new_other {
            let _ = writeln!(
                prompt,
                "- Transform nested elements: [{}] → [{}]",
                nested.old_other.join(", "),
                nested.new_other.join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use tagshift_rules::{AttributeChange, NestedChanges};

    fn rule() -> TransformationRule {
        TransformationRule {
            new_tag: "helix-core-a".into(),
            added_attributes: BTreeMap::from([
                ("key".into(), "x".into()),
                ("data-hwc-version".into(), "4.0".into()),
            ]),
            removed_attributes: BTreeSet::from(["id".into(), "legacy".into()]),
            modified_attributes: BTreeMap::from([(
                "size".into(),
                AttributeChange {
                    old: "s".into(),
                    new: "small".into(),
                },
            )]),
            preserved_attributes: BTreeMap::from([("src".into(), "a.png".into())]),
            renamed_attributes: BTreeMap::from([("id".into(), "key".into())]),
            nested_element_changes: Some(NestedChanges {
                old_nested: vec!["helix-b".into()],
                new_nested: vec!["helix-core-b".into()],
                old_other: vec!["p".into()],
                new_other: vec!["p".into()],
            }),
            examples: Vec::new(),
        }
    }

    fn record() -> RetrievalRecord {
        RetrievalRecord {
            id: "3".into(),
            v1: "<helix-a id=\"q\"></helix-a>".into(),
            v2: "<helix-core-a key=\"q\"></helix-core-a>".into(),
            v1_component: "helix-a".into(),
            v2_component: "helix-core-a".into(),
            similarity_score: 0.8125,
            attribute_count: 1,
        }
    }

    #[test]
    fn rule_section_lists_every_delta() {
        let rule = rule();
        let prompt = build_prompt(
            "<helix-a id=\"y\"></helix-a>",
            &[PromptRule {
                old_tag: "helix-a",
                rule: &rule,
            }],
            &[],
        );
        assert!(prompt.contains("=== helix-a → helix-core-a ==="));
        assert!(prompt.contains("- ADD attributes: data-hwc-version=\"4.0\"\n"));
        assert!(prompt.contains("- REMOVE attributes: legacy\n"));
        assert!(prompt.contains("size: \"s\" → \"small\""));
        assert!(prompt.contains("keep values unchanged): src"));
        assert!(prompt.contains("id → key"));
        assert!(prompt.contains("[helix-b] → [helix-core-b]"));
        assert!(!prompt.contains("Transform nested elements"));
        assert!(!prompt.contains("SIMILAR MIGRATIONS"));
    }

    #[test]
    fn span_and_examples_are_placed_last() {
        let rec = record();
        let span = "<helix-a id=\"y\">Z</helix-a>";
        let prompt = build_prompt(span, &[], &[&rec]);
        assert!(prompt.contains("Example 1 (similarity 0.81)"));
        assert!(prompt.contains(&rec.v2));
        assert!(prompt.ends_with(&format!("CONTENT TO MIGRATE:\n{span}\n\nMIGRATED OUTPUT:")));
        assert!(!prompt.contains("DYNAMIC TRANSFORMATION RULES"));
        let universal = prompt.find("UNIVERSAL ATTRIBUTE RULES").unwrap();
        let examples = prompt.find("SIMILAR MIGRATIONS").unwrap();
        assert!(universal < examples);
    }
}
