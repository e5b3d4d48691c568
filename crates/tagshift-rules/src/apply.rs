//! Deterministic rewrite of markup with transformation rules.
//!
//! Every start and close tag whose name has a rule is rewritten in place;
//! everything else, including comments, is copied through byte for byte.

use tagshift_core::markup::{Attribute, StartTag, close_tag_at, comment_end, parse_start_tag};

use crate::store::TransformationRule;

/// Result of [`apply_rules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub text: String,
    /// Number of start tags rewritten.
    pub rewritten: usize,
}

impl Applied {
    pub fn changed(&self) -> bool {
        self.rewritten > 0
    }
}

/// Rewrite every element of `text` whose tag `lookup` has a rule for.
pub fn apply_rules<'r, F>(text: &str, lookup: F) -> Applied
where
    F: Fn(&str) -> Option<&'r TransformationRule>,
{
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut rewritten = 0;
    let mut cursor = 0;
    let mut pos = 0;

    while let Some(rel) = text[pos..].find('<') {
        let lt = pos + rel;

        if let Some(end) = comment_end(text, lt) {
            pos = end;
            continue;
        }

        if let Some((name, end)) = close_tag_at(text, lt) {
            if let Some(rule) = lookup(&name) {
                out.push_str(&text[cursor..lt]);
                out.push_str("</");
                out.push_str(&rule.new_tag);
                out.push('>');
                cursor = end;
            }
            pos = end;
            continue;
        }

        match parse_start_tag(text, lt) {
            Some(tag) => {
                if let Some(rule) = lookup(&tag.name) {
                    out.push_str(&text[cursor..lt]);
                    out.push_str(&rewrite_start_tag(&tag, rule));
                    cursor = tag.end;
                    rewritten += 1;
                }
                pos = tag.end;
            }
            None => pos = lt + 1,
        }
    }
    out.push_str(&text[cursor..]);

    Applied {
        text: out,
        rewritten,
    }
}

/// Render `tag` under `rule`.
///
/// Renamed attributes keep their value under the new name, removed ones are
/// dropped, and modified ones take the new value when the current value is
/// the one the rule saw. Added attributes are appended unless already present.
pub fn rewrite_start_tag(tag: &StartTag, rule: &TransformationRule) -> String {
    let mut attrs: Vec<Attribute> = Vec::with_capacity(tag.attributes.len());

    for attr in &tag.attributes {
        if let Some(target) = rule.renamed_attributes.get(&attr.name) {
            attrs.push(Attribute {
                name: target.clone(),
                value: attr.value.clone(),
            });
        } else if rule.removed_attributes.contains(&attr.name) {
            continue;
        } else if let Some(change) = rule.modified_attributes.get(&attr.name)
            && attr.value.as_deref().unwrap_or("") == change.old
        {
            attrs.push(Attribute {
                name: attr.name.clone(),
                value: Some(change.new.clone()),
            });
        } else {
            attrs.push(attr.clone());
        }
    }

    for (name, value) in rule.new_attributes() {
        if !attrs.iter().any(|a| &a.name == name) {
            attrs.push(Attribute {
                name: name.clone(),
                value: Some(value.clone()),
            });
        }
    }

    render_start_tag(&rule.new_tag, &attrs, tag.self_closing)
}

pub fn render_start_tag(name: &str, attrs: &[Attribute], self_closing: bool) -> String {
    let mut out = String::with_capacity(name.len() + 2 + attrs.len() * 16);
    out.push('<');
    out.push_str(name);
    for attr in attrs {
        out.push(' ');
        out.push_str(&attr.name);
        if let Some(value) = &attr.value {
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
    }
    out.push_str(if self_closing { "/>" } else { ">" });
    out
}

fn escape_attr(value: &str) -> String {
    value.replace('"', "&quot;")
}
