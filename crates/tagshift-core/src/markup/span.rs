//! Balanced-tag span extraction for custom elements.
//!
//! A DOM tree throws away the exact source text of an element, which is what
//! prompting and re-splicing need. Instead each family start tag is bounded by
//! a forward scan with an explicit depth counter over same-named open/close
//! tags, so `<x-a><x-a></x-a></x-a>` closes at the outer `</x-a>` rather than
//! the first one.

use std::ops::Range;

use super::tag::{TagFamily, close_tag_end, comment_end, opens_tag, parse_start_tag};

/// Byte span of one custom element in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpan {
    /// Offset of the opening `<`.
    pub start: usize,
    /// Offset just past the matching close tag (or end of input if unterminated).
    pub end: usize,
    /// Lowercased tag name.
    pub tag: String,
    /// Content between the start tag and the matching close tag.
    pub content: Range<usize>,
    /// False when no matching close tag was found.
    pub terminated: bool,
}

impl TagSpan {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The element's full source text.
    pub fn text<'a>(&self, doc: &'a str) -> &'a str {
        &doc[self.start..self.end]
    }

    /// Source text between the start tag and close tag.
    pub fn inner<'a>(&self, doc: &'a str) -> &'a str {
        &doc[self.content.clone()]
    }

    /// Whether `other` lies entirely inside this span (and is not this span).
    pub fn contains(&self, other: &TagSpan) -> bool {
        self.start <= other.start && other.end <= self.end && self.range() != other.range()
    }
}

/// Bound the element named `name` whose start tag begins at `at`.
///
/// Never fails: an unparseable start tag or a missing close tag yields a
/// best-effort span running to the end of `text`.
pub fn bound_element(text: &str, at: usize, name: &str) -> TagSpan {
    let Some(open) = parse_start_tag(text, at) else {
        return TagSpan {
            start: at,
            end: text.len(),
            tag: name.to_string(),
            content: text.len()..text.len(),
            terminated: false,
        };
    };

    if open.self_closing {
        return TagSpan {
            start: at,
            end: open.end,
            tag: open.name,
            content: open.end..open.end,
            terminated: true,
        };
    }

    let mut depth = 1usize;
    let mut pos = open.end;
    while let Some(rel) = text[pos..].find('<') {
        let lt = pos + rel;

        if let Some(end) = comment_end(text, lt) {
            pos = end;
            continue;
        }

        if let Some(close_end) = close_tag_end(text, lt, name) {
            depth -= 1;
            if depth == 0 {
                return TagSpan {
                    start: at,
                    end: close_end,
                    tag: open.name,
                    content: open.end..lt,
                    terminated: true,
                };
            }
            pos = close_end;
            continue;
        }

        if opens_tag(text, lt, name) {
            match parse_start_tag(text, lt) {
                Some(nested) => {
                    if !nested.self_closing {
                        depth += 1;
                    }
                    pos = nested.end;
                }
                None => break,
            }
            continue;
        }

        pos = lt + 1;
    }

    TagSpan {
        start: at,
        end: text.len(),
        tag: open.name,
        content: open.end..text.len(),
        terminated: false,
    }
}

/// Spans for every family element in `text`, nested ones included, in start order.
pub fn extract_spans(text: &str, family: &TagFamily) -> Vec<TagSpan> {
    family
        .open_tags(text)
        .into_iter()
        .map(|(at, name)| bound_element(text, at, &name))
        .collect()
}

/// Spans of the topmost family elements only.
///
/// Start tags are visited in document order; one that begins inside an
/// already accepted span is nested (or overlaps a malformed sibling) and is
/// skipped without being bounded. The result is the same as bounding every
/// element and discarding contained spans, and the returned spans never
/// overlap, so they can be spliced independently.
pub fn topmost_spans(text: &str, family: &TagFamily) -> Vec<TagSpan> {
    let mut spans: Vec<TagSpan> = Vec::new();
    for (at, name) in family.open_tags(text) {
        if spans.last().is_some_and(|outer| at < outer.end) {
            continue;
        }
        spans.push(bound_element(text, at, &name));
    }
    spans
}

/// Replace non-overlapping ranges of `doc`, leaving all other bytes untouched.
///
/// `replacements` must be sorted by start offset.
pub fn splice(doc: &str, replacements: &[(Range<usize>, String)]) -> String {
    let mut out = String::with_capacity(doc.len());
    let mut cursor = 0;
    for (range, text) in replacements {
        out.push_str(&doc[cursor..range.start]);
        out.push_str(text);
        cursor = range.end;
    }
    out.push_str(&doc[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family() -> TagFamily {
        TagFamily::new("helix-").unwrap()
    }

    #[test]
    fn nested_same_name_closes_at_outer_tag() {
        let doc = "<helix-box id=\"o\"><helix-box id=\"i\">x</helix-box>tail</helix-box>";
        let spans = topmost_spans(doc, &family());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text(doc), doc);
        assert_eq!(
            spans[0].inner(doc),
            "<helix-box id=\"i\">x</helix-box>tail"
        );
        assert!(spans[0].terminated);
    }

    #[test]
    fn all_spans_include_nested_elements() {
        let doc = "<helix-box><helix-box>x</helix-box></helix-box>";
        let spans = extract_spans(doc, &family());
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].text(doc), "<helix-box>x</helix-box>");
        assert!(spans[0].contains(&spans[1]));
        assert!(!spans[1].contains(&spans[0]));
    }

    #[test]
    fn nested_different_family_tags_are_not_topmost() {
        let doc = "<p>a</p><helix-card><helix-text>t</helix-text></helix-card> <helix-image src=\"x\"></helix-image>";
        let spans = topmost_spans(doc, &family());
        let tags: Vec<_> = spans.iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(tags, vec!["helix-card", "helix-image"]);
        assert_eq!(
            spans[0].text(doc),
            "<helix-card><helix-text>t</helix-text></helix-card>"
        );
    }

    #[test]
    fn self_closing_is_immediately_closed() {
        let doc = "<helix-icon name=\"a\"/><helix-icon name=\"b\" />";
        let spans = topmost_spans(doc, &family());
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text(doc), "<helix-icon name=\"a\"/>");
        assert!(spans[0].content.is_empty());
    }

    #[test]
    fn self_closing_nested_does_not_change_depth() {
        let doc = "<helix-a><helix-a/></helix-a>after";
        let spans = topmost_spans(doc, &family());
        assert_eq!(spans[0].text(doc), "<helix-a><helix-a/></helix-a>");
    }

    #[test]
    fn unterminated_element_runs_to_end() {
        let doc = "<helix-a><span>never closed";
        let spans = topmost_spans(doc, &family());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].end, doc.len());
        assert!(!spans[0].terminated);
    }

    #[test]
    fn unterminated_start_tag_runs_to_end() {
        let doc = "ok <helix-a id=\"x";
        let spans = topmost_spans(doc, &family());
        assert_eq!(spans[0].start, 3);
        assert_eq!(spans[0].end, doc.len());
        assert!(!spans[0].terminated);
    }

    #[test]
    fn close_tag_of_longer_name_is_not_a_match() {
        let doc = "<helix-a><helix-ab></helix-ab></helix-a>";
        let spans = topmost_spans(doc, &family());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text(doc), doc);
    }

    #[test]
    fn close_tags_are_case_insensitive() {
        let doc = "<Helix-A>x</HELIX-a>rest";
        let spans = topmost_spans(doc, &family());
        assert_eq!(spans[0].text(doc), "<Helix-A>x</HELIX-a>");
        assert_eq!(spans[0].tag, "helix-a");
    }

    #[test]
    fn commented_close_tag_is_ignored() {
        let doc = "<helix-a><!-- </helix-a> -->x</helix-a>";
        let spans = topmost_spans(doc, &family());
        assert_eq!(spans[0].text(doc), doc);
    }

    #[test]
    fn commented_start_tag_does_not_open_a_span() {
        let doc = "<!-- <helix-a id=\"c\"> --><helix-a id=\"1\">A</helix-a> tail";
        let spans = topmost_spans(doc, &family());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, doc.find("<helix-a id=\"1\"").unwrap());
        assert_eq!(spans[0].text(doc), "<helix-a id=\"1\">A</helix-a>");
        assert!(spans[0].terminated);

        let unclosed = "<helix-a>x</helix-a><!-- <helix-b>";
        let spans = extract_spans(unclosed, &family());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].tag, "helix-a");
    }

    #[test]
    fn no_family_tags_no_spans() {
        assert!(topmost_spans("<div><p>plain</p></div>", &family()).is_empty());
    }

    #[test]
    fn splice_preserves_surrounding_text() {
        let doc = "A<helix-a>1</helix-a>B<helix-b>2</helix-b>C";
        let spans = topmost_spans(doc, &family());
        let replacements: Vec<_> = spans
            .iter()
            .map(|s| (s.range(), format!("[{}]", s.tag)))
            .collect();
        assert_eq!(splice(doc, &replacements), "A[helix-a]B[helix-b]C");
    }
}
