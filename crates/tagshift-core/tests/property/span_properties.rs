use proptest::prelude::*;
use tagshift_core::TagFamily;
use tagshift_core::markup::{extract_spans, splice, topmost_spans};

fn token() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "<helix-a>",
        "</helix-a>",
        "<helix-b id=\"x\">",
        "</helix-b>",
        "<helix-c/>",
        "<div>",
        "</div>",
        "<!-- <helix-a> -->",
        "text",
        " ",
        "<HELIX-A class='k'>",
    ])
}

fn soup() -> impl Strategy<Value = String> {
    prop::collection::vec(token(), 0..40).prop_map(|parts| parts.concat())
}

/// Well-formed nesting of family and plain elements.
fn element() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("leaf".to_string()),
        Just("<helix-c/>".to_string()),
        Just("<span>s</span>".to_string()),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        (
            prop::sample::select(vec!["helix-a", "helix-b", "div"]),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(tag, children)| format!("<{tag}>{}</{tag}>", children.concat()))
    })
}

proptest! {
    #[test]
    fn topmost_spans_are_ordered_and_disjoint(doc in soup()) {
        let family = TagFamily::default();
        let spans = topmost_spans(&doc, &family);
        for span in &spans {
            prop_assert!(span.start < span.end);
            prop_assert!(span.end <= doc.len());
            prop_assert!(family.contains(&span.tag));
            prop_assert!(span.content.start >= span.start && span.content.end <= span.end);
        }
        for pair in spans.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn every_span_lies_within_a_topmost_span(doc in soup()) {
        let family = TagFamily::default();
        let top = topmost_spans(&doc, &family);
        for span in extract_spans(&doc, &family) {
            prop_assert!(
                top.iter().any(|t| t.start <= span.start && span.start < t.end),
                "span at {} not covered", span.start
            );
        }
    }

    #[test]
    fn identity_splice_is_lossless(doc in soup()) {
        let family = TagFamily::default();
        let replacements: Vec<_> = topmost_spans(&doc, &family)
            .iter()
            .map(|s| (s.range(), s.text(&doc).to_string()))
            .collect();
        prop_assert_eq!(splice(&doc, &replacements), doc);
    }

    #[test]
    fn well_formed_family_root_spans_whole_element(body in prop::collection::vec(element(), 0..4)) {
        let family = TagFamily::default();
        let doc = format!("<helix-a>{}</helix-a>", body.concat());
        let spans = topmost_spans(&doc, &family);
        prop_assert_eq!(spans.len(), 1);
        prop_assert_eq!(spans[0].text(&doc), doc.as_str());
        prop_assert!(spans[0].terminated);
    }

    #[test]
    fn well_formed_siblings_are_bounded_exactly(items in prop::collection::vec(element(), 1..5)) {
        let family = TagFamily::default();
        let doc = items.join("\n");
        let expected: Vec<&str> = items
            .iter()
            .filter(|item| item.starts_with("<helix-"))
            .map(String::as_str)
            .collect();
        let spans = topmost_spans(&doc, &family);
        let texts: Vec<&str> = spans.iter().map(|s| s.text(&doc)).collect();
        let family_items = expected.len();
        // Plain elements may still contain family descendants, which become topmost.
        prop_assert!(texts.len() >= family_items);
        for item in expected {
            prop_assert!(texts.contains(&item));
        }
    }
}
