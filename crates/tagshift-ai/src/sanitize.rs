//! Cleanup of generated markup.
//!
//! Models wrap answers in lead-in sentences and code fences no matter how the
//! prompt is phrased. What is left after stripping must start with `<`.

/// Lead-ins removed from the start of a response, matched case-insensitively.
const LEAD_INS: &[&str] = &[
    "here is the updated content:",
    "here is the migrated content:",
    "here's the updated content:",
    "here's the migrated content:",
    "here is the migrated v2 html:",
    "here's the v2 version:",
    "the migrated content is:",
    "the migrated html is:",
    "updated content:",
    "migrated content:",
    "v2 migration:",
    "here is the result:",
    "the result is:",
    "output:",
    "here you go:",
    "here's what you need:",
];

/// Strip lead-ins and code fences from `raw`, then drop any prose before the
/// first line that starts with `<`.
///
/// Returns an empty string when no markup is left; callers treat that as a
/// failed generation.
pub fn sanitize_response(raw: &str) -> String {
    let mut text = raw.trim();
    loop {
        let before = text;
        text = strip_lead_in(text);
        text = strip_code_fences(text);
        if text == before {
            break;
        }
    }

    if text.starts_with('<') {
        return text.to_string();
    }

    let mut lines = text.lines().skip_while(|l| !l.trim_start().starts_with('<'));
    let Some(first) = lines.next() else {
        return String::new();
    };
    let mut out = first.trim_start().to_string();
    for line in lines {
        out.push('\n');
        out.push_str(line);
    }
    strip_code_fences(&out).to_string()
}

fn strip_lead_in(text: &str) -> &str {
    for lead in LEAD_INS {
        if let Some(head) = text.get(..lead.len())
            && head.eq_ignore_ascii_case(lead)
        {
            return text[lead.len()..].trim_start();
        }
    }
    text
}

/// Remove a surrounding (or unterminated leading) Markdown code fence.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let Some(nl) = rest.find('\n') else {
            return rest.trim();
        };
        let body = &rest[nl + 1..];
        if let Some(close) = body.rfind("```") {
            return body[..close].trim();
        }
        return body.trim();
    }
    text.strip_suffix("```").map_or(text, str::trim_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_markup_is_unchanged() {
        let html = "<helix-core-a key=\"y\">Z</helix-core-a>";
        assert_eq!(sanitize_response(html), html);
        assert_eq!(sanitize_response(&format!("  {html}\n")), html);
    }

    #[test]
    fn strips_lead_in_phrases() {
        assert_eq!(
            sanitize_response("Here is the migrated content:\n<helix-core-a/>"),
            "<helix-core-a/>"
        );
        assert_eq!(sanitize_response("OUTPUT: <x-b></x-b>"), "<x-b></x-b>");
        assert_eq!(
            sanitize_response("Here is the migrated v2 HTML: <helix-core-a/>"),
            "<helix-core-a/>"
        );
    }

    #[test]
    fn strips_code_fences() {
        assert_eq!(
            sanitize_response("```html\n<helix-core-a>x</helix-core-a>\n```"),
            "<helix-core-a>x</helix-core-a>"
        );
        assert_eq!(
            sanitize_response("Migrated content:\n```\n<helix-core-a/>\n```"),
            "<helix-core-a/>"
        );
    }

    #[test]
    fn drops_prose_before_first_markup_line() {
        let raw = "Sure! I renamed the tag.\nNote the attribute change.\n  <helix-core-a>\n  x\n</helix-core-a>";
        assert_eq!(sanitize_response(raw), "<helix-core-a>\n  x\n</helix-core-a>");
    }

    #[test]
    fn prose_only_is_empty() {
        assert_eq!(sanitize_response("I cannot help with that."), "");
        assert_eq!(sanitize_response("   "), "");
        assert_eq!(sanitize_response("```\n```"), "");
    }

    #[test]
    fn prose_then_fenced_markup() {
        let raw = "The result is below.\n```html\n<helix-core-a/>\n```";
        assert_eq!(sanitize_response(raw), "<helix-core-a/>");
    }
}
