//! Start/close tag scanning for one custom-element prefix family.
//!
//! This is deliberately not an HTML parser. It recognises element start tags
//! (`<name attr="v" ...>` / `<name ... />`), matching close tags (`</name>`)
//! and comments, and reports byte offsets into the original text so callers
//! can re-splice exact spans.

use std::collections::BTreeMap;
use std::ops::Range;

use regex::Regex;

/// Prefix used by V1 components when none is configured.
pub const DEFAULT_PREFIX: &str = "helix-";

/// A single attribute as written in a start tag.
///
/// `value` is `None` for bare boolean attributes (`<x hidden>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

/// A parsed element start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercased tag name.
    pub name: String,
    /// Attributes in source order (duplicates kept).
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
    /// Offset of the opening `<`.
    pub start: usize,
    /// Offset just past the closing `>`.
    pub end: usize,
}

impl StartTag {
    /// Attribute name → value, first occurrence wins. Boolean attributes map to "".
    pub fn attribute_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for attr in &self.attributes {
            map.entry(attr.name.clone())
                .or_insert_with(|| attr.value.clone().unwrap_or_default());
        }
        map
    }

    /// Value of the first attribute with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }
}

/// The set of custom elements sharing one tag-name prefix (e.g. `helix-`).
#[derive(Debug, Clone)]
pub struct TagFamily {
    prefix: String,
    open: Regex,
}

impl TagFamily {
    /// Build a family for `prefix`. Matching is ASCII case-insensitive.
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let pattern = format!(r"(?i)<({}[^\s/>]*)", regex::escape(prefix));
        Ok(Self {
            prefix: prefix.to_ascii_lowercase(),
            open: Regex::new(&pattern)?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `tag_name` belongs to this family.
    pub fn contains(&self, tag_name: &str) -> bool {
        let n = self.prefix.len();
        tag_name.len() >= n && tag_name.as_bytes()[..n].eq_ignore_ascii_case(self.prefix.as_bytes())
    }

    /// Offset of `<` and lowercased name for every family start tag, in
    /// document order. Tags inside comments are not reported.
    pub fn open_tags(&self, text: &str) -> Vec<(usize, String)> {
        let comments = comment_ranges(text);
        self.open
            .captures_iter(text)
            .filter_map(|caps| {
                let name = caps.get(1)?;
                let at = name.start() - 1;
                if comments.iter().any(|c| c.contains(&at)) {
                    return None;
                }
                Some((at, name.as_str().to_ascii_lowercase()))
            })
            .collect()
    }

    /// Every family tag name in document order, duplicates included.
    pub fn tag_names(&self, text: &str) -> Vec<String> {
        self.open_tags(text).into_iter().map(|(_, name)| name).collect()
    }

    /// Distinct family tag names in order of first appearance.
    pub fn distinct_tag_names(&self, text: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for name in self.tag_names(text) {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    /// The first family start tag that parses cleanly.
    pub fn root(&self, markup: &str) -> Option<StartTag> {
        self.open_tags(markup)
            .into_iter()
            .find_map(|(at, _)| parse_start_tag(markup, at))
    }
}

impl Default for TagFamily {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX).expect("default prefix is a valid pattern")
    }
}

/// Parse the start tag whose `<` sits at byte offset `at`.
///
/// Returns `None` when `at` does not open an element start tag or the tag is
/// never closed by `>`.
pub fn parse_start_tag(text: &str, at: usize) -> Option<StartTag> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    if bytes.get(at) != Some(&b'<') || !bytes.get(at + 1).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }

    let name_start = at + 1;
    let mut i = name_start;
    while i < len && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = text[name_start..i].to_ascii_lowercase();

    let mut attributes = Vec::new();
    loop {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            return None;
        }
        match bytes[i] {
            b'>' => {
                return Some(StartTag {
                    name,
                    attributes,
                    self_closing: false,
                    start: at,
                    end: i + 1,
                });
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some(StartTag {
                    name,
                    attributes,
                    self_closing: true,
                    start: at,
                    end: i + 2,
                });
            }
            b'/' | b'=' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while i < len && is_attr_name_byte(bytes[i]) {
            i += 1;
        }
        if attr_start == i {
            // Stray quote or similar; step over it.
            i += 1;
            continue;
        }
        let attr_name = text[attr_start..i].to_string();

        let mut j = i;
        while j < len && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let mut value = None;
        if j < len && bytes[j] == b'=' {
            j += 1;
            while j < len && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j >= len {
                return None;
            }
            match bytes[j] {
                quote @ (b'"' | b'\'') => {
                    let value_start = j + 1;
                    let close = value_start + text[value_start..].find(quote as char)?;
                    value = Some(text[value_start..close].to_string());
                    i = close + 1;
                }
                _ => {
                    let value_start = j;
                    while j < len && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                        j += 1;
                    }
                    value = Some(text[value_start..j].to_string());
                    i = j;
                }
            }
        }
        attributes.push(Attribute {
            name: attr_name,
            value,
        });
    }
}

/// If a close tag for `name` starts at `at`, return the offset just past its `>`.
pub fn close_tag_end(text: &str, at: usize, name: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(at) != Some(&b'<') || bytes.get(at + 1) != Some(&b'/') {
        return None;
    }
    if !name_at(bytes, at + 2, name) {
        return None;
    }
    let mut i = at + 2 + name.len();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    (bytes.get(i) == Some(&b'>')).then_some(i + 1)
}

/// Lowercased name of the close tag starting at `at`, with the offset past its `>`.
pub fn close_tag_at(text: &str, at: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(at) != Some(&b'<') || bytes.get(at + 1) != Some(&b'/') {
        return None;
    }
    let name_start = at + 2;
    let mut i = name_start;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name = text[name_start..i].to_ascii_lowercase();
    let end = close_tag_end(text, at, &name)?;
    Some((name, end))
}

/// Whether a start tag for exactly `name` begins at `at`.
pub fn opens_tag(text: &str, at: usize, name: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.get(at) == Some(&b'<') && name_at(bytes, at + 1, name)
}

/// If a comment starts at `at`, return the offset just past `-->` (or end of text).
pub fn comment_end(text: &str, at: usize) -> Option<usize> {
    if !text[at..].starts_with("<!--") {
        return None;
    }
    let body = at + 4;
    Some(text[body..].find("-->").map_or(text.len(), |rel| body + rel + 3))
}

/// Byte ranges of every comment in `text`; an unclosed one runs to the end.
fn comment_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut pos = 0;
    while let Some(rel) = text[pos..].find("<!--") {
        let at = pos + rel;
        let end = comment_end(text, at).unwrap_or(text.len());
        ranges.push(at..end);
        pos = end;
    }
    ranges
}

/// Every start tag in `text`, in document order, skipping comments.
pub fn scan_start_tags(text: &str) -> Vec<StartTag> {
    let mut tags = Vec::new();
    let mut pos = 0;
    while let Some(rel) = text[pos..].find('<') {
        let lt = pos + rel;
        if let Some(end) = comment_end(text, lt) {
            pos = end;
            continue;
        }
        match parse_start_tag(text, lt) {
            Some(tag) => {
                pos = tag.end;
                tags.push(tag);
            }
            None => pos = lt + 1,
        }
    }
    tags
}

/// Case-insensitive match of `name` at `at`, followed by a tag-name boundary.
fn name_at(bytes: &[u8], at: usize, name: &str) -> bool {
    let end = at + name.len();
    end <= bytes.len()
        && bytes[at..end].eq_ignore_ascii_case(name.as_bytes())
        && bytes
            .get(end)
            .is_none_or(|&b| b.is_ascii_whitespace() || matches!(b, b'>' | b'/'))
}

fn is_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'>' | b'/' | b'<' | b'=' | b'"' | b'\'')
}

fn is_attr_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'>' | b'/' | b'=' | b'"' | b'\'' | b'<')
}
