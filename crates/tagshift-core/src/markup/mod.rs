//! Custom-element markup scanning: start tags, balanced spans, splicing.

pub mod span;
pub mod tag;

pub use span::{TagSpan, bound_element, extract_spans, splice, topmost_spans};
pub use tag::{
    Attribute, DEFAULT_PREFIX, StartTag, TagFamily, close_tag_at, comment_end, parse_start_tag,
    scan_start_tags,
};
