//! Transformation rules learned from V1/V2 example pairs.

pub mod apply;
pub mod diff;
pub mod rename;
pub mod store;

pub use apply::{Applied, apply_rules};
pub use diff::{AttributeChange, AttributeDiff, NestedChanges, diff_pair};
pub use rename::{PageAssets, TagMapper};
pub use store::{RuleError, RuleExample, RuleStore, SynthesisSummary, TransformationRule};
