//! One migration run: identify, look up, generate, splice, score.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tagshift_ai::{GenerateRequest, Generator, sanitize_response};
use tagshift_core::config::TagshiftConfig;
use tagshift_core::markup::{TagSpan, splice, topmost_spans};
use tagshift_core::{Method, MigrationResult, RetrievalRecord, TagFamily};
use tagshift_rules::{TransformationRule, apply_rules, diff_pair};
use tagshift_store::SimilarityIndex;
use tracing::{debug, info, warn};

use crate::EngineError;
use crate::prompt::{PromptRule, SYSTEM_PROMPT, build_prompt};

/// Tunables for [`Migrator`].
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOptions {
    pub generation_threshold: f32,
    pub generation_bonus: f32,
    pub min_similarity: f32,
    pub rule_confidence: f32,
    pub similar_examples: usize,
    pub prompt_examples: usize,
    /// Call the generator at all. Off means rules and retrieval only.
    pub generate: bool,
    pub generation_timeout: Duration,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self::from_config(&TagshiftConfig::default())
    }
}

impl MigrationOptions {
    pub fn from_config(config: &TagshiftConfig) -> Self {
        let m = &config.migration;
        Self {
            generation_threshold: m.generation_threshold,
            generation_bonus: m.generation_bonus,
            min_similarity: m.min_similarity,
            rule_confidence: m.rule_confidence,
            similar_examples: m.similar_examples,
            prompt_examples: m.prompt_examples,
            generate: config.generation.enabled,
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        for (field, value) in [
            ("generation_threshold", self.generation_threshold),
            ("generation_bonus", self.generation_bonus),
            ("min_similarity", self.min_similarity),
            ("rule_confidence", self.rule_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidOption {
                    field,
                    message: format!("{value} is outside [0, 1]"),
                });
            }
        }
        if self.similar_examples == 0 {
            return Err(EngineError::InvalidOption {
                field: "similar_examples",
                message: "must be at least 1".into(),
            });
        }
        if self.generation_timeout.is_zero() {
            return Err(EngineError::InvalidOption {
                field: "generation_timeout",
                message: "must be non-zero".into(),
            });
        }
        Ok(())
    }
}

// ── Rule resolution ──

/// Where the rule for one tag came from.
enum Resolved<'a> {
    /// Exact hit in the synthesized rule store.
    Store(&'a TransformationRule),
    /// Derived on the fly from the best retrieved example for the tag.
    Retrieved {
        rule: TransformationRule,
        /// V1 root tag of the retrieved example.
        source_tag: String,
    },
}

impl Resolved<'_> {
    fn rule(&self) -> &TransformationRule {
        match self {
            Self::Store(rule) => rule,
            Self::Retrieved { rule, .. } => rule,
        }
    }

    /// The V1 tag this rule was learned from.
    fn source_tag<'t>(&'t self, tag: &'t str) -> &'t str {
        match self {
            Self::Store(_) => tag,
            Self::Retrieved { source_tag, .. } => source_tag,
        }
    }

    /// Safe to apply deterministically to elements named `tag`.
    fn applies_to(&self, tag: &str) -> bool {
        self.source_tag(tag) == tag
    }
}

// ── Migrator ──

/// Turns V1 fragments into V2 suggestions.
///
/// Holds shared, read-only handles to one corpus generation; `migrate` takes
/// `&self` and keeps no state between calls.
pub struct Migrator {
    rules: Arc<tagshift_rules::RuleStore>,
    index: Arc<SimilarityIndex>,
    generator: Option<Arc<dyn Generator>>,
    family: TagFamily,
    options: MigrationOptions,
}

impl Migrator {
    /// Fails with [`EngineError::EmptyCorpus`] when there is nothing to learn
    /// from: no rules and no indexed examples.
    pub fn new(
        rules: Arc<tagshift_rules::RuleStore>,
        index: Arc<SimilarityIndex>,
        options: MigrationOptions,
    ) -> Result<Self, EngineError> {
        if rules.is_empty() && index.is_empty() {
            return Err(EngineError::EmptyCorpus);
        }
        options.validate()?;
        let family = index.family().clone();
        Ok(Self {
            rules,
            index,
            generator: None,
            family,
            options,
        })
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    pub fn family(&self) -> &TagFamily {
        &self.family
    }

    /// Migrate one fragment. Never fails.
    ///
    /// When no rule or generation changes the fragment, the best retrieved
    /// example's V2 markup is suggested if it reaches `min_similarity`.
    /// Otherwise the result carries no suggestion and zero confidence.
    pub async fn migrate(&self, fragment: &str) -> MigrationResult {
        let opts = &self.options;

        // Identify.
        let spans = topmost_spans(fragment, &self.family);
        let tags = self.family.distinct_tag_names(fragment);
        let similar = self.index.query(fragment, opts.similar_examples);
        let best = similar.first().map_or(0.0, |r| r.similarity_score);
        debug!(spans = spans.len(), tags = tags.len(), best, "identified components");

        if spans.is_empty() {
            return MigrationResult::unmigrated(fragment, similar);
        }

        // Look up.
        let resolved = self.resolve(&tags);
        let exact = !tags.is_empty()
            && tags
                .iter()
                .all(|t| matches!(resolved.get(t), Some(Resolved::Store(_))));

        let guided = !resolved.is_empty() || best >= opts.min_similarity;
        let generator = self
            .generator
            .as_ref()
            .filter(|_| opts.generate && guided && best < opts.generation_threshold);
        if self.generator.is_some() && generator.is_none() {
            debug!(best, guided, enabled = opts.generate, "generation skipped");
        }

        let prompt_examples: Vec<&RetrievalRecord> = similar
            .iter()
            .filter(|r| r.similarity_score >= opts.min_similarity)
            .take(opts.prompt_examples)
            .collect();

        // Rewrite each span, then splice.
        let mut replacements: Vec<(Range<usize>, String)> = Vec::new();
        let mut generated = 0usize;
        for span in &spans {
            let original = span.text(fragment);
            let applied = apply_rules(original, |name| {
                resolved
                    .get(name)
                    .filter(|r| r.applies_to(name))
                    .map(Resolved::rule)
            });
            let mut text = applied.text;

            if let Some(generator) = generator {
                let rules = self.span_rules(span, fragment, &resolved);
                let prompt = build_prompt(original, &rules, &prompt_examples);
                if let Some(out) = self.generate(generator.as_ref(), prompt, span).await {
                    text = out;
                    generated += 1;
                }
            }

            if text != original {
                replacements.push((span.range(), text));
            }
        }
        let mut output = splice(fragment, &replacements);

        // Score.
        let (method, confidence) = if generated > 0 {
            (
                Method::RetrievalPlusGeneration,
                best + opts.generation_bonus,
            )
        } else if output == fragment {
            // No rule changed anything; a close enough example still counts.
            match similar.first().filter(|r| r.similarity_score >= opts.min_similarity) {
                Some(hit) => {
                    debug!(id = %hit.id, score = hit.similarity_score, "suggesting retrieved example");
                    output = hit.v2.clone();
                    (Method::RetrievalOnly, best)
                }
                None => {
                    info!(tags = ?tags, "no migration applied");
                    return MigrationResult::unmigrated(fragment, similar);
                }
            }
        } else if exact {
            (Method::RuleOnly, opts.rule_confidence)
        } else {
            (Method::RetrievalOnly, best)
        };

        info!(
            method = %method,
            confidence,
            spans = spans.len(),
            generated,
            "migration complete"
        );
        MigrationResult {
            input_v1: fragment.to_string(),
            suggested_v2: Some(output),
            confidence_score: confidence.clamp(0.0, 1.0),
            method,
            similar_examples: similar,
        }
    }

    /// Rule store first; on a miss, the best retrieved example for the tag
    /// if it is similar enough to diff into an ad hoc rule.
    fn resolve(&self, tags: &[String]) -> BTreeMap<String, Resolved<'_>> {
        let mut resolved = BTreeMap::new();
        for tag in tags {
            if let Some(rule) = self.rules.get(tag) {
                resolved.insert(tag.clone(), Resolved::Store(rule));
                continue;
            }
            let Some(record) = self.index.query(tag, 1).into_iter().next() else {
                debug!(tag = %tag, "no rule and no retrieval");
                continue;
            };
            if record.similarity_score < self.options.min_similarity {
                debug!(
                    tag = %tag,
                    score = record.similarity_score,
                    "retrieved example below similarity floor"
                );
                continue;
            }
            let diff = diff_pair(&record.v1, &record.v2, &self.family);
            let source_tag = diff.old_tag.clone().unwrap_or_default();
            let Some(rule) = TransformationRule::from_diff(diff) else {
                debug!(tag = %tag, id = %record.id, "retrieved example has no usable diff");
                continue;
            };
            debug!(
                tag = %tag,
                id = %record.id,
                source = %source_tag,
                score = record.similarity_score,
                "adopted retrieved example as rule source"
            );
            resolved.insert(
                tag.clone(),
                Resolved::Retrieved { rule, source_tag },
            );
        }
        resolved
    }

    fn span_rules<'r>(
        &self,
        span: &TagSpan,
        fragment: &str,
        resolved: &'r BTreeMap<String, Resolved<'_>>,
    ) -> Vec<PromptRule<'r>> {
        self.family
            .distinct_tag_names(span.text(fragment))
            .iter()
            .filter_map(|tag| {
                let (key, r) = resolved.get_key_value(tag)?;
                Some(PromptRule {
                    old_tag: r.source_tag(key),
                    rule: r.rule(),
                })
            })
            .collect()
    }

    /// One bounded generation call. `None` on error, timeout, or output
    /// that sanitizes to nothing.
    async fn generate(
        &self,
        generator: &dyn Generator,
        prompt: String,
        span: &TagSpan,
    ) -> Option<String> {
        let request = GenerateRequest::new(prompt).with_system(SYSTEM_PROMPT);
        let timeout = self.options.generation_timeout;
        match tokio::time::timeout(timeout, generator.generate(&request)).await {
            Ok(Ok(raw)) => {
                let text = sanitize_response(&raw);
                if text.is_empty() {
                    warn!(tag = %span.tag, model = %generator.model(), "generation returned no markup");
                    None
                } else {
                    Some(text)
                }
            }
            Ok(Err(e)) => {
                warn!(tag = %span.tag, model = %generator.model(), error = %e, "generation failed");
                None
            }
            Err(_) => {
                warn!(tag = %span.tag, model = %generator.model(), ?timeout, "generation timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let mut config = TagshiftConfig::default();
        config.generation.enabled = false;
        config.generation.timeout_secs = 7;
        config.migration.min_similarity = 0.5;
        let opts = MigrationOptions::from_config(&config);
        assert!(!opts.generate);
        assert_eq!(opts.generation_timeout, Duration::from_secs(7));
        assert_eq!(opts.min_similarity, 0.5);
        assert_eq!(opts.similar_examples, 3);
    }

    #[test]
    fn out_of_range_options_rejected() {
        let opts = MigrationOptions {
            min_similarity: 1.5,
            ..MigrationOptions::default()
        };
        assert!(matches!(
            opts.validate(),
            Err(EngineError::InvalidOption {
                field: "min_similarity",
                ..
            })
        ));

        let opts = MigrationOptions {
            generation_timeout: Duration::ZERO,
            ..MigrationOptions::default()
        };
        assert!(opts.validate().is_err());
        assert!(MigrationOptions::default().validate().is_ok());
    }
}
