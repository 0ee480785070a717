//! Classifier seam and the rule-based implementation.
//!
//! `Classifier` is the injection point for topic tagging: the pipeline only
//! sees the trait, so an HTTP-backed classifier, a cached one or a test
//! double all slot in the same way.

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::Tag;

use super::scorer::score_rule;
use super::subject::SubjectConfig;

/// One question's text, assembled for classification.
#[derive(Debug, Clone, Default)]
pub struct ClassifyRequest {
    pub question_number: u32,
    /// Full question context: header plus all part texts.
    pub context_text: String,
    /// Linked mark-scheme snippet, empty when no link was found.
    pub ms_text: String,
}

/// Assigns topic tags to one question. Implementations must be shareable
/// across the batch driver's worker threads.
pub trait Classifier: Send + Sync {
    fn classify(&self, request: &ClassifyRequest) -> Result<Vec<Tag>>;
}

/// Deterministic keyword/formula/unit scoring against the subject's rule
/// table. Never fails and never calls out of process.
pub struct RuleBasedClassifier {
    config: SubjectConfig,
}

impl RuleBasedClassifier {
    pub fn new(config: SubjectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SubjectConfig {
        &self.config
    }

    fn score_all(&self, text_lower: &str, ms_lower: &str) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .config
            .rules()
            .rules
            .iter()
            .filter_map(|rule| score_rule(rule, text_lower, ms_lower))
            .collect();
        // Descending confidence; topic id breaks ties so output order is
        // stable across runs.
        tags.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.topic.cmp(&b.topic))
        });
        tags
    }
}

impl Classifier for RuleBasedClassifier {
    fn classify(&self, request: &ClassifyRequest) -> Result<Vec<Tag>> {
        match &self.config {
            SubjectConfig::Simple { .. } => {
                let text = request.context_text.to_lowercase();
                let ms = request.ms_text.to_lowercase();
                let mut tags = self.score_all(&text, &ms);
                tags.truncate(1);
                Ok(tags)
            }
            SubjectConfig::SymbolAware {
                normalization,
                floors,
                ..
            } => {
                let mut text = request.context_text.to_lowercase();
                let mut ms = request.ms_text.to_lowercase();
                for (from, to) in normalization {
                    text = text.replace(from, to);
                    ms = ms.replace(from, to);
                }
                let mut tags = self.score_all(&text, &ms);
                apply_floors(&mut tags, floors, &text);
                Ok(tags)
            }
        }
    }
}

/// Symbol floors: a topic whose symbol appears in the question text gets
/// at least the configured confidence, inserted if the rules missed it.
fn apply_floors(tags: &mut Vec<Tag>, floors: &[super::subject::SymbolFloor], text: &str) {
    for floor in floors {
        let Some(symbol) = floor.symbols.iter().find(|s| text.contains(s.as_str())) else {
            continue;
        };
        match tags.iter_mut().find(|t| t.topic == floor.topic) {
            Some(tag) => {
                if tag.confidence < floor.floor {
                    tag.confidence = floor.floor;
                    tag.cues.push(format!("symbol:{symbol}"));
                }
            }
            None => {
                let mut tag = Tag::new(floor.topic.clone(), floor.floor);
                tag.provenance.push("symbol_floor".to_string());
                tag.cues.push(format!("symbol:{symbol}"));
                tags.push(tag);
            }
        }
    }
    tags.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.topic.cmp(&b.topic))
    });
}

/// Wraps a rule-based classifier with an external fallback, consulted only
/// when the rules are unsure.
///
/// Escalation keeps the rule tags and merges in the external classifier's
/// answers; a failing external call degrades to the rule tags with a
/// warning instead of failing the question.
pub struct EscalatingClassifier {
    rules: RuleBasedClassifier,
    fallback: Box<dyn Classifier>,
    threshold: f64,
}

impl EscalatingClassifier {
    pub fn new(rules: RuleBasedClassifier, fallback: Box<dyn Classifier>, threshold: f64) -> Self {
        Self {
            rules,
            fallback,
            threshold,
        }
    }
}

impl Classifier for EscalatingClassifier {
    fn classify(&self, request: &ClassifyRequest) -> Result<Vec<Tag>> {
        let mut tags = self.rules.classify(request)?;
        let best = tags.first().map(|t| t.confidence).unwrap_or(0.0);
        if best >= self.threshold {
            return Ok(tags);
        }
        debug!(
            question = request.question_number,
            best, "rule confidence below threshold, escalating"
        );
        match self.fallback.classify(request) {
            Ok(extra) => {
                for tag in extra {
                    match tags.iter_mut().find(|t| t.topic == tag.topic) {
                        Some(existing) => {
                            if tag.confidence > existing.confidence {
                                existing.confidence = tag.confidence;
                            }
                            existing.provenance.extend(tag.provenance);
                        }
                        None => tags.push(tag),
                    }
                }
                tags.sort_by(|a, b| {
                    b.confidence
                        .total_cmp(&a.confidence)
                        .then_with(|| a.topic.cmp(&b.topic))
                });
                Ok(tags)
            }
            Err(e) => {
                warn!(
                    question = request.question_number,
                    error = %e,
                    "escalation failed, keeping rule tags"
                );
                Ok(tags)
            }
        }
    }
}
