//! Rule scoring: raw cue points, normalization and confidence thresholds.

use crate::model::Tag;

use super::rules::TopicRule;

/// Points for a plain keyword hit in the combined text.
pub const KEYWORD_POINTS: f64 = 1.0;
/// Points for a formula pattern hit. Formulas are strong topic signals.
pub const FORMULA_POINTS: f64 = 2.0;
/// Points for a number-plus-unit hit.
pub const UNIT_POINTS: f64 = 1.0;
/// Points for a keyword hit in mark-scheme text only.
pub const MS_KEYWORD_POINTS: f64 = 2.0;

/// A rule must score at least this many raw points to emit a tag.
pub const MIN_RAW_SCORE: f64 = 1.0;
/// A tag below this confidence is suppressed even if raw points qualify.
pub const MIN_CONFIDENCE: f64 = 0.3;

/// Scores one rule against lowercased question and mark-scheme text.
///
/// Confidence is the raw score normalized by the rule's maximum, capped at
/// 1.0 after the rule weight is applied. Returns `None` when either the
/// raw-point or the confidence threshold is missed, so callers only ever
/// see emit-worthy tags.
pub fn score_rule(rule: &TopicRule, text_lower: &str, ms_lower: &str) -> Option<Tag> {
    let max = rule.max_points();
    if max <= 0.0 {
        return None;
    }

    let mut raw = 0.0;
    let mut cues = Vec::new();

    for keyword in &rule.keywords {
        if text_lower.contains(keyword.as_str()) {
            raw += KEYWORD_POINTS;
            cues.push(format!("keyword:{keyword}"));
        }
    }
    for formula in &rule.formulas {
        if formula.is_match(text_lower) {
            raw += FORMULA_POINTS;
            cues.push(format!("formula:{formula}"));
        }
    }
    for unit in &rule.units {
        if unit.re.is_match(text_lower) {
            raw += UNIT_POINTS;
            cues.push(format!("unit:{}", unit.symbol));
        }
    }
    for keyword in &rule.ms_keywords {
        if ms_lower.contains(keyword.as_str()) {
            raw += MS_KEYWORD_POINTS;
            cues.push(format!("ms_keyword:{keyword}"));
        }
    }

    if raw < MIN_RAW_SCORE {
        return None;
    }
    let confidence = (raw / max * rule.weight).min(1.0);
    if confidence < MIN_CONFIDENCE {
        return None;
    }

    Some(Tag {
        topic: rule.topic.clone(),
        subtopic: rule.subtopic.clone(),
        confidence,
        provenance: vec!["rules".to_string()],
        cues,
    })
}
