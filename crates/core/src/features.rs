//! Feature Extractor: difficulty, style and complexity metadata per
//! question, from cheap text heuristics over the segmented output.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{
    Complexity, Difficulty, MsLink, QuestionFeatures, Reasoning, SegmentedQuestion, Style, Tag,
};

// Difficulty score: a 0.3 base plus weighted, individually capped factors.
const BASE_SCORE: f64 = 0.3;
const MARKS_WEIGHT: f64 = 0.25;
const PARTS_WEIGHT: f64 = 0.15;
const TAGS_WEIGHT: f64 = 0.15;
const MS_LENGTH_WEIGHT: f64 = 0.15;
const HARD_VERB_WEIGHT: f64 = 0.10;

const MARKS_CAP: f64 = 20.0;
const PARTS_CAP: f64 = 6.0;
const TAGS_CAP: f64 = 5.0;
const MS_LENGTH_CAP: f64 = 1000.0;
const HARD_VERB_CAP: f64 = 3.0;

const EASY_BELOW: f64 = 0.4;
const MEDIUM_BELOW: f64 = 0.7;

// Characteristic thresholds.
const MULTI_CONCEPT_MIN: usize = 2;
const HIGH_MARKS_MIN: u32 = 6;

/// Minutes per mark, the board's own rule of thumb for exam timing.
const MINUTES_PER_MARK: f64 = 1.5;

// Command-verb families, lowest to highest cognitive demand.
static RECALL_VERBS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(state|name|give|write down|identify|label)\b").unwrap());
static APPLICATION_VERBS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(calculate|determine|find|work out|solve|measure|complete)\b").unwrap()
});
static ANALYSIS_VERBS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(explain|evaluate|justify|prove|show that|derive|compare|discuss|suggest why)\b")
        .unwrap()
});

static STEP_INDICATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(hence|then|using your answer|first|finally|next)\b").unwrap());

static FORMULA_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z]\s*=\s*[a-z0-9]").unwrap());

// Characteristic cue families, each checked independently.
static UNIT_CONVERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(convert|converting|in si units|give your answer in)\b").unwrap()
});
static REAL_WORLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(a student|a car|a train|a company|a factory|a kettle|everyday|real life)\b")
        .unwrap()
});
static DATA_CUES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bthe (table|graph|chart|data|results)\b").unwrap());

/// Derives the full feature record for one segmented question.
pub fn extract_features(
    question: &SegmentedQuestion,
    tags: &[Tag],
    ms_link: Option<&MsLink>,
) -> QuestionFeatures {
    let text = question.context_text.to_lowercase();
    let ms_text = ms_link.map(|l| l.ms_snippet.to_lowercase()).unwrap_or_default();
    let ms_len = ms_text.len();
    // Hard verbs count over question and mark-scheme text together: a
    // "derive" that only appears in the scheme still signals demand.
    let combined = format!("{text} {ms_text}");
    let hard_verbs = ANALYSIS_VERBS.find_iter(&combined).count();

    let score = difficulty_score(
        question.total_marks,
        question.parts.len(),
        tags.len(),
        ms_len,
        hard_verbs,
    );
    let difficulty = if score < EASY_BELOW {
        Difficulty::Easy
    } else if score < MEDIUM_BELOW {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    };

    let styles = detect_styles(&text);
    let reasoning = classify_reasoning(&text);
    let step_count = STEP_INDICATORS
        .find_iter(&text)
        .count()
        .max(question.parts.len());
    let complexity = Complexity {
        concept_count: tags.len(),
        step_count,
        reasoning,
    };

    let estimated_minutes = (question.total_marks as f64 * MINUTES_PER_MARK).ceil() as u32;

    let mut characteristics = Vec::new();
    if step_count > 1 {
        characteristics.push("multi-step".to_string());
    }
    if FORMULA_SHAPE.is_match(&text) {
        characteristics.push("formula-based".to_string());
    }
    if styles.contains(&Style::Diagram) {
        characteristics.push("requires-diagram".to_string());
    }
    if UNIT_CONVERSION.is_match(&text) {
        characteristics.push("unit-conversion".to_string());
    }
    if REAL_WORLD.is_match(&text) {
        characteristics.push("real-world-context".to_string());
    }
    if DATA_CUES.is_match(&text) {
        characteristics.push("data-interpretation".to_string());
    }
    if tags.len() >= MULTI_CONCEPT_MIN {
        characteristics.push("multiple-concepts".to_string());
    }
    if question.total_marks >= HIGH_MARKS_MIN {
        characteristics.push("high-marks".to_string());
    }

    QuestionFeatures {
        difficulty,
        difficulty_score: score,
        styles,
        complexity,
        estimated_minutes,
        characteristics,
    }
}

fn difficulty_score(
    marks: u32,
    parts: usize,
    tags: usize,
    ms_len: usize,
    hard_verbs: usize,
) -> f64 {
    let capped = |value: f64, cap: f64| (value / cap).min(1.0);
    let score = BASE_SCORE
        + MARKS_WEIGHT * capped(marks as f64, MARKS_CAP)
        + PARTS_WEIGHT * capped(parts as f64, PARTS_CAP)
        + TAGS_WEIGHT * capped(tags as f64, TAGS_CAP)
        + MS_LENGTH_WEIGHT * capped(ms_len as f64, MS_LENGTH_CAP)
        + HARD_VERB_WEIGHT * capped(hard_verbs as f64, HARD_VERB_CAP);
    score.min(1.0)
}

/// Detects every applicable style; defaults to calculation when nothing
/// else fires, since bare numeric questions carry no style cue words.
fn detect_styles(text: &str) -> Vec<Style> {
    let mut styles = Vec::new();
    if APPLICATION_VERBS.is_match(text) || FORMULA_SHAPE.is_match(text) {
        styles.push(Style::Calculation);
    }
    if text.contains("explain") || text.contains("describe") || text.contains("suggest") {
        styles.push(Style::Explanation);
    }
    if text.contains("diagram") || text.contains("graph") || text.contains("sketch") {
        styles.push(Style::Diagram);
    }
    if text.contains("experiment") || text.contains("apparatus") || text.contains("method") {
        styles.push(Style::Practical);
    }
    if text.contains("compare") || text.contains("difference between") {
        styles.push(Style::Comparison);
    }
    if text.contains("tick one box") || text.contains("circle the correct") {
        styles.push(Style::MultipleChoice);
    }
    if styles.is_empty() {
        styles.push(Style::Calculation);
    }
    styles
}

/// Highest verb family wins. A question that both states and explains is
/// an analysis question.
fn classify_reasoning(text: &str) -> Reasoning {
    if ANALYSIS_VERBS.is_match(text) {
        Reasoning::Analysis
    } else if APPLICATION_VERBS.is_match(text) {
        Reasoning::Application
    } else if RECALL_VERBS.is_match(text) {
        Reasoning::Recall
    } else {
        Reasoning::Application
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SegmentedPart;

    fn question(number: u32, marks: u32, parts: usize, text: &str) -> SegmentedQuestion {
        let make_part = |i: usize| SegmentedPart {
            code: format!("({})", (b'a' + i as u8) as char),
            marks: None,
            bboxes: Vec::new(),
            text: String::new(),
            page_from: 0,
            page_to: 0,
            has_start_marker: true,
        };
        SegmentedQuestion {
            question_number: number,
            total_marks: marks,
            context_text: text.to_string(),
            header_bbox: None,
            header_text: String::new(),
            parts: (0..parts).map(make_part).collect(),
            start_page: 0,
            end_page: 0,
        }
    }

    fn link(snippet: &str) -> MsLink {
        MsLink {
            question_number: 1,
            part_code: String::new(),
            confidence: 1.0,
            ms_snippet: snippet.to_string(),
            match_details: String::new(),
        }
    }

    #[test]
    fn short_recall_question_is_easy() {
        let q = question(1, 1, 0, "State the unit of force.\n");
        let features = extract_features(&q, &[], None);
        assert_eq!(features.difficulty, Difficulty::Easy);
        assert_eq!(features.complexity.reasoning, Reasoning::Recall);
        assert_eq!(features.estimated_minutes, 2);
        assert!(features.characteristics.is_empty());
    }

    #[test]
    fn long_multi_part_question_is_hard() {
        let tags = vec![
            Tag::new("A", 0.8),
            Tag::new("B", 0.6),
            Tag::new("C", 0.5),
        ];
        let q = question(
            4,
            12,
            4,
            "Explain why the current falls. Hence derive the resistance and \
             justify your answer. Then evaluate the design.\n",
        );
        let ms = link(&"m".repeat(900));
        let features = extract_features(&q, &tags, Some(&ms));
        // 0.3 + 0.25*0.6 + 0.15*(4/6) + 0.15*0.6 + 0.15*0.9 + 0.10*1.0 > 0.7
        assert_eq!(features.difficulty, Difficulty::Hard);
        assert_eq!(features.complexity.reasoning, Reasoning::Analysis);
        assert_eq!(features.complexity.concept_count, 3);
        assert_eq!(features.estimated_minutes, 18);
        assert!(features.characteristics.contains(&"multi-step".to_string()));
    }

    #[test]
    fn styles_accumulate() {
        let q = question(
            2,
            4,
            2,
            "Sketch a graph of the results. Describe the experiment and \
             calculate the gradient using v = u at.\n",
        );
        let features = extract_features(&q, &[], None);
        assert!(features.styles.contains(&Style::Diagram));
        assert!(features.styles.contains(&Style::Explanation));
        assert!(features.styles.contains(&Style::Practical));
        assert!(features.styles.contains(&Style::Calculation));
    }

    #[test]
    fn calculation_is_the_default_style() {
        let q = question(3, 2, 0, "What is 3 plus 4?\n");
        let features = extract_features(&q, &[], None);
        assert_eq!(features.styles, vec![Style::Calculation]);
    }

    #[test]
    fn step_count_uses_part_count_as_floor() {
        let q = question(5, 6, 3, "No step words here at all.\n");
        let features = extract_features(&q, &[], None);
        assert_eq!(features.complexity.step_count, 3);
    }

    #[test]
    fn hard_verb_in_mark_scheme_raises_difficulty() {
        let q = question(7, 4, 1, "Calculate the value of x.\n");
        // Same mark-scheme length, so only the verb count differs.
        let plain = extract_features(&q, &[], Some(&link(&"m".repeat(200))));
        let with_verb =
            extract_features(&q, &[], Some(&link(&format!("derive {}", "m".repeat(193)))));
        assert!(with_verb.difficulty_score > plain.difficulty_score);
    }

    #[test]
    fn characteristics_cover_context_and_scale_cues() {
        let tags = vec![Tag::new("ENERGY", 0.8), Tag::new("UNITS", 0.6)];
        let q = question(
            8,
            8,
            2,
            "A student heats a kettle. Convert the energy shown in \
             the table to kilojoules.\n",
        );
        let features = extract_features(&q, &tags, None);
        for expected in [
            "unit-conversion",
            "real-world-context",
            "data-interpretation",
            "multiple-concepts",
            "high-marks",
        ] {
            assert!(
                features.characteristics.contains(&expected.to_string()),
                "missing {expected}"
            );
        }
    }

    #[test]
    fn difficulty_score_is_deterministic_and_bounded() {
        let q = question(6, 200, 20, "explain explain explain derive prove\n");
        let a = extract_features(&q, &[], None);
        let b = extract_features(&q, &[], None);
        assert_eq!(a.difficulty_score, b.difficulty_score);
        assert!(a.difficulty_score <= 1.0);
    }
}
