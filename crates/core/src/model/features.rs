//! Pedagogical feature metadata derived per question.

use serde::{Deserialize, Serialize};

/// Three-band difficulty derived from the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Question style. A question may exhibit several styles at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    Calculation,
    Explanation,
    Diagram,
    Practical,
    Comparison,
    MultipleChoice,
}

/// Three-level reasoning classification from command-verb families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reasoning {
    Recall,
    Application,
    Analysis,
}

/// Structural complexity summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
    /// Number of distinct topic tags on the question.
    pub concept_count: usize,
    /// Max of keyword-based step indicators and part count.
    pub step_count: usize,
    pub reasoning: Reasoning,
}

/// Difficulty, style and complexity metadata for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionFeatures {
    pub difficulty: Difficulty,
    /// In [0, 1].
    pub difficulty_score: f64,
    pub styles: Vec<Style>,
    pub complexity: Complexity,
    /// `ceil(marks * 1.5)`, a documented, intentionally simple heuristic.
    pub estimated_minutes: u32,
    /// Open tag set: multi-step, formula-based, requires-diagram, ...
    pub characteristics: Vec<String>,
}
