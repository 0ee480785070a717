//! Compiled topic rules.
//!
//! Rules arrive as declarative TOML (see `subject`); they are compiled once
//! at load time into this form and treated as read-only for the rest of
//! the run.

use regex::Regex;

use crate::error::{PipelineError, Result};

/// One topic's scoring rule.
#[derive(Debug, Clone)]
pub struct TopicRule {
    pub topic: String,
    pub subtopic: Option<String>,
    /// Plain keywords, matched case-insensitively against the combined text.
    pub keywords: Vec<String>,
    /// Formula patterns, e.g. `V\s*=\s*I\s*R`.
    pub formulas: Vec<Regex>,
    /// Unit symbols; each is compiled to require a preceding number.
    pub units: Vec<UnitPattern>,
    /// Keywords matched only against mark-scheme text. Weighted higher:
    /// mark schemes use more precise vocabulary than question stems.
    pub ms_keywords: Vec<String>,
    /// Overall rule weight applied to the normalized score.
    pub weight: f64,
}

/// A unit symbol plus its compiled "number then unit" matcher.
#[derive(Debug, Clone)]
pub struct UnitPattern {
    pub symbol: String,
    pub re: Regex,
}

impl UnitPattern {
    pub fn compile(symbol: &str) -> Result<Self> {
        let re = Regex::new(&format!(r"\b\d+(?:\.\d+)?\s*{}(?:\b|$)", regex::escape(symbol)))
            .map_err(|e| PipelineError::Config(format!("bad unit pattern {symbol:?}: {e}")))?;
        Ok(Self {
            symbol: symbol.to_string(),
            re,
        })
    }
}

impl TopicRule {
    /// Maximum raw points this rule can score. Zero for a degenerate rule
    /// with no cues at all.
    pub fn max_points(&self) -> f64 {
        use super::scorer::{FORMULA_POINTS, KEYWORD_POINTS, MS_KEYWORD_POINTS, UNIT_POINTS};
        self.keywords.len() as f64 * KEYWORD_POINTS
            + self.formulas.len() as f64 * FORMULA_POINTS
            + self.units.len() as f64 * UNIT_POINTS
            + self.ms_keywords.len() as f64 * MS_KEYWORD_POINTS
    }
}

/// The read-only rule table for one subject, loaded once and shared
/// across concurrent paper runs.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    pub rules: Vec<TopicRule>,
}
