//! Declarative subject configuration, loaded once per subject from TOML.
//!
//! The on-disk format is a plain table-of-topics file; `load`/`parse`
//! resolve it into the tagged-variant `SubjectConfig` exactly once, so
//! scoring never re-branches on optional sections.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{PipelineError, Result};

use super::rules::{RuleTable, TopicRule, UnitPattern};

/// Identifying subject metadata, carried through to paper outputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubjectInfo {
    pub board: String,
    pub level: String,
    pub code: String,
    pub name: String,
}

/// A per-topic hard confidence floor triggered by symbol presence.
#[derive(Debug, Clone)]
pub struct SymbolFloor {
    pub topic: String,
    /// Literal symbols whose presence forces the floor, e.g. "Ω" or "∫".
    pub symbols: Vec<String>,
    pub floor: f64,
}

/// Resolved subject configuration.
///
/// Two modes as two variants of one sum type, decided at load time:
/// `Simple` tags with keyword rules only and keeps the single best topic;
/// `SymbolAware` adds normalization, symbol floors and LLM escalation.
#[derive(Debug, Clone)]
pub enum SubjectConfig {
    Simple {
        info: SubjectInfo,
        rules: RuleTable,
    },
    SymbolAware {
        info: SubjectInfo,
        rules: RuleTable,
        /// Text normalization applied before scoring, e.g. "ohms" → "Ω".
        normalization: Vec<(String, String)>,
        floors: Vec<SymbolFloor>,
        /// Escalate to the external classifier when the best rule-based
        /// confidence falls below this.
        escalation_threshold: f64,
    },
}

impl SubjectConfig {
    pub fn info(&self) -> &SubjectInfo {
        match self {
            SubjectConfig::Simple { info, .. } | SubjectConfig::SymbolAware { info, .. } => info,
        }
    }

    pub fn rules(&self) -> &RuleTable {
        match self {
            SubjectConfig::Simple { rules, .. } | SubjectConfig::SymbolAware { rules, .. } => rules,
        }
    }

    /// Loads and resolves a subject file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parses and resolves TOML subject configuration.
    pub fn parse(raw: &str) -> Result<Self> {
        let file: SubjectFile = toml::from_str(raw)?;
        file.resolve()
    }
}

// ---------------------------------------------------------------------------
// On-disk format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubjectFile {
    subject: SubjectSection,
    #[serde(default)]
    normalization: Vec<NormalizationEntry>,
    #[serde(default)]
    topics: Vec<TopicEntry>,
}

#[derive(Debug, Deserialize)]
struct SubjectSection {
    board: String,
    level: String,
    code: String,
    name: String,
    #[serde(default)]
    mode: Mode,
    /// Required in symbol-aware mode.
    escalation_threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Mode {
    #[default]
    Simple,
    SymbolAware,
}

#[derive(Debug, Deserialize)]
struct NormalizationEntry {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct TopicEntry {
    id: String,
    #[serde(default)]
    subtopic: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    formulas: Vec<String>,
    #[serde(default)]
    units: Vec<String>,
    #[serde(default)]
    ms_keywords: Vec<String>,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default)]
    symbols: Vec<String>,
    #[serde(default)]
    confidence_floor: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

impl SubjectFile {
    fn resolve(self) -> Result<SubjectConfig> {
        let info = SubjectInfo {
            board: self.subject.board,
            level: self.subject.level,
            code: self.subject.code,
            name: self.subject.name,
        };

        let mut rules = Vec::with_capacity(self.topics.len());
        let mut floors = Vec::new();
        for topic in &self.topics {
            let formulas = topic
                .formulas
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        PipelineError::Config(format!(
                            "topic {}: bad formula pattern {p:?}: {e}",
                            topic.id
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let units = topic
                .units
                .iter()
                .map(|u| UnitPattern::compile(u))
                .collect::<Result<Vec<_>>>()?;
            rules.push(TopicRule {
                topic: topic.id.clone(),
                subtopic: topic.subtopic.clone(),
                keywords: lowercased(&topic.keywords),
                formulas,
                units,
                ms_keywords: lowercased(&topic.ms_keywords),
                weight: topic.weight,
            });
            if let Some(floor) = topic.confidence_floor {
                if !(0.0..=1.0).contains(&floor) {
                    return Err(PipelineError::Config(format!(
                        "topic {}: confidence floor {floor} outside [0, 1]",
                        topic.id
                    )));
                }
                if topic.symbols.is_empty() {
                    return Err(PipelineError::Config(format!(
                        "topic {}: confidence floor without symbols",
                        topic.id
                    )));
                }
                floors.push(SymbolFloor {
                    topic: topic.id.clone(),
                    symbols: topic.symbols.clone(),
                    floor,
                });
            }
        }
        let rules = RuleTable { rules };

        match self.subject.mode {
            Mode::Simple => Ok(SubjectConfig::Simple { info, rules }),
            Mode::SymbolAware => {
                let escalation_threshold = self.subject.escalation_threshold.ok_or_else(|| {
                    PipelineError::Config(
                        "symbol_aware mode requires escalation_threshold".to_string(),
                    )
                })?;
                Ok(SubjectConfig::SymbolAware {
                    info,
                    rules,
                    normalization: self
                        .normalization
                        .into_iter()
                        .map(|n| (n.from, n.to))
                        .collect(),
                    floors,
                    escalation_threshold,
                })
            }
        }
    }
}

fn lowercased(words: &[String]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}
