//! Topic tag records with evidence trails.

use serde::{Deserialize, Serialize};

/// A topic classification with confidence and full provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub topic: String,
    pub subtopic: Option<String>,
    /// In [0, 1].
    pub confidence: f64,
    /// Which stage produced the tag, e.g. "rule:keyword" or "llm".
    pub provenance: Vec<String>,
    /// The specific keywords/formulas/units that fired.
    pub cues: Vec<String>,
}

impl Tag {
    pub fn new(topic: impl Into<String>, confidence: f64) -> Self {
        Self {
            topic: topic.into(),
            subtopic: None,
            confidence: confidence.clamp(0.0, 1.0),
            provenance: Vec::new(),
            cues: Vec::new(),
        }
    }
}
