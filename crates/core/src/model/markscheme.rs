//! Mark-scheme link records.

use serde::{Deserialize, Serialize};

/// The linked mark-scheme text for a question (or part).
///
/// Zero confidence means "no link found" and always pairs with an empty
/// snippet; the two states are distinguishable from "absent from input"
/// because every fenced question produces exactly one link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsLink {
    pub question_number: u32,
    /// Empty for question-level links. Reserved for part-level matching
    /// strategies; present so callers need no change when those land.
    pub part_code: String,
    /// In [0, 1]. The current linker emits 1.0 (opener found) or 0.0.
    pub confidence: f64,
    pub ms_snippet: String,
    /// Human-readable description of how the match was made.
    pub match_details: String,
}

impl MsLink {
    /// A zero-confidence link for a question with no detected opener.
    pub fn not_found(question_number: u32) -> Self {
        Self {
            question_number,
            part_code: String::new(),
            confidence: 0.0,
            ms_snippet: String::new(),
            match_details: "no opener detected".to_string(),
        }
    }
}
