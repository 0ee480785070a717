//! Segmented question structures: fences, parts and questions.

use serde::{Deserialize, Serialize};

use super::geometry::BBox;

/// An authoritative "Total for Question N = M marks" marker.
///
/// The ordered fence list is the single source of truth for which question
/// numbers exist in a paper and where each question ends. Nothing else may
/// introduce a question number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionFence {
    pub question_number: u32,
    pub total_marks: u32,
    /// Page on which the fence line appears.
    pub page_index: usize,
    /// Index of the fence's first token in the flattened token stream.
    pub text_index: usize,
}

/// A lettered/numbered sub-question, e.g. `(a)` or `(a)(i)`.
///
/// An empty `code` represents "whole question, no parts".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedPart {
    pub code: String,
    /// Marks declared for this part, when the paper states them explicitly.
    pub marks: Option<u32>,
    pub bboxes: Vec<BBox>,
    pub text: String,
    pub page_from: usize,
    pub page_to: usize,
    /// False for the synthetic whole-question part of a partless question.
    pub has_start_marker: bool,
}

/// One fenced question with its stem, parts and page span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedQuestion {
    pub question_number: u32,
    pub total_marks: u32,
    /// Stem plus every part's text, concatenated in order. This is the
    /// text downstream tagging and feature extraction operate on.
    pub context_text: String,
    pub header_bbox: Option<BBox>,
    /// The stem: introductory text before the first part marker.
    pub header_text: String,
    pub parts: Vec<SegmentedPart>,
    pub start_page: usize,
    pub end_page: usize,
}

impl SegmentedQuestion {
    /// Sum of explicitly declared part marks, when every part declares one.
    pub fn declared_part_marks(&self) -> Option<u32> {
        self.parts.iter().map(|p| p.marks).sum()
    }
}

/// A warning recorded while processing a single paper.
///
/// Warnings never abort a run; valid questions are still returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentationWarning {
    /// No header token could be located inside a fence's window; the
    /// question was dropped.
    HeaderNotFound { question_number: u32 },
    /// Declared part marks do not reconcile with the fence total.
    MarkMismatch {
        question_number: u32,
        total_marks: u32,
        part_sum: u32,
    },
    /// A page fell below the density threshold and OCR is not implemented.
    OcrStub { page_index: usize },
    /// No region could be located or rendered for a question or part.
    CropUnavailable {
        question_number: u32,
        part_code: String,
    },
}

impl std::fmt::Display for SegmentationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentationWarning::HeaderNotFound { question_number } => {
                write!(f, "question {question_number}: header not found, dropped")
            }
            SegmentationWarning::MarkMismatch {
                question_number,
                total_marks,
                part_sum,
            } => write!(
                f,
                "question {question_number}: part marks sum to {part_sum}, fence says {total_marks}"
            ),
            SegmentationWarning::OcrStub { page_index } => {
                write!(f, "page {page_index}: low text density, OCR not implemented")
            }
            SegmentationWarning::CropUnavailable {
                question_number,
                part_code,
            } => {
                if part_code.is_empty() {
                    write!(f, "question {question_number}: no crop available")
                } else {
                    write!(f, "question {question_number}{part_code}: no crop available")
                }
            }
        }
    }
}
