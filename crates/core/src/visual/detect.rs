//! Region detection for visual crops.
//!
//! Regions come from the segmenter's token geometry; this stage resolves
//! them into one croppable box per question and part. Resolution order per
//! part: manual override, detected bbox envelope, equal split of the
//! question's own region among the parts that missed. A part with no
//! resolvable region becomes a warning, never a failure.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::{BBox, SegmentationWarning, SegmentedQuestion, envelope};

/// Override table format version, bumped whenever the key scheme changes.
pub const OVERRIDE_TABLE_VERSION: &str = "2";

/// Manual bbox overrides for known-hard layouts, keyed by question number
/// and part code (empty code addresses the whole question).
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<(u32, String), BBox>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, question_number: u32, part_code: &str, bbox: BBox) {
        self.entries
            .insert((question_number, part_code.to_string()), bbox);
    }

    pub fn get(&self, question_number: u32, part_code: &str) -> Option<BBox> {
        self.entries
            .get(&(question_number, part_code.to_string()))
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One resolved croppable region.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub question_number: u32,
    /// Empty for the whole-question region.
    pub part_code: String,
    pub bbox: BBox,
}

/// Region detection output: resolved regions plus misses as warnings.
#[derive(Debug, Clone, Default)]
pub struct DetectionOutcome {
    pub regions: Vec<Region>,
    pub warnings: Vec<SegmentationWarning>,
}

/// Resolves croppable regions for every question and part.
pub fn detect_regions(
    questions: &[SegmentedQuestion],
    overrides: &OverrideTable,
) -> DetectionOutcome {
    let mut outcome = DetectionOutcome::default();

    for question in questions {
        let question_region = question_envelope(question, overrides);
        match question_region {
            Some(bbox) => outcome.regions.push(Region {
                question_number: question.question_number,
                part_code: String::new(),
                bbox,
            }),
            None => {
                warn!(
                    question = question.question_number,
                    "no whole-question region"
                );
                outcome.warnings.push(SegmentationWarning::CropUnavailable {
                    question_number: question.question_number,
                    part_code: String::new(),
                });
            }
        }

        // The synthetic whole-question part duplicates the question region.
        let real_parts: Vec<_> = question.parts.iter().filter(|p| !p.code.is_empty()).collect();
        if real_parts.is_empty() {
            continue;
        }

        let mut unresolved = Vec::new();
        for part in &real_parts {
            if let Some(bbox) = overrides.get(question.question_number, &part.code) {
                debug!(
                    question = question.question_number,
                    part = %part.code,
                    "manual override region"
                );
                outcome.regions.push(Region {
                    question_number: question.question_number,
                    part_code: part.code.clone(),
                    bbox,
                });
            } else if let Some(bbox) = envelope(part.bboxes.iter()) {
                outcome.regions.push(Region {
                    question_number: question.question_number,
                    part_code: part.code.clone(),
                    bbox,
                });
            } else {
                unresolved.push(part.code.clone());
            }
        }

        if unresolved.is_empty() {
            continue;
        }
        match question_region {
            Some(parent) => {
                // Last resort: split the parent region equally among the
                // parts that missed, in document order.
                let slice_height = parent.height / real_parts.len() as f64;
                for (index, part) in real_parts.iter().enumerate() {
                    if !unresolved.contains(&part.code) {
                        continue;
                    }
                    debug!(
                        question = question.question_number,
                        part = %part.code,
                        "sibling-split estimated region"
                    );
                    outcome.regions.push(Region {
                        question_number: question.question_number,
                        part_code: part.code.clone(),
                        bbox: BBox::new(
                            parent.page,
                            parent.x,
                            parent.y + slice_height * index as f64,
                            parent.width,
                            slice_height,
                        ),
                    });
                }
            }
            None => {
                for code in unresolved {
                    outcome.warnings.push(SegmentationWarning::CropUnavailable {
                        question_number: question.question_number,
                        part_code: code,
                    });
                }
            }
        }
    }

    outcome
}

/// Whole-question region: override first, else envelope of the header box
/// and every part box on the question's first page.
fn question_envelope(
    question: &SegmentedQuestion,
    overrides: &OverrideTable,
) -> Option<BBox> {
    if let Some(bbox) = overrides.get(question.question_number, "") {
        return Some(bbox);
    }
    let boxes = question
        .header_bbox
        .iter()
        .chain(question.parts.iter().flat_map(|p| p.bboxes.iter()))
        .filter(|b| b.page == question.start_page)
        .copied()
        .collect::<Vec<_>>();
    envelope(boxes.iter())
}
