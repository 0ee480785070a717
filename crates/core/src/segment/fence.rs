//! Fence scan: collects every "Total for Question N = M marks" marker.
//!
//! The ordered fence list is the single source of truth for which question
//! numbers exist: nothing downstream may introduce a question number.

use crate::model::{PageText, QuestionFence};

use super::lines::{Line, build_lines};
use super::patterns::FENCE_RE;

/// A fence plus the extent of its line in the flattened token stream.
///
/// The window for the following question starts after `line_end`, so no
/// trailing fence-line token can leak into the next question's span.
#[derive(Debug, Clone, Copy)]
pub struct ScannedFence {
    pub fence: QuestionFence,
    pub line_end: usize,
}

/// Scans the full token stream once and returns fences in stream order.
pub fn scan_fences_full(pages: &[PageText]) -> Vec<ScannedFence> {
    scan_lines(&build_lines(pages))
}

fn scan_lines(lines: &[Line]) -> Vec<ScannedFence> {
    let mut fences = Vec::new();
    for line in lines {
        if let Some(caps) = FENCE_RE.captures(&line.text) {
            let question_number: u32 = caps[1].parse().unwrap_or(0);
            let total_marks: u32 = caps[2].parse().unwrap_or(0);
            if question_number == 0 {
                continue;
            }
            fences.push(ScannedFence {
                fence: QuestionFence {
                    question_number,
                    total_marks,
                    page_index: line.page,
                    text_index: line.first_token,
                },
                line_end: line.last_token,
            });
        }
    }
    fences
}

/// Public fence list, without internal line bookkeeping.
pub fn scan_fences(pages: &[PageText]) -> Vec<QuestionFence> {
    scan_fences_full(pages).into_iter().map(|s| s.fence).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextItem;

    fn item(text: &str, x: f64, y: f64) -> TextItem {
        TextItem {
            text: text.to_string(),
            x,
            y,
            width: text.len() as f64 * 5.0,
            height: 10.0,
            font_size: 10.0,
        }
    }

    fn page(index: usize, items: Vec<TextItem>) -> PageText {
        let density = PageText::density_of(&items);
        PageText {
            index,
            width: 595.0,
            height: 842.0,
            items,
            density,
            ocr_used: false,
        }
    }

    #[test]
    fn finds_fence_split_across_tokens() {
        let pages = vec![page(
            0,
            vec![
                item("intro", 50.0, 100.0),
                item("(Total for Question", 200.0, 400.0),
                item("1 = 8 marks)", 320.0, 400.0),
            ],
        )];
        let scanned = scan_fences_full(&pages);
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].fence.question_number, 1);
        assert_eq!(scanned[0].fence.total_marks, 8);
        assert_eq!(scanned[0].fence.text_index, 1);
        assert_eq!(scanned[0].line_end, 2);
    }

    #[test]
    fn fences_ordered_across_pages() {
        let pages = vec![
            page(0, vec![item("(Total for Question 1 = 8 marks)", 200.0, 700.0)]),
            page(1, vec![item("(Total for Question 2 = 4 marks)", 200.0, 300.0)]),
        ];
        let fences = scan_fences(&pages);
        assert_eq!(fences.len(), 2);
        assert_eq!(fences[0].question_number, 1);
        assert_eq!(fences[0].page_index, 0);
        assert_eq!(fences[1].question_number, 2);
        assert_eq!(fences[1].page_index, 1);
    }

    #[test]
    fn no_fences_in_plain_text() {
        let pages = vec![page(0, vec![item("The total charge for questions", 50.0, 100.0)])];
        assert!(scan_fences(&pages).is_empty());
    }
}
