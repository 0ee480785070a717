//! Fence-based segmentation: partitions the token stream into questions
//! and parts.
//!
//! Fences are hard boundaries. Each question's search window is the span
//! between the previous fence's line and its own fence, so no part or stem
//! span can ever cross a fence; the invariant holds by construction, not
//! by a post-hoc check.

use tracing::{debug, warn};

use crate::model::{
    BBox, PageText, SegmentationWarning, SegmentedPart, SegmentedQuestion, TokenRef, envelope,
    flatten, resolve,
};

use super::fence::scan_fences_full;
use super::patterns::{
    BBOX_PADDING, CAPITALIZED_WORD_RE, FOOTER_BAND, HEADER_LOOKAHEAD_TOKENS, HEADER_NUMBER_RE,
    LEFT_MARGIN_MAX, LINE_TOLERANCE, MARKS_MIN_X, PART_MARKER_RE, PART_MARKS_RE, SUBPART_MARKER_RE,
    SUBPART_MIN_INDENT,
};

/// Result of segmenting one paper: valid questions plus accumulated
/// warnings. Segmentation never fails outright for a malformed question.
#[derive(Debug, Clone, Default)]
pub struct SegmentationOutcome {
    pub questions: Vec<SegmentedQuestion>,
    pub warnings: Vec<SegmentationWarning>,
}

/// Segments a full paper. Deterministic: identical input pages yield an
/// identical outcome.
pub fn segment(pages: &[PageText]) -> SegmentationOutcome {
    let stream = flatten(pages);
    let scanned = scan_fences_full(pages);
    let mut outcome = SegmentationOutcome::default();

    let mut window_start = 0usize;
    for s in &scanned {
        let window = window_start..s.fence.text_index;
        match build_question(pages, &stream, window, s.fence) {
            Some((question, mut warnings)) => {
                debug!(
                    question = question.question_number,
                    parts = question.parts.len(),
                    "segmented question"
                );
                outcome.questions.push(question);
                outcome.warnings.append(&mut warnings);
            }
            None => {
                warn!(
                    question = s.fence.question_number,
                    "header not found in fence window; question dropped"
                );
                outcome.warnings.push(SegmentationWarning::HeaderNotFound {
                    question_number: s.fence.question_number,
                });
            }
        }
        window_start = s.line_end + 1;
    }
    outcome
}

/// A detected part or sub-part marker inside a question window.
#[derive(Debug, Clone)]
struct Marker {
    /// Flattened-stream index of the marker token.
    idx: usize,
    code: String,
}

fn build_question(
    pages: &[PageText],
    stream: &[TokenRef],
    window: std::ops::Range<usize>,
    fence: crate::model::QuestionFence,
) -> Option<(SegmentedQuestion, Vec<SegmentationWarning>)> {
    let header_idx = find_header(pages, stream, window.clone(), fence.question_number)?;
    let markers = find_markers(pages, stream, header_idx + 1..window.end);

    let mut warnings = Vec::new();
    let header_page = stream[header_idx].page;

    let (header_text, header_bbox, parts) = if markers.is_empty() {
        // Zero part markers: the entire window becomes one part with an
        // empty code and marks equal to the fence's total.
        let part = build_part(
            pages,
            stream,
            header_idx..window.end,
            String::new(),
            Some(fence.total_marks),
            false,
        );
        (String::new(), None, vec![part])
    } else {
        let stem_range = header_idx..markers[0].idx;
        let header_text = block_text(pages, stream, stem_range.clone());
        let header_bbox =
            span_bboxes(pages, stream, stem_range).into_iter().next();

        let mut parts = Vec::with_capacity(markers.len());
        for (i, marker) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map_or(window.end, |m| m.idx);
            let marks = find_part_marks(pages, stream, marker.idx..end);
            parts.push(build_part(
                pages,
                stream,
                marker.idx..end,
                marker.code.clone(),
                marks,
                true,
            ));
        }
        (header_text, header_bbox, parts)
    };

    // contextText is always stem + all parts, concatenated in order; this
    // full-context text is what downstream tagging and features operate on.
    let mut context_text = header_text.clone();
    for part in &parts {
        context_text.push_str(&part.text);
    }

    let question = SegmentedQuestion {
        question_number: fence.question_number,
        total_marks: fence.total_marks,
        context_text,
        header_bbox,
        header_text,
        parts,
        start_page: header_page,
        end_page: fence.page_index,
    };

    if question.parts.iter().any(|p| p.has_start_marker) {
        if let Some(part_sum) = question.declared_part_marks() {
            if part_sum != question.total_marks {
                warn!(
                    question = question.question_number,
                    part_sum,
                    total = question.total_marks,
                    "part marks do not reconcile with fence total"
                );
                warnings.push(SegmentationWarning::MarkMismatch {
                    question_number: question.question_number,
                    total_marks: question.total_marks,
                    part_sum,
                });
            }
        }
    }

    Some((question, warnings))
}

/// Locates the question header inside the window: a token matching the
/// question number, at the left margin, standing alone or followed within
/// a few tokens by a capitalized word.
fn find_header(
    pages: &[PageText],
    stream: &[TokenRef],
    window: std::ops::Range<usize>,
    question_number: u32,
) -> Option<usize> {
    for idx in window.clone() {
        let token = stream[idx];
        let item = resolve(pages, token);
        let page = &pages[token.page];

        if item.x >= LEFT_MARGIN_MAX {
            continue;
        }
        // Page numbers live in the footer band.
        if item.y > page.height - FOOTER_BAND {
            continue;
        }
        let Some(caps) = HEADER_NUMBER_RE.captures(item.text.trim()) else {
            continue;
        };
        if caps[1].parse::<u32>().ok() != Some(question_number) {
            continue;
        }
        if header_confirmed(pages, stream, &window, idx) {
            return Some(idx);
        }
    }
    None
}

/// A header number is confirmed when it stands alone on its line or is
/// followed within `HEADER_LOOKAHEAD_TOKENS` by a capitalized word.
fn header_confirmed(
    pages: &[PageText],
    stream: &[TokenRef],
    window: &std::ops::Range<usize>,
    idx: usize,
) -> bool {
    let token = stream[idx];
    let item = resolve(pages, token);

    let mut saw_same_line_token = false;
    for next_idx in idx + 1..(idx + 1 + HEADER_LOOKAHEAD_TOKENS).min(window.end) {
        let next = stream[next_idx];
        if next.page != token.page {
            break;
        }
        let next_item = resolve(pages, next);
        if (next_item.y - item.y).abs() > LINE_TOLERANCE {
            break;
        }
        saw_same_line_token = true;
        if CAPITALIZED_WORD_RE.is_match(next_item.text.trim_start()) {
            return true;
        }
    }
    // Standing alone: nothing else on the header's line.
    !saw_same_line_token
}

/// Scans a span for part `(a)`–`(h)` and sub-part `(i)`–`(viii)` markers.
///
/// Sub-parts count only when indented further than their enclosing part.
fn find_markers(
    pages: &[PageText],
    stream: &[TokenRef],
    span: std::ops::Range<usize>,
) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut current_part: Option<(String, f64)> = None;

    for idx in span {
        let item = resolve(pages, stream[idx]);
        let text = item.text.trim();

        if item.x < LEFT_MARGIN_MAX && PART_MARKER_RE.is_match(text) {
            current_part = Some((text.to_string(), item.x));
            markers.push(Marker {
                idx,
                code: text.to_string(),
            });
        } else if let Some((part_code, part_x)) = &current_part {
            if SUBPART_MARKER_RE.is_match(text) && item.x >= part_x + SUBPART_MIN_INDENT {
                markers.push(Marker {
                    idx,
                    code: format!("{part_code}{text}"),
                });
            }
        }
    }
    markers
}

/// The last right-aligned `(N)` token in a part span, if any.
fn find_part_marks(
    pages: &[PageText],
    stream: &[TokenRef],
    span: std::ops::Range<usize>,
) -> Option<u32> {
    let mut marks = None;
    for idx in span {
        let item = resolve(pages, stream[idx]);
        if item.x < MARKS_MIN_X {
            continue;
        }
        if let Some(caps) = PART_MARKS_RE.captures(item.text.trim()) {
            marks = caps[1].parse().ok();
        }
    }
    marks
}

fn build_part(
    pages: &[PageText],
    stream: &[TokenRef],
    span: std::ops::Range<usize>,
    code: String,
    marks: Option<u32>,
    has_start_marker: bool,
) -> SegmentedPart {
    let page_from = stream
        .get(span.start)
        .map_or(0, |t| t.page);
    let page_to = span
        .end
        .checked_sub(1)
        .and_then(|i| stream.get(i))
        .map_or(page_from, |t| t.page);
    SegmentedPart {
        code,
        marks,
        bboxes: span_bboxes(pages, stream, span.clone()),
        text: block_text(pages, stream, span),
        page_from,
        page_to,
        has_start_marker,
    }
}

/// Token texts joined with spaces, terminated by a newline. Empty spans
/// yield an empty string so concatenation stays exact.
fn block_text(pages: &[PageText], stream: &[TokenRef], span: std::ops::Range<usize>) -> String {
    let mut out = String::new();
    for idx in span {
        let item = resolve(pages, stream[idx]);
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(item.text.trim());
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Min/max envelope of the span's token extents per page, padded.
fn span_bboxes(pages: &[PageText], stream: &[TokenRef], span: std::ops::Range<usize>) -> Vec<BBox> {
    let mut per_page: Vec<(usize, Vec<BBox>)> = Vec::new();
    for idx in span {
        let token = stream[idx];
        let item = resolve(pages, token);
        let bbox = item.bbox(token.page);
        let extend = matches!(per_page.last(), Some((page, _)) if *page == token.page);
        if extend {
            if let Some((_, boxes)) = per_page.last_mut() {
                boxes.push(bbox);
            }
        } else {
            per_page.push((token.page, vec![bbox]));
        }
    }
    per_page
        .iter()
        .filter_map(|(_, boxes)| envelope(boxes.iter()).map(|b| b.padded(BBOX_PADDING)))
        .collect()
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

    /// Scenario A fixture: Q1 (8 marks, parts (a) 3 and (b) 5), Q2
    /// (4 marks, no parts).
    fn scenario_a() -> Vec<PageText> {
        vec![
            page(
                0,
                vec![
                    item("1", 40.0, 100.0),
                    item("A circuit contains a resistor.", 60.0, 100.0),
                    item("(a)", 55.0, 130.0),
                    item("Calculate the current.", 80.0, 130.0),
                    item("(3)", 500.0, 160.0),
                    item("(b)", 55.0, 200.0),
                    item("Explain your answer.", 80.0, 200.0),
                    item("(5)", 500.0, 230.0),
                    item("(Total for Question 1 = 8 marks)", 250.0, 300.0),
                    item("2", 40.0, 400.0),
                    item("State Ohm's law.", 60.0, 400.0),
                    item("(Total for Question 2 = 4 marks)", 250.0, 500.0),
                ],
            ),
        ]
    }

    #[test]
    fn scenario_a_segments_two_questions() {
        let outcome = segment(&scenario_a());
        assert_eq!(outcome.questions.len(), 2);
        assert!(outcome.warnings.is_empty());

        let q1 = &outcome.questions[0];
        assert_eq!(q1.question_number, 1);
        assert_eq!(q1.total_marks, 8);
        assert_eq!(q1.parts.len(), 2);
        assert_eq!(q1.parts[0].code, "(a)");
        assert_eq!(q1.parts[0].marks, Some(3));
        assert_eq!(q1.parts[1].code, "(b)");
        assert_eq!(q1.parts[1].marks, Some(5));
        assert!(q1.header_text.contains("circuit"));
        assert!(q1.header_bbox.is_some());

        let q2 = &outcome.questions[1];
        assert_eq!(q2.question_number, 2);
        assert_eq!(q2.parts.len(), 1);
        assert_eq!(q2.parts[0].code, "");
        assert_eq!(q2.parts[0].marks, Some(4));
        assert!(!q2.parts[0].has_start_marker);
    }

    #[test]
    fn context_text_is_exact_concatenation() {
        let outcome = segment(&scenario_a());
        for q in &outcome.questions {
            let mut expected = q.header_text.clone();
            for p in &q.parts {
                expected.push_str(&p.text);
            }
            assert_eq!(q.context_text, expected);
        }
    }

    #[test]
    fn no_span_crosses_a_fence() {
        let outcome = segment(&scenario_a());
        // Q2's text must not contain anything from Q1's window or fence.
        let q2 = &outcome.questions[1];
        assert!(!q2.context_text.contains("Total for Question 1"));
        assert!(!q2.context_text.contains("resistor"));
        // Q1's text must not contain its own fence either.
        let q1 = &outcome.questions[0];
        assert!(!q1.context_text.contains("Total"));
    }

    #[test]
    fn segmentation_is_deterministic() {
        let a = segment(&scenario_a());
        let b = segment(&scenario_a());
        assert_eq!(a.questions, b.questions);
        assert_eq!(a.warnings, b.warnings);
    }

    #[test]
    fn missing_header_drops_question_with_warning() {
        let pages = vec![page(
            0,
            vec![
                // Question number appears only at the right margin (a page
                // number), so the header cannot be confirmed.
                item("3", 500.0, 100.0),
                item("orphan text", 60.0, 130.0),
                item("(Total for Question 3 = 2 marks)", 250.0, 200.0),
                item("4", 40.0, 300.0),
                item("Valid question text.", 60.0, 300.0),
                item("(Total for Question 4 = 2 marks)", 250.0, 400.0),
            ],
        )];
        let outcome = segment(&pages);
        assert_eq!(outcome.questions.len(), 1);
        assert_eq!(outcome.questions[0].question_number, 4);
        assert_eq!(
            outcome.warnings,
            vec![SegmentationWarning::HeaderNotFound { question_number: 3 }]
        );
    }

    #[test]
    fn subpart_requires_indentation() {
        let pages = vec![page(
            0,
            vec![
                item("5", 40.0, 100.0),
                item("Consider the reaction below.", 60.0, 100.0),
                item("(a)", 55.0, 130.0),
                item("Name the product.", 80.0, 130.0),
                item("(i)", 75.0, 160.0),
                item("State its colour.", 95.0, 160.0),
                // Not indented past (a): treated as plain text, not a marker.
                item("(ii)", 55.0, 190.0),
                item("ignored marker", 80.0, 190.0),
                item("(Total for Question 5 = 6 marks)", 250.0, 300.0),
            ],
        )];
        let outcome = segment(&pages);
        let q = &outcome.questions[0];
        let codes: Vec<_> = q.parts.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, ["(a)", "(a)(i)"]);
    }

    #[test]
    fn mark_mismatch_is_warned_not_fatal() {
        let pages = vec![page(
            0,
            vec![
                item("6", 40.0, 100.0),
                item("Questionable arithmetic.", 60.0, 100.0),
                item("(a)", 55.0, 130.0),
                item("First part.", 80.0, 130.0),
                item("(2)", 500.0, 150.0),
                item("(b)", 55.0, 180.0),
                item("Second part.", 80.0, 180.0),
                item("(2)", 500.0, 200.0),
                item("(Total for Question 6 = 5 marks)", 250.0, 300.0),
            ],
        )];
        let outcome = segment(&pages);
        assert_eq!(outcome.questions.len(), 1);
        assert!(outcome.warnings.iter().any(|w| matches!(
            w,
            SegmentationWarning::MarkMismatch {
                question_number: 6,
                total_marks: 5,
                part_sum: 4,
            }
        )));
    }
}
