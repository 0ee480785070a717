//! Markscheme Parser & Linker: segments the companion document and maps
//! its text to the question paper's fence-derived numbering.
//!
//! Question-level granularity: a line opens a new question when it starts
//! with a bare number (or number plus part marker) at the left margin and
//! that number exists in the QP's fence list. Everything until the next
//! opener accumulates into the question's snippet, with page-number and
//! footer noise excluded. The `MsLink` type carries fractional confidence
//! so part-level matching strategies can land without changing callers.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{MsLink, PageText, QuestionFence};
use crate::segment::lines::{Line, build_lines};
use crate::segment::patterns::{FOOTER_NOISE_RE, MS_LEFT_MARGIN_MAX, MS_OPENER_RE};

/// Links the mark scheme to every fenced question number.
///
/// Every fence yields exactly one link; questions with no detected opener
/// get a zero-confidence, empty-snippet link rather than being omitted, so
/// consumers can distinguish "not found" from "absent from input".
pub fn link_markscheme(ms_pages: &[PageText], fences: &[QuestionFence]) -> Vec<MsLink> {
    let lines = build_lines(ms_pages);
    let known: Vec<u32> = fences.iter().map(|f| f.question_number).collect();

    // Accumulate snippet text per opened question number, in scan order.
    let mut snippets: BTreeMap<u32, String> = BTreeMap::new();
    let mut current: Option<u32> = None;

    for line in &lines {
        if is_noise(ms_pages, line) {
            continue;
        }
        if let Some((number, rest)) = opener(ms_pages, line, &known) {
            current = Some(number);
            let snippet = snippets.entry(number).or_default();
            if !rest.is_empty() {
                push_line(snippet, rest);
            }
            continue;
        }
        if let Some(number) = current {
            push_line(snippets.entry(number).or_default(), &line.text);
        }
    }

    fences
        .iter()
        .map(|fence| match snippets.get(&fence.question_number) {
            Some(snippet) if !snippet.trim().is_empty() => {
                debug!(question = fence.question_number, "markscheme linked");
                MsLink {
                    question_number: fence.question_number,
                    part_code: String::new(),
                    confidence: 1.0,
                    ms_snippet: snippet.clone(),
                    match_details: "opener at left margin".to_string(),
                }
            }
            _ => {
                debug!(question = fence.question_number, "no markscheme opener");
                MsLink::not_found(fence.question_number)
            }
        })
        .collect()
}

/// Checks whether a line opens a known question; returns the number and
/// any text after the opener token.
fn opener<'a>(pages: &[PageText], line: &'a Line, known: &[u32]) -> Option<(u32, &'a str)> {
    let first_x = first_token_x(pages, line);
    if first_x >= MS_LEFT_MARGIN_MAX {
        return None;
    }
    let (head, rest) = match line.text.split_once(' ') {
        Some((h, r)) => (h, r),
        None => (line.text.as_str(), ""),
    };
    let caps = MS_OPENER_RE.captures(head)?;
    let number: u32 = caps[1].parse().ok()?;
    if !known.contains(&number) {
        return None;
    }
    Some((number, rest))
}

/// Footer/page-number noise: matches the noise pattern, or any bare short
/// line sitting in the page's footer band.
fn is_noise(pages: &[PageText], line: &Line) -> bool {
    let page = &pages[line.page];
    let in_footer = line.y > page.height - crate::segment::patterns::FOOTER_BAND;
    if in_footer {
        return true;
    }
    // A bare number above the footer band could be an opener; only the
    // explicitly noisy shapes are dropped here.
    FOOTER_NOISE_RE.is_match(line.text.trim()) && !MS_OPENER_RE.is_match(line.text.trim())
}

fn first_token_x(pages: &[PageText], line: &Line) -> f64 {
    // Lines are built in stream order; recover the first token's x from
    // the page items by scanning the line's y band.
    pages[line.page]
        .items
        .iter()
        .filter(|i| (i.y - line.y).abs() <= crate::segment::patterns::LINE_TOLERANCE)
        .map(|i| i.x)
        .fold(f64::INFINITY, f64::min)
}

fn push_line(snippet: &mut String, text: &str) {
    if !snippet.is_empty() {
        snippet.push('\n');
    }
    snippet.push_str(text.trim());
}
