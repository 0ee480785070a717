//! Declarative pattern tables and layout constants for segmentation.
//!
//! Every pattern and margin/threshold constant is named and tested in
//! isolation so paper-format drift can be caught without re-deriving the
//! heuristics. Bump `PATTERN_TABLE_VERSION` whenever a pattern or constant
//! changes meaning.

use once_cell::sync::Lazy;
use regex::Regex;

/// Version stamp for the pattern table as a whole.
pub const PATTERN_TABLE_VERSION: &str = "3";

/// The authoritative end-of-question marker:
/// "Total for Question N = M marks" (also accepts "is" for older papers,
/// with or without surrounding parentheses).
pub static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)total\s+for\s+question\s+(\d{1,2})\s*(?:=|is)\s*(\d{1,3})\s+marks?").unwrap()
});

/// A question-number token: the bare number, optionally followed by a dot.
pub static HEADER_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})\.?$").unwrap());

/// A capitalized word, used to confirm a header number is followed by prose.
pub static CAPITALIZED_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z]").unwrap());

/// Lettered part marker `(a)`–`(h)`.
pub static PART_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(([a-h])\)$").unwrap());

/// Roman sub-part marker `(i)`–`(viii)`.
pub static SUBPART_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\((viii|vii|vi|v|iv|iii|ii|i)\)$").unwrap());

/// Right-aligned per-part mark declaration, e.g. `(3)`.
pub static PART_MARKS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\((\d{1,3})\)$").unwrap());

/// Page-number/footer noise lines in mark schemes.
pub static FOOTER_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(page\s+\d+(\s+of\s+\d+)?|\d{1,3}|[*][\w/]+[*])$").unwrap()
});

/// Mark-scheme opener: a bare question number, optionally followed by a
/// part marker on the same token, e.g. "3", "3.", "3(a)".
pub static MS_OPENER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[.)]?(\(([a-h])\))?$").unwrap());

/// Header numbers and part markers must start left of this x (points).
/// Rejects page numbers and footers appearing mid-text.
pub const LEFT_MARGIN_MAX: f64 = 90.0;

/// Mark-scheme openers sit in a wider left column than QP headers.
pub const MS_LEFT_MARGIN_MAX: f64 = 110.0;

/// A sub-part marker must be indented at least this far past its
/// enclosing part marker's x origin.
pub const SUBPART_MIN_INDENT: f64 = 10.0;

/// How many tokens after a header number to look for a capitalized word.
pub const HEADER_LOOKAHEAD_TOKENS: usize = 4;

/// Padding applied to every header/part bbox envelope (points).
pub const BBOX_PADDING: f64 = 4.0;

/// Tokens whose y differs by no more than this are on the same line.
pub const LINE_TOLERANCE: f64 = 3.0;

/// Height of the bottom strip treated as the footer band (points).
pub const FOOTER_BAND: f64 = 50.0;

/// Per-part mark declarations are right-aligned; require at least this x.
pub const MARKS_MIN_X: f64 = 380.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_matches_both_forms() {
        let caps = FENCE_RE.captures("(Total for Question 3 = 8 marks)").unwrap();
        assert_eq!(&caps[1], "3");
        assert_eq!(&caps[2], "8");

        let caps = FENCE_RE.captures("Total for Question 12 is 4 marks").unwrap();
        assert_eq!(&caps[1], "12");
        assert_eq!(&caps[2], "4");
    }

    #[test]
    fn fence_rejects_part_totals() {
        assert!(FENCE_RE.captures("Total for part (a) = 3 marks").is_none());
    }

    #[test]
    fn header_number_with_optional_dot() {
        assert_eq!(&HEADER_NUMBER_RE.captures("7").unwrap()[1], "7");
        assert_eq!(&HEADER_NUMBER_RE.captures("7.").unwrap()[1], "7");
        assert!(HEADER_NUMBER_RE.captures("7a").is_none());
        assert!(HEADER_NUMBER_RE.captures("123").is_none());
    }

    #[test]
    fn part_and_subpart_markers_are_disjoint() {
        assert!(PART_MARKER_RE.is_match("(a)"));
        assert!(PART_MARKER_RE.is_match("(h)"));
        assert!(!PART_MARKER_RE.is_match("(i)"));
        assert!(!PART_MARKER_RE.is_match("(x)"));

        assert!(SUBPART_MARKER_RE.is_match("(i)"));
        assert!(SUBPART_MARKER_RE.is_match("(viii)"));
        assert!(!SUBPART_MARKER_RE.is_match("(a)"));
        assert!(!SUBPART_MARKER_RE.is_match("(ix)"));
    }

    #[test]
    fn subpart_alternation_prefers_longest() {
        assert_eq!(&SUBPART_MARKER_RE.captures("(iii)").unwrap()[1], "iii");
        assert_eq!(&SUBPART_MARKER_RE.captures("(vii)").unwrap()[1], "vii");
    }

    #[test]
    fn part_marks_token() {
        assert_eq!(&PART_MARKS_RE.captures("(3)").unwrap()[1], "3");
        assert!(PART_MARKS_RE.captures("(a)").is_none());
    }

    #[test]
    fn ms_opener_forms() {
        let caps = MS_OPENER_RE.captures("5").unwrap();
        assert_eq!(&caps[1], "5");
        assert!(caps.get(3).is_none());

        let caps = MS_OPENER_RE.captures("5(b)").unwrap();
        assert_eq!(&caps[1], "5");
        assert_eq!(&caps[3], "b");

        assert!(MS_OPENER_RE.captures("5x").is_none());
    }

    #[test]
    fn footer_noise_lines() {
        assert!(FOOTER_NOISE_RE.is_match("Page 3 of 12"));
        assert!(FOOTER_NOISE_RE.is_match("14"));
        assert!(FOOTER_NOISE_RE.is_match("*P51444A*"));
        assert!(!FOOTER_NOISE_RE.is_match("The current is 3 A"));
    }
}
