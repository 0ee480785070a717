//! Grouping of the flattened token stream into visual lines.
//!
//! Fence and opener patterns span several tokens, so pattern matching runs
//! against joined line text while boundary bookkeeping stays token-accurate.

use crate::model::{PageText, flatten, resolve};

use super::patterns::LINE_TOLERANCE;

/// One visual line: consecutive same-page tokens whose y differ by at most
/// `LINE_TOLERANCE`, in reading order.
#[derive(Debug, Clone)]
pub struct Line {
    pub page: usize,
    /// y of the line's first token (top-left origin).
    pub y: f64,
    /// Token texts joined with single spaces.
    pub text: String,
    /// Flattened-stream index of the first token.
    pub first_token: usize,
    /// Flattened-stream index of the last token.
    pub last_token: usize,
}

/// Builds lines over the flattened stream of all pages.
pub fn build_lines(pages: &[PageText]) -> Vec<Line> {
    let stream = flatten(pages);
    let mut lines: Vec<Line> = Vec::new();

    for (idx, token) in stream.iter().enumerate() {
        let item = resolve(pages, *token);
        let extend = matches!(
            lines.last(),
            Some(line) if line.page == token.page && (item.y - line.y).abs() <= LINE_TOLERANCE
        );
        if extend {
            if let Some(line) = lines.last_mut() {
                line.text.push(' ');
                line.text.push_str(&item.text);
                line.last_token = idx;
            }
        } else {
            lines.push(Line {
                page: token.page,
                y: item.y,
                text: item.text.clone(),
                first_token: idx,
                last_token: idx,
            });
        }
    }
    lines
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
            width: 10.0,
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
    fn joins_same_line_splits_on_y_jump() {
        let pages = vec![page(
            0,
            vec![
                item("Total", 50.0, 100.0),
                item("for", 80.0, 101.0),
                item("Question", 100.0, 100.5),
                item("Next", 50.0, 120.0),
            ],
        )];
        let lines = build_lines(&pages);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Total for Question");
        assert_eq!(lines[0].first_token, 0);
        assert_eq!(lines[0].last_token, 2);
        assert_eq!(lines[1].text, "Next");
    }

    #[test]
    fn never_joins_across_pages() {
        let pages = vec![
            page(0, vec![item("end", 50.0, 800.0)]),
            page(1, vec![item("start", 50.0, 800.0)]),
        ];
        let lines = build_lines(&pages);
        assert_eq!(lines.len(), 2);
    }
}
