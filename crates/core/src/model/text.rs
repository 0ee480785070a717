//! Position-annotated text tokens produced by the extraction layer.

use serde::{Deserialize, Serialize};

use super::geometry::BBox;

/// One rendered text run with top-left-origin page coordinates.
///
/// Immutable once produced for a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
}

impl TextItem {
    /// The item's extent as a page-space box.
    pub fn bbox(&self, page: usize) -> BBox {
        BBox::new(page, self.x, self.y, self.width, self.height)
    }
}

/// All text runs for a single page, plus page dimensions and the
/// text-density metric used for the OCR-fallback decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// Zero-based page index.
    pub index: usize,
    /// Page width in points.
    pub width: f64,
    /// Page height in points.
    pub height: f64,
    /// Text runs in reading order (top-to-bottom, left-to-right).
    pub items: Vec<TextItem>,
    /// Non-whitespace character count across all items.
    pub density: usize,
    /// True when density fell below the threshold and the page was routed
    /// to the OCR extension point.
    pub ocr_used: bool,
}

impl PageText {
    /// Computes the density metric for a set of items.
    pub fn density_of(items: &[TextItem]) -> usize {
        items
            .iter()
            .map(|i| i.text.chars().filter(|c| !c.is_whitespace()).count())
            .sum()
    }
}

/// A token's address in the flattened, cross-page token stream.
///
/// Segmentation operates on a single ordered stream over all pages; this
/// keeps fence windows well-defined across page breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRef {
    pub page: usize,
    pub item: usize,
}

/// Flattens pages into one ordered token stream.
///
/// Items are assumed already sorted in reading order within each page.
pub fn flatten(pages: &[PageText]) -> Vec<TokenRef> {
    let mut out = Vec::with_capacity(pages.iter().map(|p| p.items.len()).sum());
    for page in pages {
        for item in 0..page.items.len() {
            out.push(TokenRef {
                page: page.index,
                item,
            });
        }
    }
    out
}

/// Resolves a token reference against the extracted pages.
pub fn resolve<'a>(pages: &'a [PageText], token: TokenRef) -> &'a TextItem {
    &pages[token.page].items[token.item]
}
