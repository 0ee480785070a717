//! Content-stream walk: turns a page's operator list into positioned text runs.
//!
//! Only the text-positioning subset of the operator set is interpreted
//! (`BT`/`ET`, `Tf`, `Tm`, `Td`, `TD`, `TL`, `T*`, `Tj`, `TJ`, `'`, `"`).
//! Graphics state, clipping and XObjects are ignored; exam papers are
//! text-first documents and the segmenter only needs token geometry.

use lopdf::content::Content;
use lopdf::{Document, Object};

use crate::error::Result;
use crate::model::TextItem;

/// Average glyph width as a fraction of the font size, used to estimate
/// run widths without font metrics.
pub const AVG_GLYPH_WIDTH: f64 = 0.5;

/// Fallback font size when no `Tf` has been seen before a show operator.
const DEFAULT_FONT_SIZE: f64 = 12.0;

/// Text-positioning state for one content stream.
#[derive(Debug, Clone)]
struct TextState {
    font_size: f64,
    /// Current line origin in bottom-left PDF user space.
    line_x: f64,
    line_y: f64,
    /// Pen x within the current line (advances as strings are shown).
    pen_x: f64,
    leading: f64,
    in_text: bool,
}

impl TextState {
    fn new() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            line_x: 0.0,
            line_y: 0.0,
            pen_x: 0.0,
            leading: 0.0,
            in_text: false,
        }
    }

    fn set_line(&mut self, x: f64, y: f64) {
        self.line_x = x;
        self.line_y = y;
        self.pen_x = x;
    }

    fn translate_line(&mut self, tx: f64, ty: f64) {
        self.set_line(self.line_x + tx, self.line_y + ty);
    }
}

fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

/// Decodes a PDF string as UTF-8 when valid, Latin-1 otherwise.
///
/// Exam papers from the supported boards use simple encodings; CID fonts
/// are out of scope for this extractor.
fn decode_pdf_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Walks one page's content stream and emits positioned text items.
///
/// Coordinates are normalised to a top-left origin using `page_height`.
pub fn items_from_content(
    doc: &Document,
    content_bytes: &[u8],
    page_height: f64,
) -> Result<Vec<TextItem>> {
    let _ = doc; // reserved for font-metric lookups
    let content = Content::decode(content_bytes)?;
    let mut state = TextState::new();
    let mut items = Vec::new();

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => {
                state.in_text = true;
                state.set_line(0.0, 0.0);
            }
            "ET" => state.in_text = false,
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(object_to_f64) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some(l) = operands.first().and_then(object_to_f64) {
                    state.leading = l;
                }
            }
            "Tm" => {
                // Only the translation and vertical scale matter for token
                // geometry; rotation is not produced by the supported boards.
                if operands.len() == 6 {
                    let e = operands.get(4).and_then(object_to_f64).unwrap_or(0.0);
                    let f = operands.get(5).and_then(object_to_f64).unwrap_or(0.0);
                    state.set_line(e, f);
                }
            }
            "Td" => {
                let tx = operands.first().and_then(object_to_f64).unwrap_or(0.0);
                let ty = operands.get(1).and_then(object_to_f64).unwrap_or(0.0);
                state.translate_line(tx, ty);
            }
            "TD" => {
                let tx = operands.first().and_then(object_to_f64).unwrap_or(0.0);
                let ty = operands.get(1).and_then(object_to_f64).unwrap_or(0.0);
                state.leading = -ty;
                state.translate_line(tx, ty);
            }
            "T*" => {
                let leading = state.leading;
                state.translate_line(0.0, -leading);
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show_string(&mut state, bytes, page_height, &mut items);
                }
            }
            "'" => {
                let leading = state.leading;
                state.translate_line(0.0, -leading);
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show_string(&mut state, bytes, page_height, &mut items);
                }
            }
            "\"" => {
                let leading = state.leading;
                state.translate_line(0.0, -leading);
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    show_string(&mut state, bytes, page_height, &mut items);
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = operands.first() {
                    for part in parts {
                        match part {
                            Object::String(bytes, _) => {
                                show_string(&mut state, bytes, page_height, &mut items);
                            }
                            // Kerning adjustments are in thousandths of an em.
                            other => {
                                if let Some(adj) = object_to_f64(other) {
                                    state.pen_x -= adj / 1000.0 * state.font_size;
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(items)
}

fn show_string(state: &mut TextState, bytes: &[u8], page_height: f64, items: &mut Vec<TextItem>) {
    if !state.in_text {
        return;
    }
    let text = decode_pdf_string(bytes);
    if text.is_empty() {
        return;
    }
    let width = text.chars().count() as f64 * state.font_size * AVG_GLYPH_WIDTH;
    let height = state.font_size;
    // Flip the baseline into top-left-origin page space.
    let top = page_height - state.line_y - height;
    items.push(TextItem {
        text,
        x: state.pen_x,
        y: top,
        width,
        height,
        font_size: state.font_size,
    });
    state.pen_x += width;
}
