//! Text Extraction Layer: PDF bytes in, position-annotated tokens out.
//!
//! A pure transform with no side effects beyond logging. Each page yields its
//! dimensions, its tokens in reading order, and a text-density metric that
//! drives the OCR-fallback decision.

pub mod content;
pub mod ocr;

use lopdf::{Document, Object};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::{PageText, TextItem};

pub use ocr::{OcrEngine, StubOcr};

/// Pages with fewer non-whitespace characters than this are treated as
/// scanned and routed to the OCR extension point.
pub const MIN_PAGE_DENSITY: usize = 40;

/// Default page size (A4 portrait, points) when a page carries no MediaBox.
const DEFAULT_PAGE_SIZE: (f64, f64) = (595.0, 842.0);

/// Extracts every page of a PDF with the stub OCR engine.
pub fn extract_pages(pdf_bytes: &[u8]) -> Result<Vec<PageText>> {
    extract_pages_with_ocr(pdf_bytes, &StubOcr)
}

/// Extracts every page, delegating low-density pages to `ocr`.
pub fn extract_pages_with_ocr(pdf_bytes: &[u8], ocr: &dyn OcrEngine) -> Result<Vec<PageText>> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| PipelineError::Extraction(format!("cannot parse PDF: {e}")))?;

    let mut pages = Vec::new();
    for (index, (_, page_id)) in doc.get_pages().into_iter().enumerate() {
        let (width, height) = page_dimensions(&doc, page_id);
        let content_bytes = doc.get_page_content(page_id).unwrap_or_default();
        let mut items = content::items_from_content(&doc, &content_bytes, height)?;
        sort_reading_order(&mut items);

        let density = PageText::density_of(&items);
        let mut ocr_used = false;
        if density < MIN_PAGE_DENSITY {
            ocr_used = true;
            items = ocr.recognize(pdf_bytes, index)?;
            sort_reading_order(&mut items);
        }
        let density = PageText::density_of(&items);

        debug!(page = index, tokens = items.len(), density, ocr_used, "extracted page");
        pages.push(PageText {
            index,
            width,
            height,
            items,
            density,
            ocr_used,
        });
    }
    Ok(pages)
}

/// Sorts tokens top-to-bottom, then left-to-right.
///
/// Stable sort, so extraction order breaks exact ties deterministically.
fn sort_reading_order(items: &mut [TextItem]) {
    items.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
}

/// Resolves a page's MediaBox, walking up the page tree for inherited values.
fn page_dimensions(doc: &Document, page_id: lopdf::ObjectId) -> (f64, f64) {
    let mut current = Some(page_id);
    // Bounded walk; malformed parent loops must not hang extraction.
    for _ in 0..32 {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
            break;
        };
        if let Ok(obj) = dict.get(b"MediaBox") {
            let obj = match obj {
                Object::Reference(r) => match doc.get_object(*r) {
                    Ok(o) => o,
                    Err(_) => break,
                },
                other => other,
            };
            if let Ok(arr) = obj.as_array() {
                if let Some(rect) = media_box_from_array(arr) {
                    return rect;
                }
            }
            break;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|o| o.as_reference().ok());
    }
    DEFAULT_PAGE_SIZE
}

fn media_box_from_array(arr: &[Object]) -> Option<(f64, f64)> {
    if arr.len() != 4 {
        return None;
    }
    let v: Vec<f64> = arr
        .iter()
        .filter_map(|o| match o {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(f) => Some(f64::from(*f)),
            _ => None,
        })
        .collect();
    if v.len() != 4 {
        return None;
    }
    Some(((v[2] - v[0]).abs(), (v[3] - v[1]).abs()))
}
