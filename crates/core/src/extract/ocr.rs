//! OCR extension point for scanned/low-density pages.
//!
//! The pipeline itself ships no OCR engine. Pages whose text density falls
//! below the threshold are flagged and routed here; the stub implementation
//! returns no tokens, which downstream stages treat as an empty page.

use tracing::warn;

use crate::error::Result;
use crate::model::TextItem;

/// Capability for recovering text from a page the extractor could not read.
pub trait OcrEngine: Send + Sync {
    /// Returns positioned tokens for the given page, top-left origin.
    fn recognize(&self, pdf_bytes: &[u8], page_index: usize) -> Result<Vec<TextItem>>;
}

/// The shipped stub: logs and returns no tokens.
#[derive(Debug, Default)]
pub struct StubOcr;

impl OcrEngine for StubOcr {
    fn recognize(&self, _pdf_bytes: &[u8], page_index: usize) -> Result<Vec<TextItem>> {
        warn!(page_index, "OCR requested but not implemented; page yields no tokens");
        Ok(Vec::new())
    }
}
