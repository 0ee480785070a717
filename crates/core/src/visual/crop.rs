//! Rendering and cropping of detected regions into hashed PNG bitmaps.
//!
//! Page rasterisation is injected through `Rasterizer` so the core stays
//! free of native rendering dependencies; the pdfium-backed implementation
//! lives behind the `render` feature.

use std::collections::HashMap;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::Result;
use crate::model::{SegmentationWarning, VisualCrop};

use super::detect::Region;

/// Renders one page of a PDF to a bitmap at the given DPI.
pub trait Rasterizer: Send + Sync {
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize, dpi: f64) -> Result<DynamicImage>;
}

/// Cropping output: encoded crops plus render misses as warnings.
#[derive(Debug, Clone, Default)]
pub struct CropOutcome {
    pub crops: Vec<VisualCrop>,
    pub warnings: Vec<SegmentationWarning>,
}

/// Crops every region out of its rendered page.
///
/// Pages are rendered at most once each. A page that fails to render
/// downgrades its regions to warnings; the rest of the batch proceeds.
pub fn crop_regions(
    rasterizer: &dyn Rasterizer,
    pdf_bytes: &[u8],
    regions: &[Region],
    dpi: f64,
) -> Result<CropOutcome> {
    let mut outcome = CropOutcome::default();
    let mut pages: HashMap<usize, Option<DynamicImage>> = HashMap::new();

    for region in regions {
        let page = region.bbox.page;
        let rendered = pages.entry(page).or_insert_with(|| {
            match rasterizer.render_page(pdf_bytes, page, dpi) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(page, error = %e, "page render failed");
                    None
                }
            }
        });
        let Some(image) = rendered else {
            outcome.warnings.push(SegmentationWarning::CropUnavailable {
                question_number: region.question_number,
                part_code: region.part_code.clone(),
            });
            continue;
        };

        let (x, y, w, h) = region.bbox.to_pixels(dpi);
        // Clamp to the rendered bitmap; a region hanging off the page edge
        // still yields its visible portion.
        let x = x.min(image.width().saturating_sub(1));
        let y = y.min(image.height().saturating_sub(1));
        let w = w.min(image.width() - x).max(1);
        let h = h.min(image.height() - y).max(1);

        let cropped = image.crop_imm(x, y, w, h);
        let mut png = Vec::new();
        cropped.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        outcome.crops.push(VisualCrop {
            question_number: region.question_number,
            part_code: region.part_code.clone(),
            bbox: region.bbox,
            content_hash: hex_digest(&png),
            png,
            dpi,
        });
    }

    Ok(outcome)
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Pdfium-backed rasterizer.
///
/// The pdfium handle is not thread-safe, so the binding is opened per call
/// rather than held across the batch driver's workers.
#[cfg(feature = "render")]
pub struct PdfiumRasterizer;

#[cfg(feature = "render")]
impl Rasterizer for PdfiumRasterizer {
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize, dpi: f64) -> Result<DynamicImage> {
        use pdfium_render::prelude::*;

        use crate::error::PipelineError;

        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| PipelineError::Raster(format!("pdfium bindings: {e}")))?;
        let pdfium = Pdfium::new(bindings);
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|e| PipelineError::Raster(format!("load: {e}")))?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|e| PipelineError::Raster(format!("page {page_index}: {e}")))?;
        let config = PdfRenderConfig::new().scale_page_by_factor((dpi / 72.0) as f32);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PipelineError::Raster(format!("render page {page_index}: {e}")))?;
        Ok(bitmap.as_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::model::BBox;
    use image::RgbaImage;

    /// Renders a flat-colour page whose channel values encode the page
    /// index, so crops from different pages hash differently.
    struct FlatRasterizer;

    impl Rasterizer for FlatRasterizer {
        fn render_page(
            &self,
            _pdf_bytes: &[u8],
            page_index: usize,
            _dpi: f64,
        ) -> Result<DynamicImage> {
            let shade = 40 + (page_index as u8) * 50;
            let image = RgbaImage::from_pixel(200, 300, image::Rgba([shade, shade, shade, 255]));
            Ok(DynamicImage::ImageRgba8(image))
        }
    }

    struct FailingRasterizer;

    impl Rasterizer for FailingRasterizer {
        fn render_page(&self, _: &[u8], page_index: usize, _: f64) -> Result<DynamicImage> {
            Err(PipelineError::Raster(format!("no page {page_index}")))
        }
    }

    fn region(number: u32, code: &str, bbox: BBox) -> Region {
        Region {
            question_number: number,
            part_code: code.to_string(),
            bbox,
        }
    }

    #[test]
    fn crops_are_encoded_and_hashed() {
        let regions = vec![
            region(1, "", BBox::new(0, 10.0, 10.0, 50.0, 40.0)),
            region(1, "(a)", BBox::new(0, 10.0, 60.0, 50.0, 40.0)),
        ];
        let outcome = crop_regions(&FlatRasterizer, b"pdf", &regions, 72.0).unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.crops.len(), 2);
        let crop = &outcome.crops[0];
        // PNG signature.
        assert_eq!(&crop.png[..4], &[0x89, b'P', b'N', b'G']);
        assert_eq!(crop.content_hash.len(), 64);
        // Identical flat-colour regions of equal size deduplicate by hash.
        assert_eq!(outcome.crops[0].content_hash, outcome.crops[1].content_hash);
    }

    #[test]
    fn oversized_region_is_clamped_to_page() {
        let regions = vec![region(2, "", BBox::new(0, 150.0, 250.0, 500.0, 500.0))];
        let outcome = crop_regions(&FlatRasterizer, b"pdf", &regions, 72.0).unwrap();
        assert_eq!(outcome.crops.len(), 1);
    }

    #[test]
    fn render_failure_becomes_warning() {
        let regions = vec![region(3, "(a)", BBox::new(1, 0.0, 0.0, 10.0, 10.0))];
        let outcome = crop_regions(&FailingRasterizer, b"pdf", &regions, 150.0).unwrap();
        assert!(outcome.crops.is_empty());
        assert!(matches!(
            outcome.warnings[0],
            SegmentationWarning::CropUnavailable {
                question_number: 3,
                ..
            }
        ));
    }

    #[test]
    fn different_pages_render_once_each() {
        let regions = vec![
            region(1, "", BBox::new(0, 0.0, 0.0, 20.0, 20.0)),
            region(2, "", BBox::new(1, 0.0, 0.0, 20.0, 20.0)),
        ];
        let outcome = crop_regions(&FlatRasterizer, b"pdf", &regions, 72.0).unwrap();
        // Different page shades produce different content hashes.
        assert_ne!(outcome.crops[0].content_hash, outcome.crops[1].content_hash);
    }
}
