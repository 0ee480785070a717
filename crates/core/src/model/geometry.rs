//! Page-space geometry: bounding boxes in PDF point units (72/inch).
//!
//! All coordinates in the pipeline use a top-left origin, regardless of the
//! bottom-left convention of the underlying PDF rendering model. The flip
//! happens once, at extraction time.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangular region on a page, in point units,
/// top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Zero-based page index within the source document.
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    pub fn new(page: usize, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page,
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Smallest box containing both `self` and `other`.
    ///
    /// Both boxes must be on the same page; the page index of `self` wins.
    pub fn union(&self, other: &BBox) -> BBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BBox::new(self.page, x, y, right - x, bottom - y)
    }

    /// Expands the box by `margin` on every side, clamping the origin at 0.
    pub fn padded(&self, margin: f64) -> BBox {
        let x = (self.x - margin).max(0.0);
        let y = (self.y - margin).max(0.0);
        BBox::new(
            self.page,
            x,
            y,
            self.width + (self.x - x) + margin,
            self.height + (self.y - y) + margin,
        )
    }

    /// Clamps the box to a page of the given dimensions.
    pub fn clamped(&self, page_width: f64, page_height: f64) -> BBox {
        let x = self.x.clamp(0.0, page_width);
        let y = self.y.clamp(0.0, page_height);
        let right = self.right().clamp(x, page_width);
        let bottom = self.bottom().clamp(y, page_height);
        BBox::new(self.page, x, y, right - x, bottom - y)
    }

    /// Converts point-space coordinates to pixel-space at the given DPI.
    ///
    /// Returns `(x, y, width, height)` in pixels, rounded outward so the
    /// pixel region always covers the full point region.
    pub fn to_pixels(&self, dpi: f64) -> (u32, u32, u32, u32) {
        let scale = dpi / 72.0;
        let x0 = (self.x * scale).floor();
        let y0 = (self.y * scale).floor();
        let x1 = (self.right() * scale).ceil();
        let y1 = (self.bottom() * scale).ceil();
        (
            x0 as u32,
            y0 as u32,
            (x1 - x0).max(1.0) as u32,
            (y1 - y0).max(1.0) as u32,
        )
    }
}

/// Envelope of a non-empty sequence of boxes (min/max over extents).
pub fn envelope<'a, I>(mut boxes: I) -> Option<BBox>
where
    I: Iterator<Item = &'a BBox>,
{
    let first = *boxes.next()?;
    Some(boxes.fold(first, |acc, b| acc.union(b)))
}
