//! Visual region detection and PNG cropping.

pub mod crop;
pub mod detect;

pub use crop::{CropOutcome, Rasterizer, crop_regions};
pub use detect::{DetectionOutcome, OverrideTable, Region, detect_regions};

#[cfg(feature = "render")]
pub use crop::PdfiumRasterizer;
