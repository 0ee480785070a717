//! Fence-Based Segmenter: deterministic partition of a paper's token
//! stream into questions and parts.
//!
//! The authoritative "Total for Question N = M marks" fences are scanned
//! first; everything else hangs off the fence list. See `patterns` for the
//! full declarative pattern table and its version stamp.

pub mod fence;
pub mod lines;
pub mod patterns;
pub mod segmenter;

pub use fence::scan_fences;
pub use segmenter::{SegmentationOutcome, segment};
