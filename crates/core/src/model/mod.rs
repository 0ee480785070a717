//! Shared data model for the ingestion pipeline.
//!
//! All entities are created once per run from a single (QP, MS) PDF pair,
//! held in memory for the duration of the run, and handed wholesale to the
//! persistence collaborator at the end. Nothing here is mutated concurrently.

pub mod features;
pub mod geometry;
pub mod markscheme;
pub mod output;
pub mod question;
pub mod tags;
pub mod text;

pub use features::{Complexity, Difficulty, QuestionFeatures, Reasoning, Style};
pub use geometry::{BBox, envelope};
pub use markscheme::MsLink;
pub use output::{PaperMetadata, PaperOutput, VisualCrop};
pub use question::{QuestionFence, SegmentationWarning, SegmentedPart, SegmentedQuestion};
pub use tags::Tag;
pub use text::{PageText, TextItem, TokenRef, flatten, resolve};
