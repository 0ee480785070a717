//! papermill - exam paper ingestion: extraction, segmentation, markscheme
//! linking, topic tagging, feature extraction, visual crops and worksheet
//! assembly.

pub mod assemble;
pub mod error;
pub mod extract;
pub mod features;
pub mod link;
pub mod model;
pub mod pipeline;
pub mod segment;
pub mod tag;
pub mod visual;

pub use assemble::{Selection, WorksheetBuild, assemble};
pub use error::{PipelineError, Result};
pub use features::extract_features;
pub use link::link_markscheme;
pub use pipeline::{BatchReport, PaperJob, RunContext, run_batch, run_paper};
pub use segment::{SegmentationOutcome, scan_fences, segment};
pub use tag::{
    Classifier, ClassifyRequest, EscalatingClassifier, HttpClassifier, HttpClassifierConfig,
    RuleBasedClassifier, SubjectConfig,
};
pub use visual::{OverrideTable, Rasterizer};
