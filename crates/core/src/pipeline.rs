//! Per-paper ingestion run and the rayon batch driver.
//!
//! Within one paper the stages run strictly sequentially; each consumes
//! the complete output of the previous one. Across papers, runs are
//! independent and parallel with no shared mutable state.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::extract::extract_pages;
use crate::features::extract_features;
use crate::link::link_markscheme;
use crate::model::{PaperMetadata, PaperOutput, SegmentationWarning, Tag};
use crate::segment::{scan_fences, segment};
use crate::tag::{Classifier, ClassifyRequest};
use crate::visual::{OverrideTable, Rasterizer, crop_regions, detect_regions};

/// One (question paper, mark scheme) pair queued for ingestion.
#[derive(Debug, Clone)]
pub struct PaperJob {
    pub metadata: PaperMetadata,
    pub qp_bytes: Vec<u8>,
    pub ms_bytes: Vec<u8>,
}

impl PaperJob {
    /// Short label used in logs and batch reports.
    pub fn label(&self) -> String {
        format!(
            "{} {} {} P{}",
            self.metadata.subject_code,
            self.metadata.year,
            self.metadata.season,
            self.metadata.paper_number
        )
    }
}

/// Shared, read-only collaborators for a batch of runs.
pub struct RunContext<'a> {
    pub classifier: &'a dyn Classifier,
    /// When absent, the visual stage is skipped entirely.
    pub rasterizer: Option<&'a dyn Rasterizer>,
    pub overrides: &'a OverrideTable,
    pub dpi: f64,
}

/// Runs the full pipeline for one paper.
///
/// Only extraction-level failures abort the run; everything below paper
/// level accumulates into the output's warning list.
pub fn run_paper(job: &PaperJob, ctx: &RunContext<'_>) -> Result<PaperOutput> {
    let qp_pages = extract_pages(&job.qp_bytes)?;
    let mut warnings: Vec<SegmentationWarning> = qp_pages
        .iter()
        .filter(|p| p.ocr_used)
        .map(|p| SegmentationWarning::OcrStub { page_index: p.index })
        .collect();

    let fences = scan_fences(&qp_pages);
    let mut outcome = segment(&qp_pages);
    warnings.append(&mut outcome.warnings);
    let questions = outcome.questions;

    let ms_pages = extract_pages(&job.ms_bytes)?;
    let ms_links = link_markscheme(&ms_pages, &fences);

    let mut tags: Vec<Vec<Tag>> = Vec::with_capacity(questions.len());
    for question in &questions {
        let link = ms_links
            .iter()
            .find(|l| l.question_number == question.question_number);
        let request = ClassifyRequest {
            question_number: question.question_number,
            context_text: question.context_text.clone(),
            ms_text: link.map(|l| l.ms_snippet.clone()).unwrap_or_default(),
        };
        match ctx.classifier.classify(&request) {
            Ok(question_tags) => tags.push(question_tags),
            Err(e) => {
                warn!(
                    question = question.question_number,
                    error = %e,
                    "classification failed, question left untagged"
                );
                tags.push(Vec::new());
            }
        }
    }

    let features = questions
        .iter()
        .zip(&tags)
        .map(|(question, question_tags)| {
            let link = ms_links
                .iter()
                .find(|l| l.question_number == question.question_number && l.confidence > 0.0);
            extract_features(question, question_tags, link)
        })
        .collect();

    let crops = match ctx.rasterizer {
        Some(rasterizer) => {
            let mut detection = detect_regions(&questions, ctx.overrides);
            warnings.append(&mut detection.warnings);
            let mut cropped = crop_regions(rasterizer, &job.qp_bytes, &detection.regions, ctx.dpi)?;
            warnings.append(&mut cropped.warnings);
            cropped.crops
        }
        None => Vec::new(),
    };

    info!(
        paper = %job.label(),
        questions = questions.len(),
        warnings = warnings.len(),
        "paper ingested"
    );
    Ok(PaperOutput {
        metadata: job.metadata.clone(),
        questions,
        ms_links,
        tags,
        features,
        crops,
        warnings,
    })
}

/// One failed paper in a batch run.
#[derive(Debug, Clone)]
pub struct PaperFailure {
    pub paper: String,
    pub error: String,
}

/// Batch outcome: every paper is accounted for, succeeded or failed.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outputs: Vec<PaperOutput>,
    pub failures: Vec<PaperFailure>,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        let total = self.outputs.len() + self.failures.len();
        format!("{}/{} papers succeeded", self.outputs.len(), total)
    }
}

/// Runs a batch of papers in parallel. Failures never stop the batch.
pub fn run_batch(jobs: &[PaperJob], ctx: &RunContext<'_>) -> BatchReport {
    let results: Vec<_> = jobs
        .par_iter()
        .map(|job| (job.label(), run_paper(job, ctx)))
        .collect();

    let mut report = BatchReport::default();
    for (label, result) in results {
        match result {
            Ok(output) => report.outputs.push(output),
            Err(e) => {
                warn!(paper = %label, error = %e, "paper failed");
                report.failures.push(PaperFailure {
                    paper: label,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_summary_counts_both_sides() {
        let mut report = BatchReport::default();
        report.failures.push(PaperFailure {
            paper: "1PH0 2023 June P1".to_string(),
            error: "cannot parse PDF".to_string(),
        });
        assert_eq!(report.summary(), "0/1 papers succeeded");
    }
}
