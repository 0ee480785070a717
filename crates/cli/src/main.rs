//! papermill - ingest exam papers and assemble worksheets.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use papermill_core::model::{BBox, PaperMetadata};
use papermill_core::pipeline::{PaperJob, RunContext, run_batch};
use papermill_core::tag::{
    EscalatingClassifier, HttpClassifier, HttpClassifierConfig, RuleBasedClassifier, SubjectConfig,
};
use papermill_core::visual::OverrideTable;
use papermill_core::{Classifier, Selection, assemble};

#[derive(Parser, Debug)]
#[command(name = "papermill")]
#[command(author, version, about = "Exam paper ingestion and worksheet assembly")]
struct Args {
    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest question paper / mark scheme pairs into a JSON report
    Ingest {
        /// Subject configuration (TOML)
        #[arg(short, long)]
        subject: PathBuf,

        /// Batch manifest (JSON) listing the paper pairs
        #[arg(short, long)]
        manifest: PathBuf,

        /// Path for the JSON report, or "-" for stdout
        #[arg(short, long, default_value = "-")]
        out: String,

        /// Endpoint for the escalation classifier; rules-only when absent
        #[arg(long)]
        llm_endpoint: Option<String>,

        /// API key for the escalation classifier
        #[arg(long, env = "PAPERMILL_API_KEY", default_value = "")]
        llm_api_key: String,
    },
    /// Assemble a worksheet PDF from selected question regions
    Worksheet {
        /// Worksheet definition (JSON): sources and selections
        #[arg(short, long)]
        plan: PathBuf,

        /// Output PDF path
        #[arg(short, long)]
        out: PathBuf,

        /// Title printed in the page header
        #[arg(short, long, default_value = "Worksheet")]
        title: String,
    },
}

/// One entry of the ingest manifest.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    question_paper: PathBuf,
    mark_scheme: PathBuf,
    year: u16,
    season: String,
    paper_number: String,
}

/// The worksheet plan file.
#[derive(Debug, Deserialize)]
struct WorksheetPlan {
    sources: Vec<PathBuf>,
    selections: Vec<PlanSelection>,
}

#[derive(Debug, Deserialize)]
struct PlanSelection {
    source: usize,
    question_number: u32,
    #[serde(default)]
    part_code: String,
    marks: u32,
    bboxes: Vec<BBox>,
    #[serde(default)]
    label: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Ingest {
            subject,
            manifest,
            out,
            llm_endpoint,
            llm_api_key,
        } => ingest(&subject, &manifest, &out, llm_endpoint.as_deref(), &llm_api_key),
        Command::Worksheet { plan, out, title } => worksheet(&plan, &out, &title),
    }
}

fn ingest(
    subject_path: &PathBuf,
    manifest_path: &PathBuf,
    out: &str,
    llm_endpoint: Option<&str>,
    llm_api_key: &str,
) -> Result<()> {
    let subject = SubjectConfig::load(subject_path)
        .with_context(|| format!("loading subject config {}", subject_path.display()))?;
    let info = subject.info().clone();

    let manifest_raw = fs::read_to_string(manifest_path)
        .with_context(|| format!("reading manifest {}", manifest_path.display()))?;
    let entries: Vec<ManifestEntry> =
        serde_json::from_str(&manifest_raw).context("parsing manifest")?;
    if entries.is_empty() {
        bail!("manifest lists no papers");
    }

    let mut jobs = Vec::with_capacity(entries.len());
    for entry in &entries {
        jobs.push(PaperJob {
            metadata: PaperMetadata {
                board: info.board.clone(),
                level: info.level.clone(),
                subject_code: info.code.clone(),
                subject_name: info.name.clone(),
                year: entry.year,
                season: entry.season.clone(),
                paper_number: entry.paper_number.clone(),
            },
            qp_bytes: fs::read(&entry.question_paper)
                .with_context(|| format!("reading {}", entry.question_paper.display()))?,
            ms_bytes: fs::read(&entry.mark_scheme)
                .with_context(|| format!("reading {}", entry.mark_scheme.display()))?,
        });
    }

    let threshold = match &subject {
        SubjectConfig::SymbolAware {
            escalation_threshold,
            ..
        } => Some(*escalation_threshold),
        SubjectConfig::Simple { .. } => None,
    };
    let topics = topic_vocabulary(&subject);
    let rules = RuleBasedClassifier::new(subject);
    let classifier: Box<dyn Classifier> = match (llm_endpoint, threshold) {
        (Some(endpoint), Some(threshold)) => {
            let mut config = HttpClassifierConfig::new(endpoint, llm_api_key);
            config.topics = topics;
            let http = HttpClassifier::new(config)?;
            Box::new(EscalatingClassifier::new(rules, Box::new(http), threshold))
        }
        _ => Box::new(rules),
    };

    let overrides = OverrideTable::new();
    let ctx = RunContext {
        classifier: classifier.as_ref(),
        rasterizer: None,
        overrides: &overrides,
        dpi: 150.0,
    };
    let report = run_batch(&jobs, &ctx);

    for failure in &report.failures {
        eprintln!("failed: {}: {}", failure.paper, failure.error);
    }
    for output in &report.outputs {
        for warning in &output.warnings {
            eprintln!(
                "warning: {} {} P{}: {warning}",
                output.metadata.subject_code, output.metadata.year, output.metadata.paper_number
            );
        }
    }
    eprintln!("{}", report.summary());

    let json = serde_json::to_string_pretty(&report.outputs).context("serialising report")?;
    if out == "-" {
        println!("{json}");
    } else {
        fs::write(out, json).with_context(|| format!("writing report {out}"))?;
    }

    if report.outputs.is_empty() {
        bail!("no papers succeeded");
    }
    Ok(())
}

/// The subject's topic ids, each listed once, in rule-table order. This is
/// the vocabulary the escalation classifier offers the model.
fn topic_vocabulary(subject: &SubjectConfig) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for rule in &subject.rules().rules {
        if !topics.contains(&rule.topic) {
            topics.push(rule.topic.clone());
        }
    }
    topics
}

fn worksheet(plan_path: &PathBuf, out: &PathBuf, title: &str) -> Result<()> {
    let plan_raw = fs::read_to_string(plan_path)
        .with_context(|| format!("reading plan {}", plan_path.display()))?;
    let plan: WorksheetPlan = serde_json::from_str(&plan_raw).context("parsing plan")?;

    let mut sources = Vec::with_capacity(plan.sources.len());
    for path in &plan.sources {
        sources.push(fs::read(path).with_context(|| format!("reading {}", path.display()))?);
    }
    let selections: Vec<Selection> = plan
        .selections
        .into_iter()
        .map(|s| Selection {
            source: s.source,
            question_number: s.question_number,
            part_code: s.part_code,
            marks: s.marks,
            bboxes: s.bboxes,
            label: s.label,
        })
        .collect();

    let build = assemble(title, &sources, &selections)?;
    for warning in &build.placement_warnings {
        eprintln!("warning: {warning}");
    }
    fs::write(out, &build.pdf_bytes)
        .with_context(|| format!("writing worksheet {}", out.display()))?;
    eprintln!(
        "worksheet written: {} pages, {} marks, ~{} minutes",
        build.total_pages, build.total_marks, build.estimated_minutes
    );
    Ok(())
}
