//! Error types for the papermill ingestion pipeline.

use thiserror::Error;

/// Primary error type for pipeline operations.
///
/// Only extraction-level failures abort a paper run; everything below the
/// paper level is accumulated as structured warnings alongside valid results.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unreadable PDF: {0}")]
    Extraction(String),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("subject config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("rasteriser unavailable: {0}")]
    Raster(String),

    #[error("worksheet assembly error: {0}")]
    Assembly(String),

    #[error("image encode error: {0}")]
    Image(#[from] image::ImageError),
}

/// Convenience Result type alias for PipelineError.
pub type Result<T> = std::result::Result<T, PipelineError>;
