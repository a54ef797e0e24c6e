use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CorpusError>;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory traversal failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error("TIFF decode failed for {path}: {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("corpus is empty: {0}")]
    EmptyCorpus(&'static str),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("query document not in corpus: {0}")]
    QueryNotFound(PathBuf),

    #[error("{failed} of {total} tasks failed")]
    TaskFailures { failed: usize, total: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the external OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR binary not found: {0} (install tesseract-ocr)")]
    BinaryNotFound(String),

    #[error("OCR failed for {path}: {stderr}")]
    Failed { path: PathBuf, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
