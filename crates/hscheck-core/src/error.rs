use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("PDF extraction failed: {0}")]
    Extraction(String),

    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftotextNotFound,

    #[error("pdftotext failed with exit code {code}: {stderr}")]
    PdftotextFailed { code: i32, stderr: String },

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("could not locate the table header region (no 'shipped to/by' marker above the first 'description of goods')")]
    NoHeaderRegion,

    #[error("column configuration '{key}' not found")]
    ColumnConfigMissing { key: String },

    #[error("could not identify table columns from rulings or header cells")]
    CannotIdentifyColumns,

    #[error("failed to load configuration from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("failed to read reference mapping: {0}")]
    ReferenceLoad(String),

    #[error("failed to parse document: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
