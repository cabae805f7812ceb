use thiserror::Error;

/// Error types for report generation
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    ParseFile {
        path: String,
        source: serde_json::Error,
    },

    #[error("No input batches given")]
    NoBatches,

    #[error("Bad date {value} in batch {path}")]
    BadBatchDate { path: String, value: String },

    #[error("in batch {path}: {source}")]
    BadBatch {
        path: String,
        source: meter_core::CoreError,
    },

    #[error(transparent)]
    Core(#[from] meter_core::CoreError),

    #[error("Failed to write report: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
