use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Manifest error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Failed to read source {}: {message}", path.display())]
    SourceRead { path: PathBuf, message: String },

    #[error("Malformed reference entry in {} at line {line}: '{content}'", path.display())]
    ReferenceParse {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("Quality check failed for table '{table}': {message}")]
    SchemaViolation { table: String, message: String },

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    pub fn source_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ProcessingError::SourceRead {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn schema_violation(table: impl Into<String>, message: impl Into<String>) -> Self {
        ProcessingError::SchemaViolation {
            table: table.into(),
            message: message.into(),
        }
    }
}
