use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the admission pipeline stages
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read credentials from {path}: {reason}")]
    Credentials { path: PathBuf, reason: String },

    #[error("Dataset download failed: {0}")]
    Download(String),

    #[error("Failed to extract archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Required column '{0}' is missing from the dataset")]
    MissingColumn(String),

    #[error("Row {row}: '{value}' in column '{column}' is not a valid score")]
    InvalidScore {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Failed to write letter {path}: {reason}")]
    Letter { path: PathBuf, reason: String },

    #[error("Report error: {0}")]
    Report(String),
}

/// Result type for admission pipeline operations
pub type AdmissionResult<T> = Result<T, AdmissionError>;

impl AdmissionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AdmissionError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for AdmissionError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        AdmissionError::Report(err.to_string())
    }
}
