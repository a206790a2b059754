use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Boxed cause attached to errors whose origin varies by backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type covering the different failure cases that can occur while a
/// dataset is extracted, validated, or written.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Raised when the spreadsheet client could not be set up from the
    /// configured credentials.
    #[error("failed to authenticate with credentials {}: {source}", .path.display())]
    AuthenticationFailed {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Raised when the sheet could not be opened or read, or when its rows do
    /// not have the expected shape.
    #[error("failed to extract data from sheet: {0}")]
    ExtractionFailed(#[from] SheetError),

    /// Raised when a prompt/completion pair encodes to more tokens than the
    /// configured ceiling allows.
    #[error("token count {tokens} exceeds the limit of {limit}")]
    TokenLimitExceeded { tokens: usize, limit: usize },

    /// Raised when the dataset file could not be written or read back.
    #[error("failed to serialise dataset {}: {source}", .path.display())]
    SerializationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Raised when a configuration value is missing or does not validate.
    #[error("invalid configuration for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl ToolError {
    pub(crate) fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Failures raised by spreadsheet clients and by row-shape checks.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Errors bubbled up from the workbook reader implementation.
    #[error("workbook read error: {0}")]
    Workbook(#[from] calamine::Error),

    /// Wrapper for IO failures while locating the workbook.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when the URL does not point at anything the client can open.
    #[error("unsupported sheet location '{0}'")]
    UnsupportedLocation(String),

    /// Raised when the requested worksheet index is out of range.
    #[error("worksheet {index} not found, workbook has {available} sheet(s)")]
    MissingWorksheet { index: usize, available: usize },

    /// Raised when a data row holds fewer than the two expected cells.
    #[error("row {row} has {cells} cell(s), expected at least 2")]
    MalformedRow { row: usize, cells: usize },

    /// Request failures from remote spreadsheet services.
    #[error("{0}")]
    Client(BoxError),
}
