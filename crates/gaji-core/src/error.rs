//! Error types for the gaji-core library.

use thiserror::Error;

/// Main error type for the gaji library.
#[derive(Error, Debug)]
pub enum GajiError {
    /// Payslip extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to payslip field extraction.
///
/// Missing or implausible fields are not errors; they surface as null
/// record fields with an event trail. Only input that cannot be parsed at
/// all, or a strategy table that cannot be built, is reported here.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The input text is empty or whitespace only.
    #[error("input text is empty")]
    EmptyInput,

    /// The input text carries no alphanumeric content.
    #[error("no payslip data found")]
    NoData,

    /// A strategy pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A strategy definition is unusable.
    #[error("validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },
}

/// Result type for the gaji library.
pub type Result<T> = std::result::Result<T, GajiError>;
