use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedcError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Row-level: the pipeline skips the row and keeps going.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    // File-level: aborts the ingestion attempt.
    #[error("CSV file is empty")]
    EmptyFile,

    #[error("Only CSV files are allowed: {0}")]
    NotCsv(String),

    #[error("Upload is {size} bytes, limit is {limit}")]
    UploadTooLarge { size: usize, limit: usize },

    #[error("Invalid source type '{0}'. Must be: income, expenses, or both")]
    InvalidSource(String),

    #[error("Invalid transaction type: {0}")]
    InvalidTransactionType(String),

    #[error("Schedule C line {0} is out of range (expected 0 or 8-27)")]
    InvalidLine(i32),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Invalid deduction: {0}")]
    InvalidDeduction(String),

    // Batch-level: the aggregator falls back to per-item classification.
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Classifier returned a malformed response: {0}")]
    ClassifierMalformedResponse(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SchedcError>;
