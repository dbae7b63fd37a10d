use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrowthMetricsError {
    #[error("Invalid period '{0}'")]
    InvalidPeriod(String),

    #[error("Invalid quarter {0}: must be between 1 and 4")]
    InvalidQuarter(u32),

    #[error("Required column not found: {0}")]
    MissingColumn(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Spreadsheet error in {path}: {details}")]
    Spreadsheet { path: String, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GrowthMetricsError>;
