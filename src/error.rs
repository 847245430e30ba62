//! Error types.
//!
//! Most functions in this crate return `anyhow::Result`; the variants below are the
//! failures callers may want to tell apart (`err.downcast_ref::<PipelineError>()`).

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no CSV file found in archive {0}")]
    NoCsvInArchive(String),
    #[error("column '{column}' not found in {table}")]
    MissingColumn { table: String, column: String },
    #[error("duplicate observation for {country_code} / {indicator_code} / {year}")]
    DuplicateObservation {
        country_code: String,
        indicator_code: String,
        year: i32,
    },
    #[error("invalid indicator catalog: {0}")]
    InvalidCatalog(String),
    #[error("invalid year range {start}..={end}")]
    InvalidYearRange { start: i32, end: i32 },
    #[error("unexpected API response: {0}")]
    UnexpectedApiResponse(String),
}
