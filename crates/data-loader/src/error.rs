//! Error types for the data-loader crate.
//!
//! Every variant is a data error: the dataset is missing, unreadable or
//! malformed. They are all fatal when raised while building the case base.

use thiserror::Error;

/// Errors that can occur during data loading, parsing and validation
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// One of the three tables is not present in the data directory
    #[error("Missing dataset table: {path}")]
    MissingTable { path: String },

    /// I/O error occurred while reading a table
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in a table couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A field had a value outside its domain
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// A rating references a user or movie that is not in its table
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: u32 },

    /// A table parsed successfully but holds no rows
    #[error("Table {0} is empty")]
    EmptyTable(String),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
