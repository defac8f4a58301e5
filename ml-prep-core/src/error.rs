//! Error types for dataset preparation
//!
//! Every failure carries a machine-distinguishable [`ErrorKind`] and a
//! human-readable message suitable for showing to the person who uploaded
//! the dataset.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::DataType;

/// Result type for dataset preparation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structural problems found while sniffing or parsing delimited text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The first line carries nothing
    #[error("First row is empty, it must contain headers or data.")]
    EmptyFirstRow,

    /// Neither a comma nor whitespace separates the first row
    #[error("CSV doesn't contain a valid delimiter.")]
    InvalidDelimiter,

    /// A delimiter was found but the first row splits into fewer than two fields
    #[error("With selected delimiter found only {found} columns in first row, must be at least 2.")]
    TooFewColumns {
        /// Number of fields found in the first row
        found: usize,
    },

    /// No usable data rows survived parsing
    #[error("The dataset is empty or isn't properly formatted.")]
    EmptyOrMalformedDataset,
}

/// Problems with a filter list, detected before any stage runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterValidationError {
    /// The filter list or one of its entries has the wrong JSON shape
    #[error("invalid filter format: {0}")]
    InvalidFormat(String),

    /// A filter entry has no `name`
    #[error("filter should have name")]
    MissingName,

    /// A filter name outside the known vocabulary
    #[error("unknown filter name: {0}")]
    UnknownFilter(String),

    /// The same filter appears twice
    #[error("found more than one filter with name: {0}")]
    DuplicateFilter(String),

    /// A filter appears after a filter it may not follow
    #[error("filter {0} can't be applied in this order")]
    InvalidFilterOrder(String),

    /// A filter's parameters are malformed or inconsistent with the dataset
    #[error("invalid {filter} filter: {message}")]
    InvalidParameters {
        /// Filter name
        filter: String,
        /// Human-readable reason
        message: String,
    },

    /// A filter that does not apply to the dataset's data type
    #[error("filter {filter} can't be applied to {data_type} data")]
    UnsupportedDataType {
        /// Filter name
        filter: String,
        /// Data type of the source dataset
        data_type: DataType,
    },
}

impl FilterValidationError {
    /// Create an [`FilterValidationError::InvalidParameters`] error
    pub fn invalid_parameters(filter: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            filter: filter.to_string(),
            message: message.into(),
        }
    }
}

/// Error type for dataset preparation operations
#[derive(Error, Debug)]
pub enum Error {
    /// Delimited text could not be sniffed or parsed
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The file or archive holds no supported data
    #[error("{0}")]
    InvalidDataFile(String),

    /// Timeseries text is malformed or inconsistent
    #[error("{0}")]
    InvalidTimeseries(String),

    /// The filter list was rejected before execution
    #[error(transparent)]
    FilterValidation(#[from] FilterValidationError),

    /// A filter stage failed while running
    #[error("filter {stage} failed: {message}")]
    FilterExecution {
        /// Name of the failing stage
        stage: String,
        /// Human-readable reason
        message: String,
    },

    /// Arrays or samples whose shapes do not fit together
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// IO error while reading input or writing snapshots
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary snapshot (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl Error {
    /// Create a [`Error::FilterExecution`] error for the given stage
    pub fn filter_execution(stage: &str, message: impl Into<String>) -> Self {
        Self::FilterExecution {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// The machine-distinguishable category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::InvalidDataFile(_) => ErrorKind::InvalidDataFile,
            Self::InvalidTimeseries(_) => ErrorKind::InvalidTimeseries,
            Self::FilterValidation(_) => ErrorKind::FilterValidation,
            Self::FilterExecution { .. } => ErrorKind::FilterExecution,
            Self::ShapeMismatch(_) => ErrorKind::ShapeMismatch,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) | Self::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Error categories exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Delimited text problems
    Format,
    /// Unsupported or unrecognizable file
    InvalidDataFile,
    /// Timeseries problems
    InvalidTimeseries,
    /// Rejected filter list
    FilterValidation,
    /// Failing filter stage
    FilterExecution,
    /// Incompatible shapes
    ShapeMismatch,
    /// IO failure
    Io,
    /// Serialization failure
    Serialization,
}

impl ErrorKind {
    /// Short stable identifier
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Format => "format_error",
            Self::InvalidDataFile => "invalid_data_file",
            Self::InvalidTimeseries => "invalid_timeseries",
            Self::FilterValidation => "filter_validation_error",
            Self::FilterExecution => "filter_execution_error",
            Self::ShapeMismatch => "shape_mismatch",
            Self::Io => "io_error",
            Self::Serialization => "serialization_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_messages() {
        let err: Error = FormatError::TooFewColumns { found: 1 }.into();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(
            err.to_string(),
            "With selected delimiter found only 1 columns in first row, must be at least 2."
        );
    }

    #[test]
    fn test_filter_errors() {
        let err: Error = FilterValidationError::invalid_parameters(
            "merge",
            "The elements of this field must be unique",
        )
        .into();
        assert_eq!(err.kind().as_str(), "filter_validation_error");
        assert!(err.to_string().contains("must be unique"));

        let err = Error::filter_execution("balance", "no outputs");
        assert_eq!(err.kind(), ErrorKind::FilterExecution);
        assert_eq!(err.to_string(), "filter balance failed: no outputs");
    }
}
