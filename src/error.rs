//! Error types for segmentation table input and filter selections

use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or validating the segmentation table.
///
/// Rows are 1-based data rows (the header line is not counted).
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read segmentation table from {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("missing required column '{column}'")]
    MissingColumn { column: &'static str },

    #[error("column '{column}' could not be read")]
    Column {
        column: &'static str,
        #[source]
        source: PolarsError,
    },

    #[error("column '{column}' is empty at row {row}")]
    MissingValue { column: &'static str, row: usize },

    #[error("column '{column}' has non-numeric value '{value}' at row {row}")]
    NotNumeric {
        column: &'static str,
        row: usize,
        value: String,
    },

    #[error("column '{column}' has negative value {value} at row {row}")]
    Negative {
        column: &'static str,
        row: usize,
        value: f64,
    },

    #[error("column '{column}' expects a whole number but found {value} at row {row}")]
    NotInteger {
        column: &'static str,
        row: usize,
        value: f64,
    },

    #[error("column '{column}' value {value} at row {row} is too large to store exactly")]
    OutOfRange {
        column: &'static str,
        row: usize,
        value: f64,
    },

    #[error("duplicate CustomerID '{customer_id}' at row {row}")]
    DuplicateCustomer { customer_id: String, row: usize },

    #[error("segmentation table contains no rows")]
    Empty,
}

/// A filter selection that refers to labels the table does not contain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("unknown segment '{0}'")]
    UnknownSegment(String),

    #[error("unknown cluster {0}")]
    UnknownCluster(i64),
}

/// A line typed into the interactive session that is not a valid command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (try: segments, clusters, show, hide, reset, render, quit)")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("unknown view '{0}'")]
    UnknownView(String),

    #[error("invalid cluster id '{0}'")]
    InvalidCluster(String),
}
