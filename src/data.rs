//! Segmentation table loading and validation using Polars

use crate::error::InputError;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

pub const CUSTOMER_ID: &str = "CustomerID";
pub const RECENCY: &str = "Recency";
pub const FREQUENCY: &str = "Frequency";
pub const MONETARY: &str = "Monetary";
pub const SEGMENT: &str = "Segment";
pub const CLUSTER: &str = "Cluster";

/// One customer row of the precomputed RFM segmentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    /// Days since the last transaction
    pub recency: f64,
    /// Number of transactions
    pub frequency: u64,
    /// Cumulative spend
    pub monetary: f64,
    pub segment: String,
    /// Cluster id assigned by an upstream clustering step
    pub cluster: i64,
}

/// Immutable, validated set of customer records
///
/// Loaded once at startup and passed by reference to every analysis step.
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    records: Vec<CustomerRecord>,
}

impl SegmentTable {
    /// Build a table, rejecting duplicate customer ids and negative RFM values
    pub fn new(records: Vec<CustomerRecord>) -> Result<Self, InputError> {
        let mut seen = HashSet::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            let row = idx + 1;
            if !seen.insert(record.customer_id.as_str()) {
                return Err(InputError::DuplicateCustomer {
                    customer_id: record.customer_id.clone(),
                    row,
                });
            }
            for (column, value) in [(RECENCY, record.recency), (MONETARY, record.monetary)] {
                if !value.is_finite() {
                    return Err(InputError::NotNumeric {
                        column,
                        row,
                        value: value.to_string(),
                    });
                }
                if value < 0.0 {
                    return Err(InputError::Negative { column, row, value });
                }
            }
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted, de-duplicated segment labels present in the table
    pub fn segment_labels(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.segment.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Sorted, de-duplicated cluster ids present in the table
    pub fn cluster_labels(&self) -> Vec<i64> {
        self.records
            .iter()
            .map(|r| r.cluster)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Load the segmentation CSV and validate every row
///
/// # Arguments
/// * `file_path` - CSV with CustomerID, Recency, Frequency, Monetary, Segment and Cluster columns
///
/// # Returns
/// * `SegmentTable` holding one record per customer, in file order
pub fn load_segment_table(file_path: impl AsRef<Path>) -> crate::Result<SegmentTable> {
    let path = file_path.as_ref();
    let start = Instant::now();

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(rows = df.height(), columns = df.width(), "csv parsed");

    let records = records_from_frame(&df)?;
    if records.is_empty() {
        return Err(InputError::Empty.into());
    }
    let table = SegmentTable::new(records)?;

    info!(
        path = %path.display(),
        customers = table.len(),
        segments = table.segment_labels().len(),
        clusters = table.cluster_labels().len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "segmentation table loaded"
    );
    Ok(table)
}

/// Convert a DataFrame with the expected columns into customer records
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<CustomerRecord>, InputError> {
    let customer_ids = text_cells(df, CUSTOMER_ID)?;
    let recency = number_cells(df, RECENCY)?;
    let frequency = number_cells(df, FREQUENCY)?;
    let monetary = number_cells(df, MONETARY)?;
    let segments = text_cells(df, SEGMENT)?;
    let clusters = number_cells(df, CLUSTER)?;

    let mut records = Vec::with_capacity(df.height());
    for (idx, customer_id) in customer_ids.into_iter().enumerate() {
        let row = idx + 1;
        records.push(CustomerRecord {
            customer_id,
            recency: non_negative(RECENCY, row, recency[idx])?,
            frequency: whole_number(FREQUENCY, row, non_negative(FREQUENCY, row, frequency[idx])?)?
                as u64,
            monetary: non_negative(MONETARY, row, monetary[idx])?,
            segment: segments[idx].clone(),
            cluster: whole_number(CLUSTER, row, clusters[idx])? as i64,
        });
    }

    Ok(records)
}

fn column<'a>(df: &'a DataFrame, name: &'static str) -> Result<&'a Series, InputError> {
    df.column(name)
        .map_err(|_| InputError::MissingColumn { column: name })
}

/// Read a column as trimmed, non-empty text
fn text_cells(df: &DataFrame, name: &'static str) -> Result<Vec<String>, InputError> {
    let series = column(df, name)?
        .cast(&DataType::String)
        .map_err(|source| InputError::Column { column: name, source })?;
    let cells = series
        .str()
        .map_err(|source| InputError::Column { column: name, source })?;

    cells
        .into_iter()
        .enumerate()
        .map(|(idx, cell)| match cell.map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(InputError::MissingValue {
                column: name,
                row: idx + 1,
            }),
        })
        .collect()
}

/// Read a column as finite floats, naming the first cell that does not parse
fn number_cells(df: &DataFrame, name: &'static str) -> Result<Vec<f64>, InputError> {
    let source_column = column(df, name)?;
    // Non-strict casts turn unparsable cells into nulls; the text view recovers the raw value.
    let numbers = source_column
        .cast(&DataType::Float64)
        .map_err(|source| InputError::Column { column: name, source })?;
    let raw = source_column
        .cast(&DataType::String)
        .map_err(|source| InputError::Column { column: name, source })?;
    let numbers = numbers
        .f64()
        .map_err(|source| InputError::Column { column: name, source })?;
    let raw = raw
        .str()
        .map_err(|source| InputError::Column { column: name, source })?;

    numbers
        .into_iter()
        .zip(raw.into_iter())
        .enumerate()
        .map(|(idx, cell)| {
            let row = idx + 1;
            match cell {
                (Some(value), _) if value.is_finite() => Ok(value),
                (Some(value), _) => Err(InputError::NotNumeric {
                    column: name,
                    row,
                    value: value.to_string(),
                }),
                (None, Some(text)) if !text.trim().is_empty() => Err(InputError::NotNumeric {
                    column: name,
                    row,
                    value: text.to_string(),
                }),
                (None, _) => Err(InputError::MissingValue { column: name, row }),
            }
        })
        .collect()
}

fn non_negative(column: &'static str, row: usize, value: f64) -> Result<f64, InputError> {
    if value < 0.0 {
        return Err(InputError::Negative { column, row, value });
    }
    Ok(value)
}

/// Largest magnitude at which every whole number has an exact f64 representation
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

fn whole_number(column: &'static str, row: usize, value: f64) -> Result<f64, InputError> {
    if value.fract() != 0.0 {
        return Err(InputError::NotInteger { column, row, value });
    }
    // Past this bound neighbouring ids collapse and `as` casts saturate.
    if value.abs() > MAX_EXACT_INTEGER {
        return Err(InputError::OutOfRange { column, row, value });
    }
    Ok(value)
}
