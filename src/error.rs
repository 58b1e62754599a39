//! Error types for ingestion, normalisation and metric parameters

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by the retail analytics core.
///
/// Data-quality gaps (missing descriptions, zero prices, unknown customers) are
/// not errors: the preparation stages repair, drop or default them instead.
#[derive(Debug, Error)]
pub enum RetailError {
    #[error("required column '{0}' is missing from the input")]
    MissingColumn(String),
    #[error("column '{column}' has unsupported type {dtype}")]
    UnsupportedType { column: String, dtype: String },
    #[error("{count} value(s) in column '{column}' could not be parsed as timestamps")]
    UnparseableDate { column: String, count: usize },
    #[error("column '{column}' has {count} missing value(s)")]
    MissingValues { column: String, count: usize },
    #[error("unsupported input format '{0}' (expected csv, parquet, xlsx, xlsm, xls or ods)")]
    UnsupportedFormat(String),
    #[error("workbook '{0}' has no worksheets")]
    EmptyWorkbook(String),
    #[error("invalid {parameter} '{value}', expected one of: {expected}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Workbook(#[from] calamine::Error),
}

impl RetailError {
    pub(crate) fn invalid_parameter(
        parameter: &'static str,
        value: &str,
        expected: &'static str,
    ) -> Self {
        Self::InvalidParameter {
            parameter,
            value: value.to_string(),
            expected,
        }
    }
}
