//! Shape, coverage and missing-value summary of a transaction table

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

use crate::schema::{INVOICE_DATE, RAW_PRICE, UNIT_PRICE};

/// Structural summary of a raw, clean or enriched table
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetOverview {
    pub rows: usize,
    pub columns: usize,
    pub first_invoice: Option<NaiveDateTime>,
    pub last_invoice: Option<NaiveDateTime>,
    /// Null count per column, in column order
    pub missing: Vec<(String, usize)>,
    /// Distinct value count per column, in column order
    pub distinct: Vec<(String, usize)>,
    pub zero_price_rows: usize,
}

impl DatasetOverview {
    /// e.g. `December 01, 2009 through December 09, 2010`
    pub fn date_range_label(&self) -> Option<String> {
        let (first, last) = (self.first_invoice?, self.last_invoice?);
        Some(format!(
            "{} through {}",
            first.format("%B %d, %Y"),
            last.format("%B %d, %Y")
        ))
    }
}

pub fn dataset_overview(frame: &DataFrame) -> crate::Result<DatasetOverview> {
    let mut missing = Vec::with_capacity(frame.width());
    let mut distinct = Vec::with_capacity(frame.width());
    for column in frame.get_columns() {
        let name = column.name().to_string();
        missing.push((name.clone(), column.null_count()));
        distinct.push((name, column.as_materialized_series().n_unique()?));
    }

    let (first_invoice, last_invoice) = invoice_bounds(frame)?;

    let price = [RAW_PRICE, UNIT_PRICE]
        .into_iter()
        .find(|name| frame.column(name).is_ok());
    let zero_price_rows = match price {
        Some(name) => frame
            .clone()
            .lazy()
            .filter(col(name).eq(lit(0.0)))
            .collect()?
            .height(),
        None => 0,
    };

    Ok(DatasetOverview {
        rows: frame.height(),
        columns: frame.width(),
        first_invoice,
        last_invoice,
        missing,
        distinct,
        zero_price_rows,
    })
}

fn invoice_bounds(
    frame: &DataFrame,
) -> crate::Result<(Option<NaiveDateTime>, Option<NaiveDateTime>)> {
    let bounds = frame
        .clone()
        .lazy()
        .select([
            col(INVOICE_DATE).min().cast(DataType::Int64).alias("First"),
            col(INVOICE_DATE).max().cast(DataType::Int64).alias("Last"),
        ])
        .collect()?;

    let read = |name: &str| -> crate::Result<Option<NaiveDateTime>> {
        Ok(bounds
            .column(name)?
            .as_materialized_series()
            .i64()?
            .get(0)
            .and_then(DateTime::from_timestamp_micros)
            .map(|ts| ts.naive_utc()))
    };
    Ok((read("First")?, read("Last")?))
}
