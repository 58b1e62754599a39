//! Raw invoice-line ingestion using Polars

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::RetailError;
use crate::schema::{
    COUNTRY, DESCRIPTION, INVOICE, INVOICE_DATE, QUANTITY, RAW_COLUMNS, RAW_CUSTOMER_ID,
    RAW_PRICE, STOCK_CODE,
};

/// Timestamp layouts accepted for string-typed `InvoiceDate` values
const DATE_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M",
];

/// Spreadsheet extensions handed to the workbook reader
const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// Load a raw invoice-line table and normalise it to the raw schema
///
/// # Arguments
/// * `path` - Path to a `.csv`, `.parquet` or spreadsheet (`.xlsx`, `.xlsm`,
///   `.xls`, `.ods`) file. Spreadsheets are read from their first sheet.
///
/// # Returns
/// * Raw `DataFrame` with the columns of [`RAW_COLUMNS`], in that order
///
/// # Errors
/// Fails on an unsupported extension, a missing required column, or
/// timestamps that cannot be parsed.
pub fn load_raw(path: impl AsRef<Path>) -> crate::Result<DataFrame> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let frame = match ext.as_str() {
        // Every column is read as text so codes such as `01234` keep their
        // leading zeros; `normalize_raw` casts the numeric columns.
        "csv" => LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?,
        "parquet" => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?.collect()?,
        sheet if WORKBOOK_EXTENSIONS.contains(&sheet) => load_workbook(path)?,
        other => return Err(RetailError::UnsupportedFormat(other.to_string())),
    };

    info!(path = %path.display(), rows = frame.height(), "loaded raw transactions");
    normalize_raw(frame)
}

/// Validate and cast an in-memory raw table to the canonical raw dtypes
///
/// Missing prices are read as `0` so the repair stage treats them as unknown.
/// Columns outside the raw schema are dropped.
pub fn normalize_raw(frame: DataFrame) -> crate::Result<DataFrame> {
    require_columns(&frame)?;

    let mut frame = frame;
    let dates = parse_invoice_dates(frame.column(INVOICE_DATE)?.as_materialized_series())?;
    frame.with_column(dates)?;

    let normalized = frame
        .lazy()
        .select([
            col(INVOICE).cast(DataType::String),
            col(STOCK_CODE).cast(DataType::String),
            col(DESCRIPTION).cast(DataType::String),
            col(QUANTITY).cast(DataType::Int64),
            col(INVOICE_DATE),
            col(RAW_PRICE).cast(DataType::Float64).fill_null(lit(0.0)),
            col(RAW_CUSTOMER_ID).cast(DataType::Float64),
            col(COUNTRY).cast(DataType::String),
        ])
        .collect()?;

    for name in [INVOICE, STOCK_CODE, QUANTITY, INVOICE_DATE] {
        let count = normalized.column(name)?.null_count();
        if count > 0 {
            return Err(RetailError::MissingValues {
                column: name.to_string(),
                count,
            });
        }
    }

    debug!(rows = normalized.height(), "normalised raw schema");
    Ok(normalized)
}

/// Read the first sheet of a workbook
fn load_workbook(path: &Path) -> crate::Result<DataFrame> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RetailError::EmptyWorkbook(path.display().to_string()))??;
    debug!(rows = sheet.height(), columns = sheet.width(), "read first worksheet");
    sheet_to_frame(&sheet)
}

/// Build a raw table from a worksheet whose first row holds the headers
///
/// Only the raw columns are kept. Identifier and text columns become strings
/// (whole numbers lose their `.0`), `Quantity` becomes an integer, the price
/// and customer columns become floats, and `InvoiceDate` becomes text in a
/// layout [`normalize_raw`] parses.
fn sheet_to_frame(sheet: &Range<Data>) -> crate::Result<DataFrame> {
    let mut rows = sheet.rows();
    let header: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(cell_text).map(Option::unwrap_or_default).collect())
        .unwrap_or_default();
    let body: Vec<&[Data]> = rows.collect();

    let mut columns = Vec::with_capacity(RAW_COLUMNS.len());
    for name in RAW_COLUMNS {
        let index = header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| RetailError::MissingColumn(name.to_string()))?;
        let cells = body.iter().map(|row| row.get(index));

        let column = match name {
            QUANTITY => Column::new(
                name.into(),
                cells
                    .map(|c| c.and_then(cell_number).map(|v| v as i64))
                    .collect::<Vec<_>>(),
            ),
            RAW_PRICE | RAW_CUSTOMER_ID => Column::new(
                name.into(),
                cells.map(|c| c.and_then(cell_number)).collect::<Vec<_>>(),
            ),
            INVOICE_DATE => Column::new(
                name.into(),
                cells.map(|c| c.and_then(cell_timestamp)).collect::<Vec<_>>(),
            ),
            _ => Column::new(
                name.into(),
                cells.map(|c| c.and_then(cell_text)).collect::<Vec<_>>(),
            ),
        };
        columns.push(column);
    }

    Ok(DataFrame::new(columns)?)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Int(v) => Some(v.to_string()),
        Data::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => Some(format!("{}", *v as i64)),
        Data::Float(v) => Some(v.to_string()),
        Data::Bool(v) => Some(v.to_string()),
        Data::DateTime(_) => cell_timestamp(cell),
        _ => None,
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(v) => Some(*v),
        Data::Int(v) => Some(*v as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cell_timestamp(cell: &Data) -> Option<String> {
    match cell {
        Data::DateTime(value) => value
            .as_datetime()
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string()),
        Data::String(s) | Data::DateTimeIso(s) => Some(s.clone()),
        _ => None,
    }
}

fn require_columns(frame: &DataFrame) -> crate::Result<()> {
    let present = frame.get_column_names();
    for required in RAW_COLUMNS {
        if !present.iter().any(|name| name.as_str() == required) {
            return Err(RetailError::MissingColumn(required.to_string()));
        }
    }
    Ok(())
}

/// Convert `InvoiceDate` to a microsecond datetime series
fn parse_invoice_dates(dates: &Series) -> crate::Result<Series> {
    let target = DataType::Datetime(TimeUnit::Microseconds, None);

    let parsed = match dates.dtype() {
        DataType::Date | DataType::Datetime(_, _) => dates.cast(&target)?,
        DataType::String => {
            let micros: Vec<Option<i64>> = dates
                .str()?
                .into_iter()
                .map(|value| value.and_then(parse_timestamp))
                .map(|value| value.map(|ts| ts.and_utc().timestamp_micros()))
                .collect();
            Series::new(dates.name().clone(), micros).cast(&target)?
        }
        other => {
            return Err(RetailError::UnsupportedType {
                column: INVOICE_DATE.to_string(),
                dtype: other.to_string(),
            })
        }
    };

    let unparsed = parsed.null_count().saturating_sub(dates.null_count());
    if unparsed > 0 {
        return Err(RetailError::UnparseableDate {
            column: INVOICE_DATE.to_string(),
            count: unparsed,
        });
    }
    Ok(parsed)
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}
