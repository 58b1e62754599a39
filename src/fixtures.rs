//! Table builders and column readers shared by unit tests

use polars::prelude::*;

use crate::data::normalize_raw;
use crate::schema::{
    COUNTRY, DESCRIPTION, INVOICE, INVOICE_DATE, QUANTITY, RAW_CUSTOMER_ID, RAW_PRICE, STOCK_CODE,
};

#[derive(Debug, Clone)]
pub struct RawRow {
    pub invoice: &'static str,
    pub stock_code: &'static str,
    pub description: Option<&'static str>,
    pub quantity: i64,
    pub date: &'static str,
    pub price: f64,
    pub customer: Option<f64>,
    pub country: &'static str,
}

impl RawRow {
    pub fn new(
        invoice: &'static str,
        stock_code: &'static str,
        quantity: i64,
        price: f64,
        date: &'static str,
    ) -> Self {
        Self {
            invoice,
            stock_code,
            description: Some("ITEM"),
            quantity,
            date,
            price,
            customer: Some(1.0),
            country: "United Kingdom",
        }
    }

    pub fn description(mut self, description: Option<&'static str>) -> Self {
        self.description = description;
        self
    }

    pub fn customer(mut self, customer: Option<f64>) -> Self {
        self.customer = customer;
        self
    }

    pub fn country(mut self, country: &'static str) -> Self {
        self.country = country;
        self
    }
}

/// Build a normalised raw table from rows
pub fn raw_table(rows: &[RawRow]) -> DataFrame {
    let frame = df!(
        INVOICE => rows.iter().map(|r| r.invoice).collect::<Vec<_>>(),
        STOCK_CODE => rows.iter().map(|r| r.stock_code).collect::<Vec<_>>(),
        DESCRIPTION => rows.iter().map(|r| r.description).collect::<Vec<_>>(),
        QUANTITY => rows.iter().map(|r| r.quantity).collect::<Vec<_>>(),
        INVOICE_DATE => rows.iter().map(|r| r.date).collect::<Vec<_>>(),
        RAW_PRICE => rows.iter().map(|r| r.price).collect::<Vec<_>>(),
        RAW_CUSTOMER_ID => rows.iter().map(|r| r.customer).collect::<Vec<_>>(),
        COUNTRY => rows.iter().map(|r| r.country).collect::<Vec<_>>()
    )
    .unwrap();
    normalize_raw(frame).unwrap()
}

/// Run the full preparation pipeline over rows
pub fn enriched_table(rows: &[RawRow]) -> DataFrame {
    crate::prep::prepare(&raw_table(rows)).unwrap().frame
}

pub fn strings(frame: &DataFrame, name: &str) -> Vec<Option<String>> {
    frame
        .column(name)
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect()
}

pub fn floats(frame: &DataFrame, name: &str) -> Vec<f64> {
    frame
        .column(name)
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect()
}

pub fn ints(frame: &DataFrame, name: &str) -> Vec<i64> {
    frame
        .column(name)
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Int64)
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
