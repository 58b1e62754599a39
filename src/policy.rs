//! Stock codes that do not represent product sales

use polars::prelude::*;

use crate::schema::{QUANTITY, STOCK_CODE};

/// Postage, bank charges, test entries, manual adjustments and sample codes.
/// Matched exactly and case-sensitively.
pub const NON_PRODUCT_CODES: [&str; 15] = [
    "POST",
    "D",
    "DOT",
    "M",
    "C2",
    "BANK CHARGES",
    "TEST001",
    "TEST002",
    "PADS",
    "m",
    "S",
    "B",
    "ADJUST2",
    "AMAZONFEE",
    "ADJUST",
];

/// Predicate selecting rows whose `StockCode` is on the denylist
pub fn non_product_expr() -> Expr {
    NON_PRODUCT_CODES
        .iter()
        .fold(lit(false), |acc, code| acc.or(col(STOCK_CODE).eq(lit(*code))))
}

/// Value carried by denylisted rows relative to the whole table
#[derive(Debug, Clone, PartialEq)]
pub struct NonProductSummary {
    pub rows: usize,
    /// Signed value (`Quantity * price`) of denylisted rows
    pub net: f64,
    /// Unsigned value (`|Quantity| * price`) of denylisted rows
    pub gross: f64,
    pub net_share: f64,
    pub gross_share: f64,
}

/// Summarise how much value the denylisted codes account for
///
/// `price_column` is `Price` on a raw or repaired table and `UnitPrice`
/// after cleaning. Shares are NaN when the table total is zero.
pub fn non_product_summary(
    frame: &DataFrame,
    price_column: &str,
) -> crate::Result<NonProductSummary> {
    let net = col(QUANTITY).cast(DataType::Float64) * col(price_column);
    let gross = col(QUANTITY).abs().cast(DataType::Float64) * col(price_column);
    let flagged = non_product_expr();

    let totals = frame
        .clone()
        .lazy()
        .select([
            net.clone().sum().alias("TotalNet"),
            gross.clone().sum().alias("TotalGross"),
            net.filter(flagged.clone()).sum().alias("Net"),
            gross.filter(flagged.clone()).sum().alias("Gross"),
            col(STOCK_CODE)
                .filter(flagged)
                .count()
                .cast(DataType::Int64)
                .alias("Rows"),
        ])
        .collect()?;

    let value = |name: &str| -> crate::Result<f64> {
        Ok(totals
            .column(name)?
            .as_materialized_series()
            .f64()?
            .get(0)
            .unwrap_or(0.0))
    };
    let rows = totals
        .column("Rows")?
        .as_materialized_series()
        .i64()?
        .get(0)
        .unwrap_or(0);

    let (net, gross) = (value("Net")?, value("Gross")?);
    let (total_net, total_gross) = (value("TotalNet")?, value("TotalGross")?);

    Ok(NonProductSummary {
        rows: usize::try_from(rows).unwrap_or(0),
        net,
        gross,
        net_share: crate::ratio(net, total_net),
        gross_share: crate::ratio(gross, total_gross),
    })
}
