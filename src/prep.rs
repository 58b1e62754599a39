//! Repair, pruning and feature derivation for invoice-line tables
//!
//! Stages run strictly in order: raw → repaired → clean → enriched. Each one
//! takes the previous table by reference and builds a new one through the lazy
//! API, returning a report of what it changed alongside the new table.

use polars::prelude::*;
use tracing::{debug, info};

use crate::policy::non_product_expr;
use crate::schema::{
    TransactionType, CANCELLATION_PREFIX, CLEAN_COLUMNS, COUNTRY, CUSTOMER_ID, DAY, DESCRIPTION,
    ENRICHED_COLUMNS, INVOICE, INVOICE_DATE, MONTH, QUANTITY, RAW_CUSTOMER_ID, RAW_PRICE,
    STOCK_CODE, TIME, TOTAL_PRICE, TYPE, UNIT_PRICE, UNKNOWN_CUSTOMER, WEEKDAY, YEAR,
};

const ROW_INDEX: &str = "RowIndex";
const OCCURRENCES: &str = "Occurrences";
const DESCRIPTION_MODE: &str = "DescriptionMode";
const PRICE_MODE: &str = "PriceMode";

/// Values filled in by [`repair_transactions`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub descriptions_repaired: usize,
    pub prices_repaired: usize,
    pub customers_defaulted: usize,
}

/// Rows dropped by [`clean_transactions`], counted in the order the filters run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub missing_description_dropped: usize,
    pub zero_price_dropped: usize,
    pub non_product_dropped: usize,
}

impl CleanReport {
    pub fn total_dropped(&self) -> usize {
        self.missing_description_dropped + self.zero_price_dropped + self.non_product_dropped
    }
}

/// Labels assigned by [`enrich_transactions`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub sales: usize,
    pub returns: usize,
    pub cancellations: usize,
    pub columns_added: Vec<String>,
}

impl EnrichReport {
    pub fn count(&self, kind: TransactionType) -> usize {
        match kind {
            TransactionType::Sale => self.sales,
            TransactionType::Return => self.returns,
            TransactionType::Cancellation => self.cancellations,
        }
    }
}

/// Output of the complete preparation pipeline
#[derive(Debug, Clone)]
pub struct Prepared {
    pub frame: DataFrame,
    pub repair: RepairReport,
    pub clean: CleanReport,
    pub enrich: EnrichReport,
}

/// Most frequent non-null `value` for every distinct `key`
///
/// Produces one row per key that has at least one non-null value, with
/// columns `[key, alias]`. Equal frequencies resolve to the smallest value.
pub fn mode_by_group(frame: LazyFrame, key: &str, value: Expr, alias: &str) -> LazyFrame {
    frame
        .select([col(key), value.alias(alias)])
        .filter(col(alias).is_not_null())
        .group_by([col(key), col(alias)])
        .agg([len().alias(OCCURRENCES)])
        .group_by([col(key)])
        .agg([col(alias)
            .sort_by(
                [col(OCCURRENCES), col(alias)],
                SortMultipleOptions::default().with_order_descending_multi([true, false]),
            )
            .first()])
}

/// Impute missing descriptions, zero prices and missing customers
///
/// Descriptions and prices are filled with the per-`StockCode` mode of the
/// known values; codes with no known value keep the gap for the pruning stage.
/// Missing customers become the unknown-customer sentinel. Row count and row
/// order are preserved.
pub fn repair_transactions(raw: &DataFrame) -> crate::Result<(DataFrame, RepairReport)> {
    let missing_descriptions = raw.column(DESCRIPTION)?.null_count();
    let zero_prices = count_zero_prices(raw, RAW_PRICE)?;
    let missing_customers = raw.column(RAW_CUSTOMER_ID)?.null_count();

    let rows = raw.clone().lazy().with_row_index(ROW_INDEX, None);
    let descriptions = mode_by_group(rows.clone(), STOCK_CODE, col(DESCRIPTION), DESCRIPTION_MODE);
    let known_price = when(col(RAW_PRICE).eq(lit(0.0)))
        .then(lit(NULL))
        .otherwise(col(RAW_PRICE));
    let prices = mode_by_group(rows.clone(), STOCK_CODE, known_price, PRICE_MODE);

    let repaired = rows
        .join(
            descriptions,
            [col(STOCK_CODE)],
            [col(STOCK_CODE)],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            prices,
            [col(STOCK_CODE)],
            [col(STOCK_CODE)],
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs([col(ROW_INDEX)], SortMultipleOptions::default())
        .select([
            col(INVOICE),
            col(STOCK_CODE),
            col(DESCRIPTION).fill_null(col(DESCRIPTION_MODE)).alias(DESCRIPTION),
            col(QUANTITY),
            col(INVOICE_DATE),
            when(col(RAW_PRICE).eq(lit(0.0)).and(col(PRICE_MODE).is_not_null()))
                .then(col(PRICE_MODE))
                .otherwise(col(RAW_PRICE))
                .alias(RAW_PRICE),
            col(RAW_CUSTOMER_ID)
                .fill_null(lit(UNKNOWN_CUSTOMER as f64))
                .alias(RAW_CUSTOMER_ID),
            col(COUNTRY),
        ])
        .collect()?;

    let report = RepairReport {
        descriptions_repaired: missing_descriptions
            .saturating_sub(repaired.column(DESCRIPTION)?.null_count()),
        prices_repaired: zero_prices.saturating_sub(count_zero_prices(&repaired, RAW_PRICE)?),
        customers_defaulted: missing_customers,
    };

    info!(
        descriptions = report.descriptions_repaired,
        prices = report.prices_repaired,
        customers = report.customers_defaulted,
        "repaired transactions"
    );
    Ok((repaired, report))
}

/// Drop rows that repair could not fix and rows that are not product sales
///
/// Renames `Price` to `UnitPrice` and `Customer ID` to `CustomerID`, the
/// latter as an integer column where `0` marks an unknown customer.
pub fn clean_transactions(repaired: &DataFrame) -> crate::Result<(DataFrame, CleanReport)> {
    let mut report = CleanReport::default();

    let described = repaired
        .clone()
        .lazy()
        .filter(col(DESCRIPTION).is_not_null())
        .collect()?;
    report.missing_description_dropped = repaired.height() - described.height();

    let priced = described
        .clone()
        .lazy()
        .filter(col(RAW_PRICE).neq(lit(0.0)))
        .collect()?;
    report.zero_price_dropped = described.height() - priced.height();

    let cleaned = priced
        .clone()
        .lazy()
        .filter(non_product_expr().not())
        .select([
            col(INVOICE),
            col(STOCK_CODE),
            col(DESCRIPTION),
            col(QUANTITY),
            col(INVOICE_DATE),
            col(RAW_PRICE).alias(UNIT_PRICE),
            col(RAW_CUSTOMER_ID)
                .fill_null(lit(UNKNOWN_CUSTOMER as f64))
                .cast(DataType::Int64)
                .alias(CUSTOMER_ID),
            col(COUNTRY),
        ])
        .collect()?;
    report.non_product_dropped = priced.height() - cleaned.height();

    info!(
        missing_description = report.missing_description_dropped,
        zero_price = report.zero_price_dropped,
        non_product = report.non_product_dropped,
        remaining = cleaned.height(),
        "cleaned transactions"
    );
    Ok((cleaned, report))
}

/// Transaction label, later rules taking precedence:
/// positive quantity is a sale, a `C` invoice is always a cancellation,
/// and anything else is a return.
pub fn transaction_type_expr() -> Expr {
    when(col(INVOICE).str().starts_with(lit(CANCELLATION_PREFIX)))
        .then(lit(TransactionType::Cancellation.as_str()))
        .when(col(QUANTITY).gt(lit(0)))
        .then(lit(TransactionType::Sale.as_str()))
        .otherwise(lit(TransactionType::Return.as_str()))
}

/// Add calendar fields, `TotalPrice` and the transaction `Type`
///
/// Never adds or removes rows. Output columns follow [`ENRICHED_COLUMNS`].
pub fn enrich_transactions(clean: &DataFrame) -> crate::Result<(DataFrame, EnrichReport)> {
    let date = || col(INVOICE_DATE).dt();

    let enriched = clean
        .clone()
        .lazy()
        .with_columns([
            date().to_string("%a").alias(WEEKDAY),
            date().year().cast(DataType::Int32).alias(YEAR),
            date().month().cast(DataType::Int32).alias(MONTH),
            date().day().cast(DataType::Int32).alias(DAY),
            date().to_string("%H:%M:%S").alias(TIME),
            (col(QUANTITY).cast(DataType::Float64) * col(UNIT_PRICE)).alias(TOTAL_PRICE),
            transaction_type_expr().alias(TYPE),
        ])
        .select(ENRICHED_COLUMNS.map(col))
        .collect()?;

    let mut report = EnrichReport {
        columns_added: ENRICHED_COLUMNS
            .iter()
            .filter(|name| !CLEAN_COLUMNS.contains(*name))
            .map(|name| name.to_string())
            .collect(),
        ..EnrichReport::default()
    };
    for label in enriched.column(TYPE)?.as_materialized_series().str()?.into_iter().flatten() {
        match label {
            "Sale" => report.sales += 1,
            "Return" => report.returns += 1,
            _ => report.cancellations += 1,
        }
    }

    info!(
        sales = report.sales,
        returns = report.returns,
        cancellations = report.cancellations,
        "enriched transactions"
    );
    debug!(columns = ?report.columns_added, "derived columns");
    Ok((enriched, report))
}

/// Run repair, cleaning and enrichment over a normalised raw table
pub fn prepare(raw: &DataFrame) -> crate::Result<Prepared> {
    let (repaired, repair) = repair_transactions(raw)?;
    let (cleaned, clean) = clean_transactions(&repaired)?;
    let (frame, enrich) = enrich_transactions(&cleaned)?;

    Ok(Prepared {
        frame,
        repair,
        clean,
        enrich,
    })
}

fn count_zero_prices(frame: &DataFrame, price_column: &str) -> crate::Result<usize> {
    Ok(frame
        .clone()
        .lazy()
        .filter(col(price_column).eq(lit(0.0)))
        .collect()?
        .height())
}
