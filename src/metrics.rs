//! Business metrics over the enriched transaction table
//!
//! Every function takes the enriched table by reference and returns a new
//! summary table or value. Cancellations are excluded from every revenue figure.
//! Ratios with a zero denominator come back as NaN rather than zero.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike};
use polars::prelude::*;
use tracing::debug;

use crate::error::RetailError;
use crate::schema::{
    TransactionType, COUNTRY, CUSTOMER_ID, DESCRIPTION, INVOICE, INVOICE_DATE, QUANTITY,
    STOCK_CODE, TOTAL_PRICE, TYPE, UNKNOWN_CUSTOMER,
};

pub const YEAR_MONTH: &str = "YearMonth";
pub const SEASON_YEAR: &str = "SeasonYear";
pub const REVENUE: &str = "Revenue";
pub const AOV: &str = "AOV";
pub const PERCENTAGE: &str = "Percentage";
pub const CUMULATIVE_PERCENTAGE: &str = "CumulativePercentage";
pub const RETURNS: &str = "Returns";
pub const ITEMS_SOLD: &str = "ItemsSold";
pub const RETURN_RATE: &str = "ReturnRate";
pub const FIRST_REVENUE: &str = "FirstRevenue";
pub const LAST_REVENUE: &str = "LastRevenue";
pub const TOTAL_GROWTH: &str = "TotalGrowth";

const SEASON: &str = "Season";
const SEASON_ORDER: &str = "SeasonOrder";
const SEASON_YEAR_NUM: &str = "SeasonYearNum";
const MONTHS: &str = "Months";
const ORDER_TOTAL: &str = "OrderTotal";
const INVOICES: &str = "Invoices";
const NET_QUANTITY: &str = "NetQuantity";

/// A calendar month such as `2010-12`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> crate::Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(RetailError::invalid_parameter(
                "month",
                &format!("{year}-{month}"),
                "YYYY-MM with a month of 01-12",
            ));
        }
        Ok(Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RetailError::invalid_parameter("month", s, "YYYY-MM");
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

/// Settings shared by the period-based metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// First month that is not fully covered by the data. Rows from this
    /// month onward are left out of period-based metrics.
    pub incomplete_month: YearMonth,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            incomplete_month: YearMonth {
                year: 2010,
                month: 12,
            },
        }
    }
}

impl MetricsConfig {
    /// Treat the month of the latest `InvoiceDate` as incomplete
    ///
    /// Falls back to the default for an empty table.
    pub fn from_latest(frame: &DataFrame) -> crate::Result<Self> {
        let latest = frame
            .clone()
            .lazy()
            .select([col(INVOICE_DATE).max().cast(DataType::Int64)])
            .collect()?;
        let micros = latest
            .column(INVOICE_DATE)?
            .as_materialized_series()
            .i64()?
            .get(0);

        match micros.and_then(DateTime::from_timestamp_micros) {
            Some(ts) => Ok(Self {
                incomplete_month: YearMonth::new(ts.year(), ts.month())?,
            }),
            None => Ok(Self::default()),
        }
    }

    fn cutoff(&self) -> Expr {
        lit(self.incomplete_month.to_string())
    }
}

/// Bucketing for [`revenue_by_period`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevenuePeriod {
    Month,
    /// Meteorological seasons; December counts toward the following year's winter
    Season,
}

impl FromStr for RevenuePeriod {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "month" => Ok(Self::Month),
            "season" => Ok(Self::Season),
            _ => Err(RetailError::invalid_parameter("period", s, "month, season")),
        }
    }
}

/// Grouping for [`average_order_value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AovPeriod {
    Total,
    Month,
}

impl FromStr for AovPeriod {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "total" => Ok(Self::Total),
            "month" => Ok(Self::Month),
            _ => Err(RetailError::invalid_parameter("period", s, "total, month")),
        }
    }
}

/// Revenue from customers with two or more invoices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepeatRevenue {
    pub customers: usize,
    pub repeat_customers: usize,
    pub total_revenue: f64,
    pub repeat_revenue: f64,
    /// `repeat_revenue / total_revenue`
    pub share: f64,
}

/// Customers ranked by revenue
#[derive(Debug, Clone)]
pub struct CustomerConcentration {
    /// `[CustomerID, Revenue, Percentage, CumulativePercentage]`, known customers only
    pub table: DataFrame,
    /// Fraction of non-cancelled rows with an unknown customer
    pub unknown_share: f64,
}

/// First-to-last month revenue growth per country
#[derive(Debug, Clone)]
pub struct MarketGrowth {
    /// `[Country, FirstRevenue, LastRevenue, TotalGrowth]`
    pub table: DataFrame,
    /// Countries with any revenue in the observed months
    pub countries: usize,
    /// Countries missing revenue in at least one observed month
    pub excluded: usize,
}

impl MarketGrowth {
    pub fn qualifying_share(&self) -> f64 {
        crate::ratio((self.countries - self.excluded) as f64, self.countries as f64)
    }
}

/// Revenue per calendar month or per season
///
/// Rows from the incomplete month onward are dropped. Seasons additionally
/// require all three of their months to be present.
///
/// # Returns
/// * `[YearMonth, Revenue]` or `[SeasonYear, Revenue]`, oldest first
pub fn revenue_by_period(
    frame: &DataFrame,
    period: RevenuePeriod,
    config: &MetricsConfig,
) -> crate::Result<DataFrame> {
    let completed = without_cancellations(frame)
        .with_column(year_month_expr())
        .filter(col(YEAR_MONTH).lt(config.cutoff()));

    let output = match period {
        RevenuePeriod::Month => completed
            .group_by([col(YEAR_MONTH)])
            .agg([col(TOTAL_PRICE).sum().alias(REVENUE)])
            .sort_by_exprs([col(YEAR_MONTH)], SortMultipleOptions::default()),
        RevenuePeriod::Season => {
            let month = || col(INVOICE_DATE).dt().month();
            completed
                .with_columns([
                    season_expr().alias(SEASON),
                    season_order_expr().alias(SEASON_ORDER),
                    (col(INVOICE_DATE).dt().year()
                        + when(month().eq(lit(12))).then(lit(1)).otherwise(lit(0)))
                    .alias(SEASON_YEAR_NUM),
                ])
                .group_by([col(SEASON_YEAR_NUM), col(SEASON_ORDER), col(SEASON)])
                .agg([
                    col(TOTAL_PRICE).sum().alias(REVENUE),
                    col(YEAR_MONTH).n_unique().cast(DataType::Int64).alias(MONTHS),
                ])
                .filter(col(MONTHS).eq(lit(3i64)))
                .sort_by_exprs(
                    [col(SEASON_YEAR_NUM), col(SEASON_ORDER)],
                    SortMultipleOptions::default(),
                )
                .select([
                    concat_str(
                        [col(SEASON), lit("-"), col(SEASON_YEAR_NUM).cast(DataType::String)],
                        "",
                        false,
                    )
                    .alias(SEASON_YEAR),
                    col(REVENUE),
                ])
        }
    };

    Ok(output.collect()?)
}

/// Mean invoice total, overall or per month
///
/// Invoice totals are summed before averaging. Both variants drop invoices
/// dated in or after the incomplete month. Values are left unrounded.
///
/// # Returns
/// * `[AOV]` (one row, none when no invoice qualifies) or `[YearMonth, AOV]`
pub fn average_order_value(
    frame: &DataFrame,
    period: AovPeriod,
    config: &MetricsConfig,
) -> crate::Result<DataFrame> {
    let output = match period {
        AovPeriod::Total => without_cancellations(frame)
            .with_column(year_month_expr())
            .filter(col(YEAR_MONTH).lt(config.cutoff()))
            .group_by([col(INVOICE)])
            .agg([col(TOTAL_PRICE).sum().alias(ORDER_TOTAL)])
            .select([col(ORDER_TOTAL).mean().alias(AOV)])
            .filter(col(AOV).is_not_null()),
        AovPeriod::Month => without_cancellations(frame)
            .group_by([col(INVOICE), col(INVOICE_DATE)])
            .agg([col(TOTAL_PRICE).sum().alias(ORDER_TOTAL)])
            .with_column(year_month_expr())
            .filter(col(YEAR_MONTH).lt(config.cutoff()))
            .group_by([col(YEAR_MONTH)])
            .agg([col(ORDER_TOTAL).mean().alias(AOV)])
            .sort_by_exprs([col(YEAR_MONTH)], SortMultipleOptions::default()),
    };

    Ok(output.collect()?)
}

/// Share of known-customer revenue coming from repeat customers
///
/// A repeat customer appears on at least two distinct non-cancelled invoices.
pub fn repeat_customer_revenue(frame: &DataFrame) -> crate::Result<RepeatRevenue> {
    let is_repeat = || col(INVOICES).gt_eq(lit(2i64));

    let totals = without_cancellations(frame)
        .filter(col(CUSTOMER_ID).neq(lit(UNKNOWN_CUSTOMER)))
        .group_by([col(CUSTOMER_ID)])
        .agg([
            col(INVOICE).n_unique().cast(DataType::Int64).alias(INVOICES),
            col(TOTAL_PRICE).sum().alias(REVENUE),
        ])
        .select([
            len().cast(DataType::Int64).alias("Customers"),
            is_repeat().sum().cast(DataType::Int64).alias("RepeatCustomers"),
            col(REVENUE).sum().alias("TotalRevenue"),
            col(REVENUE).filter(is_repeat()).sum().alias("RepeatRevenue"),
        ])
        .collect()?;

    let total_revenue = scalar_f64(&totals, "TotalRevenue")?;
    let repeat_revenue = scalar_f64(&totals, "RepeatRevenue")?;

    Ok(RepeatRevenue {
        customers: scalar_count(&totals, "Customers")?,
        repeat_customers: scalar_count(&totals, "RepeatCustomers")?,
        total_revenue,
        repeat_revenue,
        share: crate::ratio(repeat_revenue, total_revenue),
    })
}

/// Known customers ranked by revenue with their cumulative share
pub fn customer_concentration(frame: &DataFrame) -> crate::Result<CustomerConcentration> {
    let counts = without_cancellations(frame)
        .select([
            len().cast(DataType::Int64).alias("Rows"),
            col(CUSTOMER_ID)
                .eq(lit(UNKNOWN_CUSTOMER))
                .sum()
                .cast(DataType::Int64)
                .alias("Unknown"),
        ])
        .collect()?;
    let unknown_share = crate::ratio(
        scalar_count(&counts, "Unknown")? as f64,
        scalar_count(&counts, "Rows")? as f64,
    );

    let table = without_cancellations(frame)
        .filter(col(CUSTOMER_ID).neq(lit(UNKNOWN_CUSTOMER)))
        .group_by([col(CUSTOMER_ID)])
        .agg([col(TOTAL_PRICE).sum().alias(REVENUE)])
        .sort_by_exprs(
            [col(REVENUE), col(CUSTOMER_ID)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .with_column(share_of_total(REVENUE).alias(PERCENTAGE))
        .with_column(col(PERCENTAGE).cum_sum(false).alias(CUMULATIVE_PERCENTAGE))
        .select([
            col(CUSTOMER_ID).cast(DataType::String),
            col(REVENUE),
            col(PERCENTAGE),
            col(CUMULATIVE_PERCENTAGE),
        ])
        .collect()?;

    debug!(customers = table.height(), unknown_share, "customer concentration");
    Ok(CustomerConcentration {
        table,
        unknown_share,
    })
}

/// Returned value as a fraction of sold value
///
/// Cancellations fall in neither group. NaN when there are no sales.
pub fn return_percentage(frame: &DataFrame) -> crate::Result<f64> {
    let totals = frame
        .clone()
        .lazy()
        .select([
            col(TOTAL_PRICE)
                .filter(is_type(TransactionType::Sale))
                .sum()
                .alias("Sales"),
            col(TOTAL_PRICE)
                .filter(is_type(TransactionType::Return))
                .sum()
                .alias("Returns"),
        ])
        .collect()?;

    Ok(crate::ratio(
        scalar_f64(&totals, "Returns")?.abs(),
        scalar_f64(&totals, "Sales")?,
    ))
}

/// Products ranked by revenue with their share and net units
///
/// # Returns
/// * `[StockCode, Description, Revenue, Percentage, Quantity]`
pub fn product_concentration(frame: &DataFrame) -> crate::Result<DataFrame> {
    let output = without_cancellations(frame)
        .group_by_stable([col(STOCK_CODE)])
        .agg([
            col(DESCRIPTION).first(),
            col(TOTAL_PRICE).sum().alias(REVENUE),
            col(QUANTITY).sum(),
        ])
        .with_column(share_of_total(REVENUE).alias(PERCENTAGE))
        .sort_by_exprs(
            [col(REVENUE), col(STOCK_CODE)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .select([
            col(STOCK_CODE),
            col(DESCRIPTION),
            col(REVENUE),
            col(PERCENTAGE),
            col(QUANTITY),
        ])
        .collect()?;

    Ok(output)
}

/// Returned units over sold units per product
///
/// Only customer/product pairs with a positive lifetime quantity count; a
/// customer who returned more of a product than they bought is left out for
/// that product. Products with no surviving returns are omitted.
///
/// # Returns
/// * `[StockCode, Description, Returns, ItemsSold, ReturnRate]`, highest rate first
pub fn return_rates(frame: &DataFrame) -> crate::Result<DataFrame> {
    let pair = || [col(CUSTOMER_ID), col(STOCK_CODE)];

    let valid_pairs = without_cancellations(frame)
        .group_by(pair())
        .agg([col(QUANTITY).sum().alias(NET_QUANTITY)])
        .filter(col(NET_QUANTITY).gt(lit(0)))
        .select(pair());
    let scoped = without_cancellations(frame).join(
        valid_pairs,
        pair(),
        pair(),
        JoinArgs::new(JoinType::Inner),
    );

    let sold = scoped
        .clone()
        .filter(is_type(TransactionType::Sale))
        .group_by([col(STOCK_CODE)])
        .agg([col(QUANTITY).sum().alias(ITEMS_SOLD)]);
    let returned = scoped
        .filter(is_type(TransactionType::Return))
        .group_by([col(STOCK_CODE)])
        .agg([col(QUANTITY).sum().abs().alias(RETURNS)]);
    let descriptions = frame
        .clone()
        .lazy()
        .group_by_stable([col(STOCK_CODE)])
        .agg([col(DESCRIPTION).first()]);

    let output = returned
        .join(
            sold,
            [col(STOCK_CODE)],
            [col(STOCK_CODE)],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            descriptions,
            [col(STOCK_CODE)],
            [col(STOCK_CODE)],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(safe_ratio(col(RETURNS), col(ITEMS_SOLD)).alias(RETURN_RATE))
        .sort_by_exprs(
            [col(RETURN_RATE), col(STOCK_CODE)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .select([
            col(STOCK_CODE),
            col(DESCRIPTION),
            col(RETURNS),
            col(ITEMS_SOLD),
            col(RETURN_RATE),
        ])
        .collect()?;

    Ok(output)
}

/// Revenue growth from the first to the last observed month per country
///
/// Only countries with revenue in every observed month qualify; the rest are
/// counted in [`MarketGrowth::excluded`]. Rows from the incomplete month
/// onward are dropped first.
pub fn market_growth(frame: &DataFrame, config: &MetricsConfig) -> crate::Result<MarketGrowth> {
    let monthly = without_cancellations(frame)
        .with_column(year_month_expr())
        .filter(col(YEAR_MONTH).lt(config.cutoff()))
        .group_by([col(COUNTRY), col(YEAR_MONTH)])
        .agg([col(TOTAL_PRICE).sum().alias(REVENUE)])
        .collect()?;

    let months = monthly.column(YEAR_MONTH)?.as_materialized_series().n_unique()?;
    let countries = monthly.column(COUNTRY)?.as_materialized_series().n_unique()?;

    let table = monthly
        .lazy()
        .group_by([col(COUNTRY)])
        .agg([
            col(YEAR_MONTH).n_unique().cast(DataType::Int64).alias(MONTHS),
            col(REVENUE)
                .sort_by([col(YEAR_MONTH)], SortMultipleOptions::default())
                .first()
                .alias(FIRST_REVENUE),
            col(REVENUE)
                .sort_by([col(YEAR_MONTH)], SortMultipleOptions::default())
                .last()
                .alias(LAST_REVENUE),
        ])
        .filter(col(MONTHS).eq(lit(months as i64)))
        .with_column(
            safe_ratio(col(LAST_REVENUE) - col(FIRST_REVENUE), col(FIRST_REVENUE))
                .alias(TOTAL_GROWTH),
        )
        .sort_by_exprs(
            [col(TOTAL_GROWTH), col(COUNTRY)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .select([
            col(COUNTRY),
            col(FIRST_REVENUE),
            col(LAST_REVENUE),
            col(TOTAL_GROWTH),
        ])
        .collect()?;

    let excluded = countries - table.height();
    debug!(countries, excluded, months, "market growth");
    Ok(MarketGrowth {
        table,
        countries,
        excluded,
    })
}

/// Revenue per country and its share of the total
///
/// # Returns
/// * `[Country, Revenue, Percentage]`, highest revenue first
pub fn revenue_by_country(frame: &DataFrame) -> crate::Result<DataFrame> {
    let output = without_cancellations(frame)
        .group_by([col(COUNTRY)])
        .agg([col(TOTAL_PRICE).sum().alias(REVENUE)])
        .with_column(share_of_total(REVENUE).alias(PERCENTAGE))
        .sort_by_exprs(
            [col(REVENUE), col(COUNTRY)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?;

    Ok(output)
}

fn without_cancellations(frame: &DataFrame) -> LazyFrame {
    frame
        .clone()
        .lazy()
        .filter(col(TYPE).neq(lit(TransactionType::Cancellation.as_str())))
}

fn is_type(kind: TransactionType) -> Expr {
    col(TYPE).eq(lit(kind.as_str()))
}

fn year_month_expr() -> Expr {
    col(INVOICE_DATE).dt().to_string("%Y-%m").alias(YEAR_MONTH)
}

fn season_expr() -> Expr {
    let month = || col(INVOICE_DATE).dt().month();
    when(month().eq(lit(12)).or(month().lt_eq(lit(2))))
        .then(lit("Winter"))
        .when(month().lt_eq(lit(5)))
        .then(lit("Spring"))
        .when(month().lt_eq(lit(8)))
        .then(lit("Summer"))
        .otherwise(lit("Fall"))
}

fn season_order_expr() -> Expr {
    let month = || col(INVOICE_DATE).dt().month();
    when(month().eq(lit(12)).or(month().lt_eq(lit(2))))
        .then(lit(1))
        .when(month().lt_eq(lit(5)))
        .then(lit(2))
        .when(month().lt_eq(lit(8)))
        .then(lit(3))
        .otherwise(lit(4))
}

/// `numerator / denominator`, NaN where the denominator is zero
fn safe_ratio(numerator: Expr, denominator: Expr) -> Expr {
    let numerator = numerator.cast(DataType::Float64);
    let denominator = denominator.cast(DataType::Float64);
    when(denominator.clone().eq(lit(0.0)))
        .then(lit(f64::NAN))
        .otherwise(numerator / denominator)
}

fn share_of_total(column: &str) -> Expr {
    safe_ratio(col(column), col(column).sum())
}

fn scalar_f64(frame: &DataFrame, name: &str) -> crate::Result<f64> {
    Ok(frame
        .column(name)?
        .as_materialized_series()
        .f64()?
        .get(0)
        .unwrap_or(0.0))
}

fn scalar_count(frame: &DataFrame, name: &str) -> crate::Result<usize> {
    let value = frame
        .column(name)?
        .as_materialized_series()
        .i64()?
        .get(0)
        .unwrap_or(0);
    Ok(usize::try_from(value).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{approx, enriched_table, floats, strings, RawRow};

    fn sample_rows() -> Vec<RawRow> {
        vec![
            RawRow::new("1001", "A", 2, 5.0, "2009-12-05 10:00:00")
                .description(Some("LANTERN"))
                .customer(Some(10.0)),
            RawRow::new("1002", "B", 1, 20.0, "2010-01-10 11:00:00")
                .description(Some("CLOCK"))
                .customer(Some(10.0)),
            RawRow::new("1003", "A", 4, 5.0, "2010-02-15 12:00:00")
                .description(Some("LANTERN"))
                .customer(Some(20.0))
                .country("France"),
            RawRow::new("1004", "A", -1, 5.0, "2010-02-20 12:00:00")
                .description(Some("LANTERN"))
                .customer(Some(20.0))
                .country("France"),
            RawRow::new("C1005", "B", -1, 20.0, "2010-02-21 09:00:00")
                .description(Some("CLOCK"))
                .customer(Some(10.0)),
            RawRow::new("1006", "C", 3, 2.0, "2010-12-01 08:00:00")
                .description(Some("CANDLE"))
                .customer(None),
            RawRow::new("1007", "B", 1, 20.0, "2010-03-03 15:00:00")
                .description(Some("CLOCK"))
                .customer(Some(30.0))
                .country("Germany"),
            RawRow::new("1008", "D", 1, 3.0, "2010-01-05 10:00:00")
                .description(Some("MUG"))
                .customer(Some(40.0))
                .country("Spain"),
            RawRow::new("1009", "D", -3, 3.0, "2010-01-06 10:00:00")
                .description(Some("MUG"))
                .customer(Some(40.0))
                .country("Spain"),
        ]
    }

    fn owned(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_revenue_by_month_drops_incomplete_month() {
        let frame = enriched_table(&sample_rows());
        let output =
            revenue_by_period(&frame, RevenuePeriod::Month, &MetricsConfig::default()).unwrap();

        assert_eq!(
            strings(&output, YEAR_MONTH),
            owned(&["2009-12", "2010-01", "2010-02", "2010-03"])
        );
        assert_eq!(floats(&output, REVENUE), vec![10.0, 14.0, 15.0, 20.0]);
    }

    #[test]
    fn test_revenue_by_season_keeps_full_seasons() {
        let frame = enriched_table(&sample_rows());
        let output =
            revenue_by_period(&frame, RevenuePeriod::Season, &MetricsConfig::default()).unwrap();

        assert_eq!(strings(&output, SEASON_YEAR), owned(&["Winter-2010"]));
        assert_eq!(floats(&output, REVENUE), vec![39.0]);
    }

    #[test]
    fn test_average_order_value() {
        let frame = enriched_table(&sample_rows());
        let config = MetricsConfig::default();

        let total = average_order_value(&frame, AovPeriod::Total, &config).unwrap();
        assert_eq!(total.height(), 1);
        // Invoice 1006 falls in the incomplete month
        assert!(approx(floats(&total, AOV)[0], 59.0 / 7.0));

        let monthly = average_order_value(&frame, AovPeriod::Month, &config).unwrap();
        assert_eq!(
            strings(&monthly, YEAR_MONTH),
            owned(&["2009-12", "2010-01", "2010-02", "2010-03"])
        );
        let values = floats(&monthly, AOV);
        assert!(approx(values[1], 14.0 / 3.0));
        assert!(approx(values[2], 7.5));
    }

    #[test]
    fn test_total_order_value_skips_incomplete_month() {
        let frame = enriched_table(&[
            RawRow::new("1", "A", 1, 10.0, "2010-11-20 10:00:00"),
            RawRow::new("2", "A", 1, 1000.0, "2010-12-02 10:00:00"),
        ]);
        let config = MetricsConfig::default();

        let total = average_order_value(&frame, AovPeriod::Total, &config).unwrap();
        assert_eq!(floats(&total, AOV), vec![10.0]);

        let later = MetricsConfig {
            incomplete_month: YearMonth::new(2010, 11).unwrap(),
        };
        let none = average_order_value(&frame, AovPeriod::Total, &later).unwrap();
        assert_eq!(none.height(), 0);
    }

    #[test]
    fn test_repeat_customer_revenue() {
        let frame = enriched_table(&sample_rows());
        let repeat = repeat_customer_revenue(&frame).unwrap();

        assert_eq!(repeat.customers, 4);
        assert_eq!(repeat.repeat_customers, 3);
        assert!(approx(repeat.total_revenue, 59.0));
        assert!(approx(repeat.repeat_revenue, 39.0));
        assert!(approx(repeat.share, 39.0 / 59.0));
    }

    #[test]
    fn test_customer_concentration() {
        let frame = enriched_table(&sample_rows());
        let concentration = customer_concentration(&frame).unwrap();

        assert!(approx(concentration.unknown_share, 1.0 / 8.0));
        assert_eq!(
            strings(&concentration.table, CUSTOMER_ID),
            owned(&["10", "30", "20", "40"])
        );
        let shares = floats(&concentration.table, PERCENTAGE);
        assert!(approx(shares.iter().sum::<f64>(), 1.0));
        let cumulative = floats(&concentration.table, CUMULATIVE_PERCENTAGE);
        assert!(approx(cumulative[0], 30.0 / 59.0));
        assert!(approx(*cumulative.last().unwrap(), 1.0));
    }

    #[test]
    fn test_return_percentage() {
        let frame = enriched_table(&sample_rows());
        assert!(approx(return_percentage(&frame).unwrap(), 14.0 / 79.0));
    }

    #[test]
    fn test_product_concentration() {
        let frame = enriched_table(&sample_rows());
        let output = product_concentration(&frame).unwrap();

        assert_eq!(strings(&output, STOCK_CODE), owned(&["B", "A", "C", "D"]));
        assert_eq!(
            strings(&output, DESCRIPTION),
            owned(&["CLOCK", "LANTERN", "CANDLE", "MUG"])
        );
        assert_eq!(floats(&output, REVENUE), vec![40.0, 25.0, 6.0, -6.0]);
        assert_eq!(floats(&output, QUANTITY), vec![2.0, 5.0, 3.0, -2.0]);
        assert!(approx(floats(&output, PERCENTAGE).iter().sum::<f64>(), 1.0));
    }

    #[test]
    fn test_return_rates_skip_over_returned_pairs() {
        let frame = enriched_table(&sample_rows());
        let output = return_rates(&frame).unwrap();

        assert_eq!(strings(&output, STOCK_CODE), owned(&["A"]));
        assert_eq!(strings(&output, DESCRIPTION), owned(&["LANTERN"]));
        assert_eq!(floats(&output, RETURNS), vec![1.0]);
        assert_eq!(floats(&output, ITEMS_SOLD), vec![6.0]);
        assert!(approx(floats(&output, RETURN_RATE)[0], 1.0 / 6.0));
    }

    #[test]
    fn test_market_growth() {
        let rows = vec![
            RawRow::new("1", "A", 10, 10.0, "2010-01-04 10:00:00"),
            RawRow::new("2", "A", 15, 10.0, "2010-02-04 10:00:00"),
            RawRow::new("3", "A", 5, 10.0, "2010-01-05 10:00:00").country("France"),
            RawRow::new("4", "A", 5, 5.0, "2010-02-05 10:00:00").country("France"),
            RawRow::new("5", "A", 1, 10.0, "2010-02-06 10:00:00").country("Spain"),
            RawRow::new("6", "A", 1, 10.0, "2010-01-07 10:00:00").country("Germany"),
            RawRow::new("7", "A", -1, 10.0, "2010-01-08 10:00:00").country("Germany"),
            RawRow::new("8", "A", 1, 5.0, "2010-02-08 10:00:00").country("Germany"),
            RawRow::new("9", "A", 100, 10.0, "2010-03-01 10:00:00"),
        ];
        let frame = enriched_table(&rows);
        let config = MetricsConfig {
            incomplete_month: "2010-03".parse().unwrap(),
        };
        let growth = market_growth(&frame, &config).unwrap();

        assert_eq!(growth.countries, 4);
        assert_eq!(growth.excluded, 1);
        assert!(approx(growth.qualifying_share(), 0.75));

        let countries = strings(&growth.table, COUNTRY);
        let rates = floats(&growth.table, TOTAL_GROWTH);
        let rate_for = |name: &str| {
            let idx = countries
                .iter()
                .position(|c| c.as_deref() == Some(name))
                .unwrap();
            rates[idx]
        };
        assert!(approx(rate_for("United Kingdom"), 0.5));
        assert!(approx(rate_for("France"), -0.5));
        assert!(rate_for("Germany").is_nan());
        assert!(!countries.contains(&Some("Spain".to_string())));
    }

    #[test]
    fn test_revenue_by_country_conserves_revenue() {
        let frame = enriched_table(&sample_rows());
        let output = revenue_by_country(&frame).unwrap();

        assert_eq!(
            strings(&output, COUNTRY),
            owned(&["United Kingdom", "Germany", "France", "Spain"])
        );
        assert_eq!(floats(&output, REVENUE), vec![36.0, 20.0, 15.0, -6.0]);

        let types = strings(&frame, TYPE);
        let totals = floats(&frame, TOTAL_PRICE);
        let kept: f64 = types
            .iter()
            .zip(totals.iter())
            .filter(|(kind, _)| kind.as_deref() != Some("Cancellation"))
            .map(|(_, total)| total)
            .sum();
        assert!(approx(kept, floats(&output, REVENUE).iter().sum()));
        assert!(approx(floats(&output, PERCENTAGE).iter().sum::<f64>(), 1.0));
    }

    #[test]
    fn test_empty_table_yields_empty_results() {
        let frame = enriched_table(&[]);
        let config = MetricsConfig::default();

        assert_eq!(revenue_by_period(&frame, RevenuePeriod::Month, &config).unwrap().height(), 0);
        assert_eq!(revenue_by_period(&frame, RevenuePeriod::Season, &config).unwrap().height(), 0);
        assert_eq!(average_order_value(&frame, AovPeriod::Total, &config).unwrap().height(), 0);
        assert_eq!(average_order_value(&frame, AovPeriod::Month, &config).unwrap().height(), 0);
        assert_eq!(customer_concentration(&frame).unwrap().table.height(), 0);
        assert_eq!(product_concentration(&frame).unwrap().height(), 0);
        assert_eq!(return_rates(&frame).unwrap().height(), 0);
        assert_eq!(revenue_by_country(&frame).unwrap().height(), 0);

        let growth = market_growth(&frame, &config).unwrap();
        assert_eq!((growth.table.height(), growth.countries, growth.excluded), (0, 0, 0));

        let repeat = repeat_customer_revenue(&frame).unwrap();
        assert_eq!(repeat.customers, 0);
        assert_eq!(repeat.total_revenue, 0.0);
        assert!(repeat.share.is_nan());
        assert!(return_percentage(&frame).unwrap().is_nan());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            "quarter".parse::<RevenuePeriod>(),
            Err(RetailError::InvalidParameter { .. })
        ));
        assert!(matches!(
            "weekly".parse::<AovPeriod>(),
            Err(RetailError::InvalidParameter { .. })
        ));
        assert!("2010-13".parse::<YearMonth>().is_err());
        assert!("december".parse::<YearMonth>().is_err());
        assert_eq!("Season".parse::<RevenuePeriod>().unwrap(), RevenuePeriod::Season);
    }

    #[test]
    fn test_config_from_latest_invoice() {
        let frame = enriched_table(&sample_rows());
        let config = MetricsConfig::from_latest(&frame).unwrap();
        assert_eq!(config.incomplete_month.to_string(), "2010-12");

        let empty = enriched_table(&[]);
        assert_eq!(MetricsConfig::from_latest(&empty).unwrap(), MetricsConfig::default());
    }
}
