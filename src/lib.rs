//! RetailScope: cleaning, feature derivation and business metrics for
//! e-commerce invoice line data
//!
//! Raw invoice lines are repaired, pruned of non-product rows, enriched with
//! calendar fields and a Sale/Return/Cancellation label, and then summarised
//! by a set of independent metric functions. All tables are Polars frames.

pub mod cli;
pub mod data;
pub mod error;
pub mod metrics;
pub mod overview;
pub mod policy;
pub mod prep;
pub mod schema;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_raw, normalize_raw};
pub use error::RetailError;
pub use metrics::{AovPeriod, MetricsConfig, RevenuePeriod, YearMonth};
pub use overview::{dataset_overview, DatasetOverview};
pub use policy::{non_product_summary, NonProductSummary, NON_PRODUCT_CODES};
pub use prep::{
    clean_transactions, enrich_transactions, mode_by_group, prepare, repair_transactions,
    CleanReport, EnrichReport, Prepared, RepairReport,
};
pub use schema::TransactionType;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, RetailError>;

/// `numerator / denominator`, NaN when the denominator is zero
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}
