//! Command-line interface definitions and argument parsing

use clap::Parser;
use polars::prelude::DataFrame;

use crate::metrics::{AovPeriod, MetricsConfig, RevenuePeriod, YearMonth};

/// Clean invoice line data and report retail business metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV, Parquet or spreadsheet (xlsx, xls, ods) file
    #[arg(short, long, default_value = "online_retail_II.csv")]
    pub input: String,

    /// Revenue bucketing: "month" or "season"
    #[arg(short, long, default_value = "month")]
    pub period: String,

    /// Average order value grouping: "total" or "month"
    #[arg(long, default_value = "total")]
    pub aov: String,

    /// First month not fully covered by the data, as YYYY-MM
    /// Example: --incomplete-month 2010-12
    #[arg(long, conflicts_with = "detect_incomplete")]
    pub incomplete_month: Option<String>,

    /// Treat the month of the latest invoice as incomplete
    #[arg(long)]
    pub detect_incomplete: bool,

    /// Number of rows to show for ranked tables
    #[arg(short = 'n', long, default_value = "10")]
    pub top: usize,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn revenue_period(&self) -> crate::Result<RevenuePeriod> {
        self.period.parse()
    }

    pub fn aov_period(&self) -> crate::Result<AovPeriod> {
        self.aov.parse()
    }

    /// Resolve the metrics configuration against the enriched table
    pub fn metrics_config(&self, enriched: &DataFrame) -> crate::Result<MetricsConfig> {
        if let Some(ref month) = self.incomplete_month {
            Ok(MetricsConfig {
                incomplete_month: month.parse::<YearMonth>()?,
            })
        } else if self.detect_incomplete {
            MetricsConfig::from_latest(enriched)
        } else {
            Ok(MetricsConfig::default())
        }
    }
}
