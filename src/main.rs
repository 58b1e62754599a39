//! RetailScope: cleans invoice line data and prints the retail metrics report
//!
//! This is the main entrypoint that orchestrates loading, preparation and
//! the metric summaries.

use anyhow::{Context, Result};
use clap::Parser;
use polars::prelude::DataFrame;
use retailscope::metrics::{
    average_order_value, customer_concentration, market_growth, product_concentration,
    repeat_customer_revenue, return_percentage, return_rates, revenue_by_country,
    revenue_by_period, AOV,
};
use retailscope::schema::RAW_PRICE;
use retailscope::{dataset_overview, load_raw, non_product_summary, prepare, AovPeriod, Args};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let start_time = Instant::now();

    // Step 1: Load raw data
    let raw = load_raw(&args.input).with_context(|| format!("failed to load {}", args.input))?;
    let overview = dataset_overview(&raw)?;
    println!("=== Dataset Overview ===");
    println!("Rows: {}  Columns: {}", overview.rows, overview.columns);
    if let Some(range) = overview.date_range_label() {
        println!("The dataset captures {range}.");
    }
    for (column, missing) in overview.missing.iter().filter(|(_, n)| *n > 0) {
        println!("  Missing {column}: {missing}");
    }
    println!("  Rows where price = 0: {}", overview.zero_price_rows);

    let unusual = non_product_summary(&raw, RAW_PRICE)?;
    println!(
        "Non-product rows: {} (net {:.2}, {:.2}% of total; gross {:.2}, {:.2}% of total)",
        unusual.rows,
        unusual.net,
        unusual.net_share * 100.0,
        unusual.gross,
        unusual.gross_share * 100.0
    );

    // Step 2: Repair, clean and enrich
    let prepared = prepare(&raw)?;
    println!("\n=== Preparation ===");
    println!("Repaired descriptions:          {}", prepared.repair.descriptions_repaired);
    println!("Repaired prices:                {}", prepared.repair.prices_repaired);
    println!("Customer IDs defaulted to 0:    {}", prepared.repair.customers_defaulted);
    println!("Missing description rows dropped: {}", prepared.clean.missing_description_dropped);
    println!("Zero price rows dropped:          {}", prepared.clean.zero_price_dropped);
    println!("Non-product rows dropped:         {}", prepared.clean.non_product_dropped);
    println!(
        "Sales: {}  Returns: {}  Cancellations: {}",
        prepared.enrich.sales, prepared.enrich.returns, prepared.enrich.cancellations
    );

    // Step 3: Metrics
    let frame = &prepared.frame;
    let config = args.metrics_config(frame)?;
    info!(incomplete_month = %config.incomplete_month, "computing metrics");

    println!("\n=== Revenue by {} ===", args.period);
    println!("{}", revenue_by_period(frame, args.revenue_period()?, &config)?);

    println!("\n=== Average Order Value ({}) ===", args.aov);
    let aov_period = args.aov_period()?;
    let aov = average_order_value(frame, aov_period, &config)?;
    match aov_period {
        AovPeriod::Total => {
            let value = aov.column(AOV)?.as_materialized_series().f64()?.get(0);
            match value {
                Some(value) => println!("Average order value: {value:.2}"),
                None => println!("No complete months to average."),
            }
        }
        AovPeriod::Month => println!("{aov}"),
    }

    let repeat = repeat_customer_revenue(frame)?;
    println!(
        "\nRepeat customers spent {:.0}, which represents {:.2}% of all sales.",
        repeat.repeat_revenue,
        repeat.share * 100.0
    );

    let customers = customer_concentration(frame)?;
    println!("\n=== Customer Concentration ===");
    println!("{}", top(&customers.table, args.top));
    println!(
        "Note: {:.1}% of transactions are excluded due to unknown customers.",
        customers.unknown_share * 100.0
    );

    println!("\nReturn percentage: {:.2}%", return_percentage(frame)? * 100.0);

    println!("\n=== Product Concentration ===");
    println!("{}", top(&product_concentration(frame)?, args.top));

    println!("\n=== Return Rates ===");
    println!("{}", top(&return_rates(frame)?, args.top));

    let growth = market_growth(frame, &config)?;
    println!("\n=== Market Growth ===");
    println!("{}", growth.table);
    println!(
        "Note: {} ({:.0}%) countries are excluded due to insufficient revenue.",
        growth.excluded,
        (1.0 - growth.qualifying_share()) * 100.0
    );

    println!("\n=== Revenue by Country ===");
    println!("{}", top(&revenue_by_country(frame)?, args.top));

    println!(
        "\nTotal processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn top(table: &DataFrame, rows: usize) -> DataFrame {
    table.head(Some(rows))
}
