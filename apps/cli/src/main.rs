#![deny(warnings)]

//! Headless CLI running one capital cycle (and optionally a pricing
//! cycle) over a scenario file.

use anyhow::Result;
use corp_driver::{
    run_capital_cycle, run_pricing_cycle, CorpReader, CycleOptions, InMemoryCorp, MarkupCache,
};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const DEFAULT_SCENARIO: &str = "assets/scenarios/agronomics.json";

fn parse_args() -> (Option<String>, Option<f64>, bool) {
    let mut scenario: Option<String> = None;
    let mut budget: Option<f64> = None;
    let mut pricing = false;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => scenario = it.next(),
            "--budget" => budget = it.next().and_then(|s| s.parse().ok()),
            "--pricing" => pricing = true,
            _ => {}
        }
    }
    (scenario, budget, pricing)
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let (scenario, budget, pricing) = parse_args();
    let path = scenario.unwrap_or_else(|| DEFAULT_SCENARIO.to_string());
    info!(version = env!("GIT_SHA"), %path, ?budget, pricing, "starting corp-pilot");

    let text = std::fs::read_to_string(&path)?;
    let mut corp = InMemoryCorp::from_json(&text)?;
    let funds_before = corp.corporation().funds;

    let options = CycleOptions {
        funds_cap: budget,
        ..CycleOptions::default()
    };
    let report = run_capital_cycle(&mut corp, &options)?;

    println!(
        "Cycle OK | divisions: {} | upgrades: {} | campaigns: {} | offices grown: {} | boost batches: {} | skipped cities: {}",
        report.divisions_processed,
        report.upgrades_applied,
        report.campaigns_bought,
        report.offices_grown,
        report.boost_batches,
        report.skipped_cities
    );
    println!(
        "Funds | before: ${:.2} | spent: ${:.2} | after: ${:.2} | projected output: {:.2}/cycle",
        funds_before,
        report.funds_spent,
        corp.corporation().funds,
        report.projected_production
    );

    if pricing {
        let mut cache = MarkupCache::new();
        let report = run_pricing_cycle(&mut corp, &mut cache)?;
        println!(
            "Pricing | materials: {} | products: {} | at market: {} | solver failures: {}",
            report.materials_priced,
            report.products_priced,
            report.market_priced,
            report.solver_failures
        );
    }

    Ok(())
}
