#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bureau::{
    Configuration, CustomerProfile, DocumentSpec, OfficeSpec, Simulation, TokioClock,
    TracingSink, UniformOracle,
};
use clap::Parser;

/// Run a small bureaucracy simulation and print each customer's outcome.
#[derive(Parser)]
#[command(name = "bureau-sim")]
#[command(about = "Demo runner for the bureau concurrency simulation")]
struct Cli {
    /// Number of customers to simulate, each requesting the same document.
    #[arg(long, default_value_t = 4)]
    customers: usize,

    /// Number of parallel counters at the single demo office.
    #[arg(long, default_value_t = 2)]
    counters: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = Arc::new(demo_configuration(cli.counters).context("building demo configuration")?);
    let simulation = Simulation::new(
        config,
        Arc::new(TracingSink),
        Arc::new(UniformOracle),
        Arc::new(TokioClock),
    );

    let customers = (0..cli.customers)
        .map(|i| {
            CustomerProfile::new(
                format!("customer-{i}"),
                vec!["passport".into()],
                Duration::from_millis(10 * i as u64),
            )
        })
        .collect();

    let outcomes = simulation.run(customers).await;
    for outcome in outcomes {
        for result in outcome.documents {
            match result {
                Ok(issued) => println!(
                    "{} received {} from {} in {:?}",
                    outcome.customer_id, issued.document_name, issued.issuing_office, issued.service_duration
                ),
                Err(err) => println!("{} failed: {err}", outcome.customer_id),
            }
        }
    }

    Ok(())
}

fn demo_configuration(counters: usize) -> Result<Configuration> {
    let registry = OfficeSpec::new(
        "registry",
        counters,
        Duration::from_millis(50),
        Duration::from_millis(200),
        Duration::from_secs(3),
    )?;
    let vitals = OfficeSpec::new(
        "vitals",
        counters,
        Duration::from_millis(20),
        Duration::from_millis(80),
        Duration::from_secs(2),
    )?;

    let birth_certificate = DocumentSpec::new("birth_certificate", "vitals", vec![]);
    let passport = DocumentSpec::new("passport", "registry", vec!["birth_certificate".into()]);

    Ok(Configuration::new(
        vec![registry, vitals],
        vec![birth_certificate, passport],
    )?)
}
