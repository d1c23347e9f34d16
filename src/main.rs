//! sqlbridge probe.
//!
//! Configures a factory from the command line, runs initialization and prints
//! what was resolved as JSON.

use sqlbridge::config::Config;
use sqlbridge::dialect::ProviderRegistry;
use sqlbridge::factory::DatabaseFactory;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let db_config = config.database_config()?;

    // retry options travel inside the database config
    let factory = DatabaseFactory::new(ProviderRegistry::with_builtins())
        .with_profiling(!config.no_profiling)
        .with_statement_timeout(config.query_timeout_duration())
        .with_connect_timeout(config.connect_timeout_duration());

    factory.configure(db_config)?;
    let report = factory.report().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    factory.dispose().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    init_tracing(&config);

    info!("Starting sqlbridge probe v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config).await {
        error!(error = %e, "Probe failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
