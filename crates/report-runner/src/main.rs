use std::sync::Arc;

use analysis_orchestrator::{AnalysisConfig, AnalysisOrchestrator, AnalysisOutcome, SampleDataSource};
use anyhow::Result;

mod config;

use config::RunnerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::info!("Starting value analysis report run");

    // 2. Load configuration
    let analysis_config = AnalysisConfig::from_env()?;
    let runner_config = RunnerConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Default beta: {}", analysis_config.default_beta);
    tracing::info!("  Allocation profile: {}", analysis_config.allocation_profile);
    if let Some(rate) = analysis_config.risk_free_rate_percent {
        tracing::info!("  Risk-free rate override: {}%", rate);
    }

    // 3. Wire collaborators
    let source = SampleDataSource::ibovespa();
    let tickers = if runner_config.tickers.is_empty() {
        source.tickers()
    } else {
        runner_config.tickers.clone()
    };
    let orchestrator = Arc::new(AnalysisOrchestrator::new(analysis_config, Arc::new(source)));

    // 4. Run and print
    let outcome = orchestrator
        .run_complete_analysis(&tickers, runner_config.num_companies)
        .await;

    let output = if runner_config.pretty {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string(&outcome)?
    };
    println!("{}", output);

    if let AnalysisOutcome::Error { message } = &outcome {
        tracing::error!("Analysis finished with error: {}", message);
        std::process::exit(1);
    }

    Ok(())
}
