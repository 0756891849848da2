use analysis_core::normalize_ticker;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub tickers: Vec<String>,           // empty = every ticker the source serves
    pub num_companies: Option<usize>,   // analyze only the first N
    pub pretty: bool,                   // pretty-print the JSON report
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tickers: parse_tickers(&env::var("ANALYSIS_TICKERS").unwrap_or_default()),
            num_companies: match env::var("NUM_COMPANIES") {
                Ok(value) if !value.trim().is_empty() => Some(
                    value
                        .trim()
                        .parse()
                        .context("NUM_COMPANIES must be an unsigned integer")?,
                ),
                _ => None,
            },
            pretty: env::var("REPORT_PRETTY")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        })
    }
}

/// Comma-separated ticker list, normalized; blanks are dropped.
pub fn parse_tickers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_ticker)
        .filter(|t| !t.is_empty())
        .collect()
}
