use anyhow::{bail, Context, Result};
use portfolio_allocator::AllocationProfile;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    // Valuation
    pub default_beta: f64,                        // 1.0
    pub risk_free_rate_percent: Option<f64>,      // overrides the rate provider, e.g. 10.5

    // Clustering
    pub kmeans_seed: u64,                         // 42
    pub kmeans_restarts: usize,                   // 10
    pub kmeans_max_iterations: usize,             // 300

    // Report shape
    pub ranking_top_n: usize,                     // 10
    pub sector_top_n: usize,                      // 3
    pub allocation_profile: AllocationProfile,    // moderate
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_beta: 1.0,
            risk_free_rate_percent: None,
            kmeans_seed: 42,
            kmeans_restarts: 10,
            kmeans_max_iterations: 300,
            ranking_top_n: 10,
            sector_top_n: 3,
            allocation_profile: AllocationProfile::Moderate,
        }
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            default_beta: env::var("DEFAULT_BETA")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse()
                .context("DEFAULT_BETA must be a number")?,
            risk_free_rate_percent: match env::var("RISK_FREE_RATE_PERCENT") {
                Ok(value) if !value.trim().is_empty() => Some(
                    value
                        .trim()
                        .parse()
                        .context("RISK_FREE_RATE_PERCENT must be a number")?,
                ),
                _ => None,
            },
            kmeans_seed: env::var("KMEANS_SEED")
                .unwrap_or_else(|_| "42".to_string())
                .parse()
                .context("KMEANS_SEED must be an unsigned integer")?,
            kmeans_restarts: env::var("KMEANS_RESTARTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("KMEANS_RESTARTS must be an unsigned integer")?,
            kmeans_max_iterations: env::var("KMEANS_MAX_ITERATIONS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("KMEANS_MAX_ITERATIONS must be an unsigned integer")?,
            ranking_top_n: env::var("RANKING_TOP_N")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("RANKING_TOP_N must be an unsigned integer")?,
            sector_top_n: env::var("SECTOR_TOP_N")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("SECTOR_TOP_N must be an unsigned integer")?,
            allocation_profile: AllocationProfile::parse_or_default(
                &env::var("ALLOCATION_PROFILE").unwrap_or_else(|_| "moderate".to_string()),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.default_beta.is_finite() {
            bail!("default_beta must be finite");
        }
        if let Some(rate) = self.risk_free_rate_percent {
            if !rate.is_finite() || rate < 0.0 {
                bail!("risk_free_rate_percent must be a finite, non-negative percentage");
            }
        }
        if self.kmeans_restarts == 0 {
            bail!("kmeans_restarts must be at least 1");
        }
        if self.kmeans_max_iterations == 0 {
            bail!("kmeans_max_iterations must be at least 1");
        }
        if self.ranking_top_n == 0 {
            bail!("ranking_top_n must be at least 1");
        }
        if self.sector_top_n == 0 {
            bail!("sector_top_n must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.kmeans_seed, 42);
        assert_eq!(config.allocation_profile, AllocationProfile::Moderate);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AnalysisConfig {
            default_beta: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.default_beta = 1.2;
        config.risk_free_rate_percent = Some(-1.0);
        assert!(config.validate().is_err());

        config.risk_free_rate_percent = Some(10.5);
        config.kmeans_restarts = 0;
        assert!(config.validate().is_err());

        config.kmeans_restarts = 10;
        assert!(config.validate().is_ok());
    }
}
