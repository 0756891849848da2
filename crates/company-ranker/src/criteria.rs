//! Custom ranking criteria.

use analysis_core::sanitize::{finite, finite_opt};
use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};

/// Weights for the five ranking factors. Each must be non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingCriteria {
    pub eva_weight: f64,
    pub efv_weight: f64,
    pub upside_weight: f64,
    pub profitability_weight: f64,
    pub liquidity_weight: f64,
}

impl Default for RankingCriteria {
    fn default() -> Self {
        Self {
            eva_weight: 0.3,
            efv_weight: 0.25,
            upside_weight: 0.25,
            profitability_weight: 0.1,
            liquidity_weight: 0.1,
        }
    }
}

impl RankingCriteria {
    pub fn new(
        eva_weight: f64,
        efv_weight: f64,
        upside_weight: f64,
        profitability_weight: f64,
        liquidity_weight: f64,
    ) -> Self {
        Self {
            eva_weight,
            efv_weight,
            upside_weight,
            profitability_weight,
            liquidity_weight,
        }
    }

    pub fn weights(&self) -> [f64; 5] {
        [
            self.eva_weight,
            self.efv_weight,
            self.upside_weight,
            self.profitability_weight,
            self.liquidity_weight,
        ]
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if let Some(bad) = self.weights().iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(AnalysisError::InvalidData(format!(
                "ranking weights must be finite and non-negative, got {}",
                bad
            )));
        }
        Ok(())
    }

    /// Rescale the weights to sum to 1.0.
    ///
    /// When the sum is not positive the weights are left untouched, a warning
    /// is logged and `false` is returned.
    pub fn normalize_weights(&mut self) -> bool {
        let total: f64 = self.weights().iter().sum();
        if !(total > 0.0) || !total.is_finite() {
            tracing::warn!("Ranking weights sum to {}; cannot normalize, leaving them unchanged", total);
            return false;
        }
        self.eva_weight /= total;
        self.efv_weight /= total;
        self.upside_weight /= total;
        self.profitability_weight /= total;
        self.liquidity_weight /= total;
        true
    }
}

/// The five factor values before scaling. `None` is undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCriteriaMetrics {
    #[serde(serialize_with = "finite_opt")]
    pub eva_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub efv_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub upside_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub profitability_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub liquidity_ratio: Option<f64>,
}

/// The five factor values min-max scaled across the batch to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledCriteriaMetrics {
    pub eva_pct: f64,
    pub efv_pct: f64,
    pub upside_pct: f64,
    pub profitability_pct: f64,
    pub liquidity_ratio: f64,
}

impl ScaledCriteriaMetrics {
    pub fn weighted_sum(&self, criteria: &RankingCriteria) -> f64 {
        criteria.eva_weight * self.eva_pct
            + criteria.efv_weight * self.efv_pct
            + criteria.upside_weight * self.upside_pct
            + criteria.profitability_weight * self.profitability_pct
            + criteria.liquidity_weight * self.liquidity_ratio
    }
}

/// A company scored against custom criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCompany {
    pub ticker: String,
    pub company_name: String,
    pub sector: Option<String>,
    pub raw: RawCriteriaMetrics,
    pub scaled: ScaledCriteriaMetrics,
    #[serde(serialize_with = "finite")]
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_normalize_weights_sums_to_one() {
        let mut criteria = RankingCriteria::new(2.0, 1.0, 1.0, 0.5, 0.5);
        assert!(criteria.normalize_weights());
        assert_abs_diff_eq!(criteria.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(criteria.eva_weight, 0.4, epsilon = 1e-12);

        let mut defaults = RankingCriteria::default();
        assert!(defaults.normalize_weights());
        assert_abs_diff_eq!(defaults.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_weights_left_unchanged() {
        let mut criteria = RankingCriteria::new(0.0, 0.0, 0.0, 0.0, 0.0);
        let before = criteria;
        assert!(!criteria.normalize_weights());
        assert_eq!(criteria, before);
    }

    #[test]
    fn test_validate_rejects_negative_weights() {
        assert!(RankingCriteria::new(1.0, -0.5, 0.0, 0.0, 0.0).validate().is_err());
        assert!(RankingCriteria::new(1.0, f64::NAN, 0.0, 0.0, 0.0).validate().is_err());
        assert!(RankingCriteria::default().validate().is_ok());
    }
}
