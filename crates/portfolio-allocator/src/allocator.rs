use analysis_core::sanitize::{finite, finite_opt, or_zero};
use analysis_core::{CompanyFinancialRecord, CompanyMetrics};
use metrics_engine::{MetricsEngine, DEFAULT_BETA};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::profile::AllocationProfile;

/// Decimal places kept on every weight.
pub const WEIGHT_DECIMALS: u32 = 4;
/// EFV multiplier in the allocation score.
pub const EFV_SCORE_FACTOR: f64 = 1.5;

/// Suggested weights, keyed by ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAllocation {
    pub weights: BTreeMap<String, f64>,
    pub profile: AllocationProfile,
    /// Set when no company had a positive score and weight was split evenly.
    pub fallback: bool,
}

impl PortfolioAllocation {
    pub fn weight(&self, ticker: &str) -> f64 {
        self.weights.get(ticker).copied().unwrap_or(0.0)
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Holdings with a non-zero weight, largest first.
    pub fn holdings(&self) -> Vec<(String, f64)> {
        let mut holdings: Vec<(String, f64)> = self
            .weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(t, w)| (t.clone(), *w))
            .collect();
        holdings.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        holdings
    }
}

/// Weighted EVA of a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEva {
    #[serde(serialize_with = "finite")]
    pub eva_abs_total: f64,
    /// Undefined when the weighted capital employed is not positive.
    #[serde(serialize_with = "finite_opt")]
    pub eva_pct_total: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PortfolioAllocator {
    engine: MetricsEngine,
    default_beta: f64,
}

impl Default for PortfolioAllocator {
    fn default() -> Self {
        Self::new(MetricsEngine::default())
    }
}

impl PortfolioAllocator {
    pub fn new(engine: MetricsEngine) -> Self {
        Self {
            engine,
            default_beta: DEFAULT_BETA,
        }
    }

    pub fn with_default_beta(mut self, beta: f64) -> Self {
        self.default_beta = beta;
        self
    }

    /// `eva_pct + 1.5 * efv_pct + upside_pct`, undefined terms as 0.
    pub fn allocation_score(row: &CompanyMetrics) -> f64 {
        let m = &row.metrics;
        or_zero(m.eva_pct) + EFV_SCORE_FACTOR * or_zero(m.efv_pct) + or_zero(m.upside_pct)
    }

    pub fn allocate(&self, records: &[CompanyFinancialRecord], profile: AllocationProfile) -> PortfolioAllocation {
        let batch = self.engine.compute_batch(records, |_| self.default_beta);
        Self::allocate_metrics(&batch.rows, profile)
    }

    /// Weights over `rows` under `profile`.
    ///
    /// Companies with a positive score share the whole weight; the rest get
    /// 0. With no positive score the weight is split evenly and `fallback`
    /// is set.
    pub fn allocate_metrics(rows: &[CompanyMetrics], profile: AllocationProfile) -> PortfolioAllocation {
        if rows.is_empty() {
            tracing::warn!("No companies to allocate");
            return PortfolioAllocation {
                weights: BTreeMap::new(),
                profile,
                fallback: false,
            };
        }

        let mut positive: Vec<(&str, f64)> = rows
            .iter()
            .map(|row| (row.ticker.as_str(), Self::allocation_score(row)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        positive.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        if positive.is_empty() {
            tracing::warn!(
                "No company has a positive allocation score; splitting evenly across {}",
                rows.len()
            );
            let even = 1.0 / rows.len() as f64;
            let raw: Vec<(&str, f64)> = rows.iter().map(|r| (r.ticker.as_str(), even)).collect();
            return PortfolioAllocation {
                weights: round_weights(&raw),
                profile,
                fallback: true,
            };
        }

        let raw = match profile.buckets() {
            None => proportional(&positive, 1.0),
            Some((top_n, top_share)) => {
                let split = top_n.min(positive.len());
                let (top, rest) = positive.split_at(split);
                if rest.is_empty() {
                    proportional(top, 1.0)
                } else {
                    let mut weights = proportional(top, top_share);
                    weights.extend(proportional(rest, 1.0 - top_share));
                    weights
                }
            }
        };

        let mut weights = round_weights(&raw);
        for row in rows {
            weights.entry(row.ticker.clone()).or_insert(0.0);
        }

        tracing::info!(
            "Allocated {} of {} companies under {} profile",
            raw.len(),
            rows.len(),
            profile
        );

        PortfolioAllocation {
            weights,
            profile,
            fallback: false,
        }
    }

    /// Weighted EVA and EVA% of a portfolio.
    ///
    /// Companies missing from `rows`, or with undefined EVA or capital
    /// employed, are skipped.
    pub fn calculate_portfolio_eva(weights: &BTreeMap<String, f64>, rows: &[CompanyMetrics]) -> PortfolioEva {
        let by_ticker: HashMap<&str, &CompanyMetrics> = rows.iter().map(|r| (r.ticker.as_str(), r)).collect();

        let mut eva_total = 0.0;
        let mut capital_total = 0.0;
        for (ticker, weight) in weights {
            let Some(row) = by_ticker.get(ticker.as_str()) else {
                continue;
            };
            if let (Some(eva), Some(capital)) = (row.metrics.eva_abs, row.metrics.capital_employed) {
                eva_total += eva * weight;
                capital_total += capital * weight;
            }
        }

        PortfolioEva {
            eva_abs_total: eva_total,
            eva_pct_total: if capital_total > 0.0 {
                Some(eva_total / capital_total * 100.0)
            } else {
                None
            },
        }
    }
}

/// Scores scaled to sum to `share`.
fn proportional<'a>(scores: &[(&'a str, f64)], share: f64) -> Vec<(&'a str, f64)> {
    let total: f64 = scores.iter().map(|(_, s)| s).sum();
    scores.iter().map(|(t, s)| (*t, s / total * share)).collect()
}

/// Round to [`WEIGHT_DECIMALS`] places and push the rounding residual onto
/// the largest weight (lowest ticker on ties) so the total stays exactly 1.
fn round_weights(raw: &[(&str, f64)]) -> BTreeMap<String, f64> {
    let mut rounded: Vec<(&str, Decimal)> = raw
        .iter()
        .map(|(t, w)| (*t, Decimal::from_f64(*w).unwrap_or(Decimal::ZERO).round_dp(WEIGHT_DECIMALS)))
        .collect();

    let total: Decimal = rounded.iter().map(|(_, w)| *w).sum();
    let residual = Decimal::ONE - total;

    let largest = rounded
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(i, _)| i);
    if let (Some(i), false) = (largest, residual.is_zero()) {
        rounded[i].1 += residual;
    }

    rounded
        .into_iter()
        .map(|(t, w)| (t.to_string(), w.to_f64().unwrap_or(0.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{sample, MetricsResult};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn row(ticker: &str, eva: f64, efv: f64, upside: f64) -> CompanyMetrics {
        CompanyMetrics {
            ticker: ticker.to_string(),
            company_name: ticker.to_string(),
            sector: None,
            market_cap: None,
            stock_price: None,
            data_quality_score: 1.0,
            metrics: MetricsResult {
                eva_pct: Some(eva),
                efv_pct: Some(efv),
                upside_pct: Some(upside),
                ..Default::default()
            },
        }
    }

    fn with_capital(ticker: &str, eva_abs: Option<f64>, capital: Option<f64>) -> CompanyMetrics {
        CompanyMetrics {
            metrics: MetricsResult {
                eva_abs,
                capital_employed: capital,
                ..Default::default()
            },
            ..row(ticker, 0.0, 0.0, 0.0)
        }
    }

    #[test]
    fn test_single_positive_company_takes_everything() {
        let rows = vec![row("AAAA3", 10.0, 5.0, 0.0), row("BBBB3", 0.0, 0.0, 0.0)];
        let allocation = PortfolioAllocator::allocate_metrics(&rows, AllocationProfile::Moderate);

        assert!(!allocation.fallback);
        assert_eq!(allocation.weight("AAAA3"), 1.0);
        assert_eq!(allocation.weight("BBBB3"), 0.0);
        assert!(allocation.weights.contains_key("BBBB3"));
    }

    #[test]
    fn test_moderate_is_proportional_to_score() {
        let rows = vec![row("AAAA3", 3.0, 0.0, 0.0), row("BBBB3", 1.0, 0.0, 0.0), row("CCCC3", -5.0, 0.0, 0.0)];
        let allocation = PortfolioAllocator::allocate_metrics(&rows, AllocationProfile::Moderate);

        assert_relative_eq!(allocation.weight("AAAA3"), 0.75);
        assert_relative_eq!(allocation.weight("BBBB3"), 0.25);
        assert_eq!(allocation.weight("CCCC3"), 0.0);
    }

    #[test]
    fn test_conservative_splits_top_five_and_rest() {
        let rows: Vec<CompanyMetrics> = (1..=7).map(|i| row(&format!("T{}", i), i as f64, 0.0, 0.0)).collect();
        let allocation = PortfolioAllocator::allocate_metrics(&rows, AllocationProfile::Conservative);

        let top: f64 = ["T7", "T6", "T5", "T4", "T3"].iter().map(|t| allocation.weight(t)).sum();
        let rest: f64 = ["T2", "T1"].iter().map(|t| allocation.weight(t)).sum();
        assert_abs_diff_eq!(top, 0.7, epsilon = 1e-4);
        assert_abs_diff_eq!(rest, 0.3, epsilon = 1e-4);
        assert_abs_diff_eq!(allocation.total_weight(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(allocation.weight("T2"), 0.2);
    }

    #[test]
    fn test_aggressive_with_empty_rest_bucket_gives_top_everything() {
        let rows = vec![row("AAAA3", 2.0, 0.0, 0.0), row("BBBB3", 2.0, 0.0, 0.0)];
        let allocation = PortfolioAllocator::allocate_metrics(&rows, AllocationProfile::Aggressive);
        assert_relative_eq!(allocation.weight("AAAA3"), 0.5);
        assert_relative_eq!(allocation.weight("BBBB3"), 0.5);
    }

    #[test]
    fn test_uniform_fallback_when_nothing_is_positive() {
        let rows = vec![row("CCCC3", -1.0, 0.0, 0.0), row("AAAA3", 0.0, 0.0, 0.0), row("BBBB3", -3.0, -1.0, 0.0)];
        let allocation = PortfolioAllocator::allocate_metrics(&rows, AllocationProfile::Aggressive);

        assert!(allocation.fallback);
        assert_abs_diff_eq!(allocation.total_weight(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(allocation.weight("AAAA3"), 0.3334);
        assert_relative_eq!(allocation.weight("BBBB3"), 0.3333);
        assert_relative_eq!(allocation.weight("CCCC3"), 0.3333);
    }

    #[test]
    fn test_weights_are_rounded_and_sum_to_one() {
        let rows: Vec<CompanyMetrics> = [1.0, 2.0, 3.0, 5.0, 7.0, 11.0]
            .iter()
            .enumerate()
            .map(|(i, s)| row(&format!("T{}", i), *s, 0.1, 0.0))
            .collect();

        for profile in [AllocationProfile::Conservative, AllocationProfile::Moderate, AllocationProfile::Aggressive] {
            let allocation = PortfolioAllocator::allocate_metrics(&rows, profile);
            assert_abs_diff_eq!(allocation.total_weight(), 1.0, epsilon = 1e-4);
            for w in allocation.weights.values() {
                assert!(*w >= 0.0);
                assert_abs_diff_eq!(w * 1e4, (w * 1e4).round(), epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_empty_batch_allocates_nothing() {
        let allocation = PortfolioAllocator::allocate_metrics(&[], AllocationProfile::Moderate);
        assert!(allocation.weights.is_empty());
        assert!(!allocation.fallback);
    }

    #[test]
    fn test_allocate_sample_records() {
        let allocator = PortfolioAllocator::new(MetricsEngine::new(0.10));
        let allocation = allocator.allocate(&sample::ibovespa_sample(), AllocationProfile::Moderate);
        assert_eq!(allocation.weights.len(), 5);
        assert_abs_diff_eq!(allocation.total_weight(), 1.0, epsilon = 1e-4);

        let holdings = allocation.holdings();
        for pair in holdings.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_portfolio_eva_weights_defined_companies() {
        let rows = vec![
            with_capital("AAAA3", Some(10.0), Some(100.0)),
            with_capital("BBBB3", Some(-4.0), Some(50.0)),
            with_capital("CCCC3", None, Some(80.0)),
        ];
        let weights: BTreeMap<String, f64> = [("AAAA3", 0.5), ("BBBB3", 0.25), ("CCCC3", 0.25), ("ZZZZ3", 1.0)]
            .iter()
            .map(|(t, w)| (t.to_string(), *w))
            .collect();

        let eva = PortfolioAllocator::calculate_portfolio_eva(&weights, &rows);
        assert_relative_eq!(eva.eva_abs_total, 5.0 - 1.0);
        assert_relative_eq!(eva.eva_pct_total.unwrap(), 4.0 / 62.5 * 100.0);
    }

    #[test]
    fn test_portfolio_eva_pct_undefined_without_capital() {
        let weights: BTreeMap<String, f64> = [("AAAA3".to_string(), 1.0)].into_iter().collect();
        let eva = PortfolioAllocator::calculate_portfolio_eva(&weights, &[with_capital("AAAA3", None, None)]);
        assert_eq!(eva.eva_abs_total, 0.0);
        assert_eq!(eva.eva_pct_total, None);

        let json = serde_json::to_value(eva).unwrap();
        assert!(json["eva_pct_total"].is_null());
    }
}
