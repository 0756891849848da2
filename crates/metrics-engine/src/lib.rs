use analysis_core::sanitize::{finite_value, or_zero};
use analysis_core::{AnalysisError, CompanyFinancialRecord, CompanyMetrics, ExcludedCompany, MetricsResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Corporate income tax assumed for every company (IRPJ + CSLL).
pub const TAX_RATE: f64 = 0.34;
/// Equity market risk premium used in CAPM.
pub const MARKET_RISK_PREMIUM: f64 = 0.06;
/// Risk-free rate used when no policy rate is available.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.10;
/// Beta used when the caller does not supply one.
pub const DEFAULT_BETA: f64 = 1.0;

const DEBT_COST_MULTIPLIER: f64 = 1.2;
/// Minimum borrowing cost assumed for debt-free firms.
const MIN_COST_OF_DEBT: f64 = 0.05;

/// Weights of the composite score blend. Undefined inputs contribute 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub eva: f64,
    pub efv: f64,
    pub upside: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            eva: 0.4,
            efv: 0.4,
            upside: 0.2,
        }
    }
}

impl CompositeWeights {
    pub fn blend(&self, eva_pct: Option<f64>, efv_pct: Option<f64>, upside_pct: Option<f64>) -> f64 {
        self.eva * or_zero(eva_pct) + self.efv * or_zero(efv_pct) + self.upside * or_zero(upside_pct)
    }
}

/// Metrics for a batch, with the companies that could not be computed.
#[derive(Debug, Clone, Default)]
pub struct BatchMetrics {
    pub rows: Vec<CompanyMetrics>,
    pub excluded: Vec<ExcludedCompany>,
}

/// Economic value-added engine: WACC, ROCE, EVA, EFV, wealth and upside.
///
/// Pure and stateless apart from its configuration; the same record and beta
/// always produce the same result.
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    risk_free_rate: f64,
    score_weights: CompositeWeights,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RISK_FREE_RATE)
    }
}

impl MetricsEngine {
    /// `risk_free_rate` is a fraction (0.105 for 10.5%).
    pub fn new(risk_free_rate: f64) -> Self {
        Self {
            risk_free_rate,
            score_weights: CompositeWeights::default(),
        }
    }

    /// Build from a policy rate quoted in percent. Missing, zero or
    /// non-finite rates fall back to [`DEFAULT_RISK_FREE_RATE`].
    pub fn from_policy_rate(rate_percent: Option<f64>) -> Self {
        match rate_percent {
            Some(rate) if rate.is_finite() && rate > 0.0 => Self::new(rate / 100.0),
            other => {
                tracing::warn!(
                    "Policy rate unavailable ({:?}); using default risk-free rate of {:.1}%",
                    other,
                    DEFAULT_RISK_FREE_RATE * 100.0
                );
                Self::new(DEFAULT_RISK_FREE_RATE)
            }
        }
    }

    pub fn with_score_weights(mut self, weights: CompositeWeights) -> Self {
        self.score_weights = weights;
        self
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn score_weights(&self) -> CompositeWeights {
        self.score_weights
    }

    pub fn nopat(&self, ebit: f64) -> f64 {
        ebit * (1.0 - TAX_RATE)
    }

    /// Receivables plus inventory minus payables; missing items count as zero.
    pub fn net_working_capital_need(&self, record: &CompanyFinancialRecord) -> f64 {
        record.accounts_receivable.unwrap_or(0.0) + record.inventory.unwrap_or(0.0)
            - record.accounts_payable.unwrap_or(0.0)
    }

    /// Fixed assets plus working-capital need. Undefined when not positive.
    pub fn capital_employed(&self, record: &CompanyFinancialRecord) -> Option<f64> {
        let capital = record.property_plant_equipment.unwrap_or(0.0) + self.net_working_capital_need(record);
        if capital > 0.0 {
            Some(capital)
        } else {
            None
        }
    }

    pub fn cost_of_equity(&self, beta: f64) -> f64 {
        self.risk_free_rate + beta * MARKET_RISK_PREMIUM
    }

    pub fn cost_of_debt(&self, record: &CompanyFinancialRecord) -> f64 {
        match record.total_debt {
            Some(debt) if debt > 0.0 => self.risk_free_rate * DEBT_COST_MULTIPLIER,
            _ => MIN_COST_OF_DEBT,
        }
    }

    /// Book-weighted average cost of capital. Undefined when equity plus debt
    /// is not positive.
    pub fn wacc(&self, record: &CompanyFinancialRecord, beta: f64) -> Option<f64> {
        let equity = record.equity.unwrap_or(0.0);
        let debt = record.total_debt.unwrap_or(0.0);
        let total_capital = equity + debt;
        if !(total_capital > 0.0) {
            return None;
        }

        let equity_share = equity / total_capital;
        let debt_share = debt / total_capital;
        let ke = self.cost_of_equity(beta);
        let kd = self.cost_of_debt(record);

        finite_value(ke * equity_share + kd * (1.0 - TAX_RATE) * debt_share)
    }

    pub fn roce(&self, record: &CompanyFinancialRecord, capital_employed: Option<f64>) -> Option<f64> {
        let capital = capital_employed?;
        let ebit = record.ebit?;
        finite_value(self.nopat(ebit) / capital)
    }

    /// Compute every metric for one company.
    ///
    /// Degenerate inputs yield undefined fields; only malformed input (a NaN
    /// or infinite field, a non-finite beta, an empty ticker) is an error.
    pub fn compute(&self, record: &CompanyFinancialRecord, beta: f64) -> Result<MetricsResult, AnalysisError> {
        record.validate()?;
        if !beta.is_finite() {
            return Err(AnalysisError::InvalidData(format!(
                "{}: beta must be finite, got {}",
                record.ticker, beta
            )));
        }

        let capital_employed = self.capital_employed(record);
        let wacc = self.wacc(record, beta);
        let roce = self.roce(record, capital_employed);

        let (eva_abs, eva_pct) = match (capital_employed, wacc, roce) {
            (Some(capital), Some(wacc), Some(roce)) => {
                let spread = roce - wacc;
                (finite_value(capital * spread), finite_value(spread * 100.0))
            }
            _ => (None, None),
        };

        let wealth_current = match (eva_abs, wacc) {
            (Some(eva), Some(wacc)) if wacc != 0.0 => finite_value(eva / wacc),
            _ => None,
        };

        let wealth_future = match (record.market_cap, capital_employed) {
            (Some(market_cap), Some(capital)) => {
                finite_value(market_cap + record.total_debt.unwrap_or(0.0) - capital)
            }
            _ => None,
        };

        let efv_abs = match (wealth_future, wealth_current) {
            (Some(future), Some(current)) => finite_value(future - current),
            _ => None,
        };

        let efv_pct = match (efv_abs, capital_employed) {
            (Some(efv), Some(capital)) => finite_value(efv / capital * 100.0),
            _ => None,
        };

        let upside_pct = match (efv_abs, record.market_cap) {
            (Some(efv), Some(market_cap)) if market_cap > 0.0 => finite_value(efv / market_cap * 100.0),
            _ => None,
        };

        let profitability_pct = match (record.net_income, record.revenue) {
            (Some(net_income), Some(revenue)) if revenue > 0.0 => finite_value(net_income / revenue * 100.0),
            _ => None,
        };

        let liquidity_ratio = match (record.current_assets, record.current_liabilities) {
            (Some(assets), Some(liabilities)) if liabilities > 0.0 => finite_value(assets / liabilities),
            _ => None,
        };

        let combined_score = self.score_weights.blend(eva_pct, efv_pct, upside_pct);

        Ok(MetricsResult {
            wacc,
            wacc_pct: wacc.map(|w| w * 100.0),
            roce,
            roce_pct: roce.map(|r| r * 100.0),
            capital_employed,
            eva_abs,
            eva_pct,
            efv_abs,
            efv_pct,
            wealth_current,
            wealth_future,
            upside_pct,
            profitability_pct,
            liquidity_ratio,
            combined_score,
        })
    }

    /// Compute a batch, isolating per-company failures.
    ///
    /// Failed and duplicate records are dropped with a logged reason; the rest
    /// keep their input order.
    pub fn compute_batch<F>(&self, records: &[CompanyFinancialRecord], beta_fn: F) -> BatchMetrics
    where
        F: Fn(&CompanyFinancialRecord) -> f64,
    {
        let mut batch = BatchMetrics::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for record in records {
            if !seen.insert(record.ticker.as_str()) {
                tracing::warn!("Skipping duplicate record for {}", record.ticker);
                batch.excluded.push(ExcludedCompany {
                    ticker: record.ticker.clone(),
                    reason: "duplicate ticker in batch".to_string(),
                });
                continue;
            }

            match self.compute(record, beta_fn(record)) {
                Ok(metrics) => batch.rows.push(CompanyMetrics::from_record(record, metrics)),
                Err(e) => {
                    tracing::warn!("Excluding {} from batch: {}", record.ticker, e);
                    batch.excluded.push(ExcludedCompany {
                        ticker: record.ticker.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::sample;
    use approx::assert_relative_eq;

    fn engine() -> MetricsEngine {
        MetricsEngine::new(0.10)
    }

    #[test]
    fn test_petr4_sample_produces_finite_wacc_and_eva() {
        let metrics = engine().compute(&sample::petr4(), 1.0).unwrap();

        let wacc = metrics.wacc.unwrap();
        assert!(wacc > 0.05 && wacc < 0.20, "wacc out of range: {}", wacc);
        assert!(metrics.eva_pct.unwrap().is_finite());

        // ke = 0.16, kd = 0.12; E/V = 5/9, D/V = 4/9
        assert_relative_eq!(wacc, 0.16 * 5.0 / 9.0 + 0.12 * 0.66 * 4.0 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.capital_employed.unwrap(), 860e9);
        assert_relative_eq!(metrics.roce.unwrap(), 132e9 / 860e9, epsilon = 1e-12);
        assert_relative_eq!(metrics.wacc_pct.unwrap(), wacc * 100.0);
    }

    #[test]
    fn test_eva_pct_identity_is_exact() {
        let engine = engine();
        for record in sample::ibovespa_sample() {
            let metrics = engine.compute(&record, 1.0).unwrap();
            if let (Some(roce), Some(wacc), Some(eva_pct)) = (metrics.roce, metrics.wacc, metrics.eva_pct) {
                assert_eq!(eva_pct, (roce - wacc) * 100.0, "{}", record.ticker);
            }
        }
    }

    #[test]
    fn test_wacc_undefined_without_capital_structure() {
        let mut record = sample::petr4();
        record.equity = Some(-400e9);
        record.total_debt = Some(400e9);
        let metrics = engine().compute(&record, 1.0).unwrap();
        assert_eq!(metrics.wacc, None);
        assert_eq!(metrics.eva_pct, None);
        assert_eq!(metrics.wealth_current, None);

        record.equity = None;
        record.total_debt = None;
        assert_eq!(engine().wacc(&record, 1.0), None);
    }

    #[test]
    fn test_non_positive_capital_employed_is_undefined() {
        let mut record = sample::wege3();
        record.property_plant_equipment = Some(0.0);
        record.accounts_receivable = Some(1e9);
        record.inventory = Some(1e9);
        record.accounts_payable = Some(5e9);

        let metrics = engine().compute(&record, 1.0).unwrap();
        assert_eq!(metrics.capital_employed, None);
        assert_eq!(metrics.roce, None);
        assert_eq!(metrics.eva_abs, None);
        assert_eq!(metrics.eva_pct, None);
        assert_eq!(metrics.efv_abs, None);
        assert_eq!(metrics.efv_pct, None);
        assert_eq!(metrics.upside_pct, None);
        // wacc does not depend on capital employed
        assert!(metrics.wacc.is_some());
    }

    #[test]
    fn test_zero_market_cap_leaves_upside_undefined() {
        let mut record = sample::vale3();
        record.market_cap = Some(0.0);
        let metrics = engine().compute(&record, 1.0).unwrap();
        assert_eq!(metrics.upside_pct, None);
        assert!(metrics.efv_abs.is_some());

        record.market_cap = None;
        let metrics = engine().compute(&record, 1.0).unwrap();
        assert_eq!(metrics.wealth_future, None);
        assert_eq!(metrics.upside_pct, None);
    }

    #[test]
    fn test_cost_of_debt_floor_for_debt_free_firms() {
        let engine = engine();
        let mut record = sample::wege3();
        assert_relative_eq!(engine.cost_of_debt(&record), 0.12, epsilon = 1e-12);

        record.total_debt = Some(0.0);
        assert_relative_eq!(engine.cost_of_debt(&record), 0.05);
        record.total_debt = None;
        assert_relative_eq!(engine.cost_of_debt(&record), 0.05);

        // All-equity firm: wacc collapses to cost of equity
        assert_relative_eq!(engine.wacc(&record, 1.2).unwrap(), 0.10 + 1.2 * 0.06, epsilon = 1e-12);
    }

    #[test]
    fn test_wealth_and_efv_chain() {
        let engine = engine();
        let record = sample::petr4();
        let m = engine.compute(&record, 1.0).unwrap();

        let wealth_current = m.eva_abs.unwrap() / m.wacc.unwrap();
        assert_relative_eq!(m.wealth_current.unwrap(), wealth_current);
        assert_relative_eq!(m.wealth_future.unwrap(), 502e9 + 400e9 - 860e9);
        assert_relative_eq!(m.efv_abs.unwrap(), m.wealth_future.unwrap() - wealth_current);
        assert_relative_eq!(m.efv_pct.unwrap(), m.efv_abs.unwrap() / 860e9 * 100.0);
        assert_relative_eq!(m.upside_pct.unwrap(), m.efv_abs.unwrap() / 502e9 * 100.0);
    }

    #[test]
    fn test_combined_score_treats_undefined_as_zero() {
        let mut record = sample::vale3();
        record.market_cap = Some(0.0);
        let m = engine().compute(&record, 1.0).unwrap();
        let expected = 0.4 * m.eva_pct.unwrap() + 0.4 * m.efv_pct.unwrap();
        assert_relative_eq!(m.combined_score, expected);

        let weights = CompositeWeights { eva: 1.0, efv: 0.0, upside: 0.0 };
        let m = engine().with_score_weights(weights).compute(&record, 1.0).unwrap();
        assert_relative_eq!(m.combined_score, m.eva_pct.unwrap());
    }

    #[test]
    fn test_profitability_and_liquidity() {
        let m = engine().compute(&sample::wege3(), 1.0).unwrap();
        assert_relative_eq!(m.profitability_pct.unwrap(), 5e9 / 32e9 * 100.0);
        assert_relative_eq!(m.liquidity_ratio.unwrap(), 2.0);

        let mut record = sample::wege3();
        record.revenue = Some(0.0);
        record.current_liabilities = None;
        let m = engine().compute(&record, 1.0).unwrap();
        assert_eq!(m.profitability_pct, None);
        assert_eq!(m.liquidity_ratio, None);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let engine = engine();
        let record = sample::itub4();
        let first = engine.compute(&record, 0.9).unwrap();
        let second = engine.compute(&record, 0.9).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.combined_score.to_bits(), second.combined_score.to_bits());
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        let engine = engine();
        let mut record = sample::petr4();
        record.market_cap = Some(f64::INFINITY);
        assert!(engine.compute(&record, 1.0).is_err());
        assert!(engine.compute(&sample::petr4(), f64::NAN).is_err());
    }

    #[test]
    fn test_from_policy_rate() {
        assert_relative_eq!(MetricsEngine::from_policy_rate(Some(10.5)).risk_free_rate(), 0.105);
        assert_relative_eq!(MetricsEngine::from_policy_rate(None).risk_free_rate(), 0.10);
        assert_relative_eq!(MetricsEngine::from_policy_rate(Some(0.0)).risk_free_rate(), 0.10);
    }

    #[test]
    fn test_compute_batch_isolates_failures() {
        let mut broken = sample::vale3();
        broken.ebit = Some(f64::NAN);
        let records = vec![sample::petr4(), broken, sample::wege3(), sample::petr4()];

        let batch = engine().compute_batch(&records, |_| DEFAULT_BETA);
        let tickers: Vec<&str> = batch.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["PETR4", "WEGE3"]);
        assert_eq!(batch.excluded.len(), 2);
        assert_eq!(batch.excluded[0].ticker, "VALE3");
        assert_eq!(batch.excluded[1].reason, "duplicate ticker in batch");
    }
}
