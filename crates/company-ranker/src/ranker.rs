//! Composite-score and single-metric rankings.

use analysis_core::sanitize::or_zero;
use analysis_core::stats::min_max_scale;
use analysis_core::{AnalysisError, CompanyFinancialRecord, CompanyMetrics, ExcludedCompany, Metric};
use metrics_engine::{BatchMetrics, MetricsEngine, DEFAULT_BETA};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::criteria::{RankingCriteria, RawCriteriaMetrics, ScaledCriteriaMetrics, ScoredCompany};

/// Companies sorted by composite score, highest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingReport {
    pub rows: Vec<CompanyMetrics>,
    pub excluded: Vec<ExcludedCompany>,
}

impl RankingReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, ticker: &str) -> Option<&CompanyMetrics> {
        self.rows.iter().find(|row| row.ticker == ticker)
    }
}

/// Descending by value, then ticker ascending.
fn by_value_desc_then_ticker(a: (f64, &str), b: (f64, &str)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

/// Ascending by value, then ticker ascending.
fn by_value_asc_then_ticker(a: (f64, &str), b: (f64, &str)) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1))
}

/// Ranks companies on the metrics computed by a [`MetricsEngine`].
#[derive(Debug, Clone)]
pub struct CompanyRanker {
    engine: MetricsEngine,
    default_beta: f64,
}

impl Default for CompanyRanker {
    fn default() -> Self {
        Self::new(MetricsEngine::default())
    }
}

impl CompanyRanker {
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

    pub fn engine(&self) -> &MetricsEngine {
        &self.engine
    }

    /// Compute metrics for every record and sort by composite score.
    ///
    /// Records the engine rejects are listed in `excluded` instead of
    /// aborting the batch.
    pub fn rank<F>(&self, records: &[CompanyFinancialRecord], beta_fn: F) -> RankingReport
    where
        F: Fn(&CompanyFinancialRecord) -> f64,
    {
        let batch = self.engine.compute_batch(records, beta_fn);
        Self::from_batch(batch)
    }

    /// Sort an already computed batch by composite score.
    pub fn from_batch(batch: BatchMetrics) -> RankingReport {
        let BatchMetrics { mut rows, excluded } = batch;
        rows.sort_by(|a, b| {
            by_value_desc_then_ticker(
                (or_zero(Some(a.metrics.combined_score)), &a.ticker),
                (or_zero(Some(b.metrics.combined_score)), &b.ticker),
            )
        });

        tracing::info!(
            "Ranked {} companies ({} excluded)",
            rows.len(),
            excluded.len()
        );

        RankingReport { rows, excluded }
    }

    /// Sort the report by a single metric.
    ///
    /// Undefined values are flattened to 0 here so the order is total; the
    /// report rows keep the undefined marker.
    pub fn rank_by(report: &RankingReport, metric: Metric, ascending: bool) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = report
            .rows
            .iter()
            .map(|row| (row.ticker.clone(), or_zero(row.metrics.value(metric))))
            .collect();

        let compare = if ascending {
            by_value_asc_then_ticker
        } else {
            by_value_desc_then_ticker
        };
        ranked.sort_by(|a, b| compare((a.1, &a.0), (b.1, &b.0)));
        ranked
    }

    /// [`rank_by`](Self::rank_by) with the metric given by name.
    pub fn rank_by_name(
        report: &RankingReport,
        metric_name: &str,
        ascending: bool,
    ) -> Result<Vec<(String, f64)>, AnalysisError> {
        let metric: Metric = metric_name.parse()?;
        Ok(Self::rank_by(report, metric, ascending))
    }

    /// Score records against custom criteria.
    pub fn custom_rank_companies(
        &self,
        records: &[CompanyFinancialRecord],
        criteria: RankingCriteria,
    ) -> Result<Vec<ScoredCompany>, AnalysisError> {
        let batch = self.engine.compute_batch(records, |_| self.default_beta);
        Self::custom_rank_metrics(&batch.rows, criteria)
    }

    /// Score computed rows against custom criteria.
    ///
    /// Each factor is min-max scaled across `rows`, so a company's score
    /// depends on the rest of the batch.
    pub fn custom_rank_metrics(
        rows: &[CompanyMetrics],
        mut criteria: RankingCriteria,
    ) -> Result<Vec<ScoredCompany>, AnalysisError> {
        criteria.validate()?;
        criteria.normalize_weights();

        let column = |f: fn(&CompanyMetrics) -> Option<f64>| -> Vec<Option<f64>> { rows.iter().map(f).collect() };
        let eva = column(|r| r.metrics.eva_pct);
        let efv = column(|r| r.metrics.efv_pct);
        let upside = column(|r| r.metrics.upside_pct);
        let profitability = column(|r| r.metrics.profitability_pct);
        let liquidity = column(|r| r.metrics.liquidity_ratio);

        let eva_scaled = min_max_scale(&eva);
        let efv_scaled = min_max_scale(&efv);
        let upside_scaled = min_max_scale(&upside);
        let profitability_scaled = min_max_scale(&profitability);
        let liquidity_scaled = min_max_scale(&liquidity);

        let mut scored: Vec<ScoredCompany> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let scaled = ScaledCriteriaMetrics {
                    eva_pct: eva_scaled[i],
                    efv_pct: efv_scaled[i],
                    upside_pct: upside_scaled[i],
                    profitability_pct: profitability_scaled[i],
                    liquidity_ratio: liquidity_scaled[i],
                };
                let score = scaled.weighted_sum(&criteria);
                ScoredCompany {
                    ticker: row.ticker.clone(),
                    company_name: row.company_name.clone(),
                    sector: row.sector.clone(),
                    raw: RawCriteriaMetrics {
                        eva_pct: eva[i],
                        efv_pct: efv[i],
                        upside_pct: upside[i],
                        profitability_pct: profitability[i],
                        liquidity_ratio: liquidity[i],
                    },
                    scaled,
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| by_value_desc_then_ticker((a.score, &a.ticker), (b.score, &b.ticker)));
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{sample, MetricsResult};
    use approx::assert_relative_eq;

    fn row(ticker: &str, metrics: MetricsResult) -> CompanyMetrics {
        CompanyMetrics {
            ticker: ticker.to_string(),
            company_name: format!("{} S.A.", ticker),
            sector: None,
            market_cap: None,
            stock_price: None,
            data_quality_score: 1.0,
            metrics,
        }
    }

    fn with_eva(ticker: &str, eva_pct: Option<f64>, combined_score: f64) -> CompanyMetrics {
        row(
            ticker,
            MetricsResult {
                eva_pct,
                combined_score,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_rank_sorts_by_combined_score() {
        let ranker = CompanyRanker::new(MetricsEngine::new(0.10));
        let report = ranker.rank(&sample::ibovespa_sample(), |_| 1.0);

        assert_eq!(report.len(), 5);
        assert!(report.excluded.is_empty());
        for pair in report.rows.windows(2) {
            assert!(pair[0].metrics.combined_score >= pair[1].metrics.combined_score);
        }
    }

    #[test]
    fn test_rank_excludes_malformed_records() {
        let ranker = CompanyRanker::default();
        let mut broken = sample::bbdc4();
        broken.revenue = Some(f64::NAN);
        let report = ranker.rank(&[sample::petr4(), broken], |_| 1.0);

        assert_eq!(report.len(), 1);
        assert_eq!(report.excluded.len(), 1);
        assert_eq!(report.excluded[0].ticker, "BBDC4");
        assert!(report.get("BBDC4").is_none());
    }

    #[test]
    fn test_ties_break_by_ticker() {
        let batch = BatchMetrics {
            rows: vec![with_eva("ZZZ3", None, 5.0), with_eva("AAA3", None, 5.0), with_eva("MMM3", None, 9.0)],
            excluded: vec![],
        };
        let report = CompanyRanker::from_batch(batch);
        let order: Vec<&str> = report.rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, vec!["MMM3", "AAA3", "ZZZ3"]);
    }

    #[test]
    fn test_rank_by_flattens_undefined_to_zero() {
        let report = RankingReport {
            rows: vec![
                with_eva("BBB3", Some(-2.0), 0.0),
                with_eva("AAA3", None, 0.0),
                with_eva("CCC3", Some(4.0), 0.0),
                with_eva("DDD3", Some(0.0), 0.0),
            ],
            excluded: vec![],
        };

        let desc = CompanyRanker::rank_by(&report, Metric::EvaPct, false);
        assert_eq!(
            desc,
            vec![
                ("CCC3".to_string(), 4.0),
                ("AAA3".to_string(), 0.0),
                ("DDD3".to_string(), 0.0),
                ("BBB3".to_string(), -2.0),
            ]
        );

        let asc = CompanyRanker::rank_by(&report, Metric::EvaPct, true);
        let order: Vec<&str> = asc.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(order, vec!["BBB3", "AAA3", "DDD3", "CCC3"]);

        // Rows still carry the undefined marker
        assert_eq!(report.get("AAA3").unwrap().metrics.eva_pct, None);
    }

    #[test]
    fn test_rank_by_name_rejects_unknown_metric() {
        let report = RankingReport::default();
        assert!(CompanyRanker::rank_by_name(&report, "eva_pct", false).is_ok());
        assert!(CompanyRanker::rank_by_name(&report, "beta", false).is_err());
    }

    #[test]
    fn test_eva_only_criteria_rank_by_scaled_eva() {
        let rows = vec![
            with_eva("AAA3", Some(1.0), 0.0),
            with_eva("BBB3", Some(9.0), 0.0),
            with_eva("CCC3", Some(5.0), 0.0),
        ];
        let criteria = RankingCriteria::new(1.0, 0.0, 0.0, 0.0, 0.0);
        let scored = CompanyRanker::custom_rank_metrics(&rows, criteria).unwrap();

        let order: Vec<&str> = scored.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(order, vec!["BBB3", "CCC3", "AAA3"]);
        assert_relative_eq!(scored[0].score, 1.0);
        assert_relative_eq!(scored[1].score, 0.5);
        assert_relative_eq!(scored[2].score, 0.0);
        for s in &scored {
            assert_relative_eq!(s.score, s.scaled.eva_pct);
        }
    }

    #[test]
    fn test_custom_rank_single_company_degenerates_to_zero() {
        let rows = vec![with_eva("ONLY3", Some(12.0), 0.0)];
        let scored = CompanyRanker::custom_rank_metrics(&rows, RankingCriteria::default()).unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].score, 0.0);
        assert_eq!(scored[0].raw.eva_pct, Some(12.0));
    }

    #[test]
    fn test_custom_rank_companies_from_records() {
        let ranker = CompanyRanker::new(MetricsEngine::new(0.10));
        let scored = ranker
            .custom_rank_companies(&sample::ibovespa_sample(), RankingCriteria::default())
            .unwrap();

        assert_eq!(scored.len(), 5);
        for s in &scored {
            assert!((0.0..=1.0 + 1e-12).contains(&s.score), "{} scored {}", s.ticker, s.score);
        }
        assert!(ranker
            .custom_rank_companies(&sample::ibovespa_sample(), RankingCriteria::new(-1.0, 0.0, 0.0, 0.0, 0.0))
            .is_err());
    }

    #[test]
    fn test_report_serializes_undefined_as_null() {
        let report = RankingReport {
            rows: vec![with_eva("AAA3", None, 1.0)],
            excluded: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["rows"][0]["eva_pct"].is_null());
        assert_eq!(json["rows"][0]["combined_score"], 1.0);
    }
}
