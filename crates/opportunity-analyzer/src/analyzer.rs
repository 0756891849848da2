use analysis_core::sanitize::or_zero;
use analysis_core::stats::{mean_defined, z_scores};
use analysis_core::{AnalysisError, CompanyFinancialRecord, CompanyMetrics};
use metrics_engine::{CompositeWeights, MetricsEngine, DEFAULT_BETA};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::kmeans::KMeans;
use crate::models::{BestOpportunity, ClusterSummary, OpportunityEntry, OpportunityReport, CLUSTERING_ERROR_LABEL};

/// Upper bound on the number of clusters.
pub const MAX_CLUSTERS: usize = 3;
/// Upside (in percent) above which a company counts as undervalued.
pub const UNDERVALUED_UPSIDE_PCT: f64 = 20.0;
pub const BEST_OPPORTUNITIES_LIMIT: usize = 5;
pub const DEFAULT_SECTOR_TOP_N: usize = 3;

fn by_desc_then_ticker(a: (f64, &str), b: (f64, &str)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

fn sort_desc_by(entries: &mut [OpportunityEntry], key: fn(&OpportunityEntry) -> f64) {
    entries.sort_by(|a, b| by_desc_then_ticker((key(a), &a.ticker), (key(b), &b.ticker)));
}

/// Identifies value creators, growth candidates and undervalued companies,
/// and clusters the batch.
#[derive(Debug, Clone)]
pub struct OpportunityAnalyzer {
    engine: MetricsEngine,
    clustering: KMeans,
    score_weights: CompositeWeights,
    sector_top_n: usize,
    default_beta: f64,
}

impl Default for OpportunityAnalyzer {
    fn default() -> Self {
        Self::new(MetricsEngine::default())
    }
}

impl OpportunityAnalyzer {
    pub fn new(engine: MetricsEngine) -> Self {
        Self {
            engine,
            clustering: KMeans::new(MAX_CLUSTERS),
            score_weights: CompositeWeights::default(),
            sector_top_n: DEFAULT_SECTOR_TOP_N,
            default_beta: DEFAULT_BETA,
        }
    }

    /// Seed, restart count and iteration cap for the k-means step.
    pub fn with_clustering(mut self, seed: u64, restarts: usize, max_iterations: usize) -> Self {
        self.clustering = self
            .clustering
            .with_seed(seed)
            .with_restarts(restarts)
            .with_max_iterations(max_iterations);
        self
    }

    pub fn with_sector_top_n(mut self, top_n: usize) -> Self {
        self.sector_top_n = top_n;
        self
    }

    pub fn with_default_beta(mut self, beta: f64) -> Self {
        self.default_beta = beta;
        self
    }

    /// Compute metrics for `records` at the default beta, then analyze them.
    pub fn identify_opportunities(&self, records: &[CompanyFinancialRecord]) -> OpportunityReport {
        let batch = self.engine.compute_batch(records, |_| self.default_beta);
        self.analyze_metrics(&batch.rows)
    }

    pub fn analyze_metrics(&self, rows: &[CompanyMetrics]) -> OpportunityReport {
        let entries: Vec<OpportunityEntry> = rows
            .iter()
            .map(|row| OpportunityEntry::from_row(row, &self.score_weights))
            .collect();

        let mut value_creators: Vec<OpportunityEntry> = entries
            .iter()
            .filter(|e| e.eva_pct.is_some_and(|v| v > 0.0))
            .cloned()
            .collect();
        sort_desc_by(&mut value_creators, |e| or_zero(e.eva_pct));

        let mut growth_potential: Vec<OpportunityEntry> = entries
            .iter()
            .filter(|e| e.efv_pct.is_some_and(|v| v > 0.0))
            .cloned()
            .collect();
        sort_desc_by(&mut growth_potential, |e| or_zero(e.efv_pct));

        let mut undervalued: Vec<OpportunityEntry> = entries
            .iter()
            .filter(|e| e.upside_pct.is_some_and(|v| v > UNDERVALUED_UPSIDE_PCT))
            .cloned()
            .collect();
        sort_desc_by(&mut undervalued, |e| or_zero(e.upside_pct));

        let mut by_score = entries.clone();
        sort_desc_by(&mut by_score, |e| e.score);

        let best_opportunities = by_score
            .iter()
            .take(BEST_OPPORTUNITIES_LIMIT)
            .map(|entry| BestOpportunity {
                reasons: entry.reasons(),
                entry: entry.clone(),
            })
            .collect();

        let clusters = clusters_or_error_bucket(rows, self.cluster(rows));

        let sector_rankings = self.sector_rankings(&by_score, rows);

        tracing::info!(
            "Opportunities: {} value creators, {} growth, {} undervalued, {} clusters",
            value_creators.len(),
            growth_potential.len(),
            undervalued.len(),
            clusters.len()
        );

        OpportunityReport {
            value_creators,
            growth_potential,
            undervalued,
            best_opportunities,
            clusters,
            sector_rankings,
        }
    }

    /// k-means over z-scored valuation features, `k = min(3, n)`.
    ///
    /// Undefined features are read as 0 before scaling. An empty batch has
    /// no clusters.
    pub fn cluster(&self, rows: &[CompanyMetrics]) -> Result<Vec<ClusterSummary>, AnalysisError> {
        let n = rows.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let columns: [Vec<f64>; 5] = [
            rows.iter().map(|r| or_zero(r.metrics.eva_pct)).collect(),
            rows.iter().map(|r| or_zero(r.metrics.efv_pct)).collect(),
            rows.iter().map(|r| or_zero(r.metrics.upside_pct)).collect(),
            rows.iter().map(|r| or_zero(r.metrics.wealth_current)).collect(),
            rows.iter().map(|r| or_zero(r.metrics.wealth_future)).collect(),
        ];
        let scaled: Vec<Vec<f64>> = columns.iter().map(|c| z_scores(c)).collect();
        let points: Vec<Vec<f64>> = (0..n).map(|i| scaled.iter().map(|c| c[i]).collect()).collect();

        let k = MAX_CLUSTERS.min(n);
        let kmeans = KMeans::new(k)
            .with_seed(self.clustering.seed())
            .with_restarts(self.clustering.restarts())
            .with_max_iterations(self.clustering.max_iterations());
        let clustering = kmeans.fit(&points)?;

        let summaries = (0..k)
            .map(|id| {
                let members: Vec<&CompanyMetrics> = rows
                    .iter()
                    .zip(&clustering.labels)
                    .filter(|(_, &label)| label == id)
                    .map(|(row, _)| row)
                    .collect();
                let column = |f: fn(&CompanyMetrics) -> Option<f64>| -> Vec<Option<f64>> {
                    members.iter().map(|m| f(m)).collect()
                };

                ClusterSummary {
                    id,
                    label: format!("cluster_{}", id),
                    count: members.len(),
                    tickers: members.iter().map(|m| m.ticker.clone()).collect(),
                    mean_eva_pct: mean_defined(&column(|m| m.metrics.eva_pct)),
                    mean_efv_pct: mean_defined(&column(|m| m.metrics.efv_pct)),
                    mean_upside_pct: mean_defined(&column(|m| m.metrics.upside_pct)),
                    error: None,
                }
            })
            .collect();

        Ok(summaries)
    }

    /// Per-sector top-N by simple score. `sorted` must already be in score
    /// order; rows without a known sector are skipped.
    fn sector_rankings(
        &self,
        sorted: &[OpportunityEntry],
        rows: &[CompanyMetrics],
    ) -> BTreeMap<String, Vec<OpportunityEntry>> {
        let sectors: BTreeMap<&str, &str> = rows
            .iter()
            .filter_map(|r| r.known_sector().map(|s| (r.ticker.as_str(), s)))
            .collect();

        let mut rankings: BTreeMap<String, Vec<OpportunityEntry>> = BTreeMap::new();
        for entry in sorted {
            if let Some(sector) = sectors.get(entry.ticker.as_str()) {
                let bucket = rankings.entry(sector.to_string()).or_default();
                if bucket.len() < self.sector_top_n {
                    bucket.push(entry.clone());
                }
            }
        }
        rankings
    }
}

/// A failed clustering collapses into one bucket holding every ticker.
fn clusters_or_error_bucket(
    rows: &[CompanyMetrics],
    result: Result<Vec<ClusterSummary>, AnalysisError>,
) -> Vec<ClusterSummary> {
    match result {
        Ok(clusters) => clusters,
        Err(e) => {
            tracing::warn!("Clustering failed for {} companies: {}", rows.len(), e);
            vec![ClusterSummary {
                id: 0,
                label: CLUSTERING_ERROR_LABEL.to_string(),
                count: rows.len(),
                tickers: rows.iter().map(|r| r.ticker.clone()).collect(),
                mean_eva_pct: None,
                mean_efv_pct: None,
                mean_upside_pct: None,
                error: Some(e.to_string()),
            }]
        }
    }
}
