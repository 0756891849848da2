use analysis_core::{AnalysisError, CompanyFinancialRecord, FinancialDataSource, Metric, MetricsStore, RateProvider};
use company_ranker::{CompanyRanker, RankingCriteria, RankingReport};
use metrics_engine::MetricsEngine;
use opportunity_analyzer::OpportunityAnalyzer;
use portfolio_allocator::{AllocationProfile, PortfolioAllocator};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub mod collector;
pub mod config;
pub mod report;
pub mod sample;

pub use config::AnalysisConfig;
pub use report::{
    AnalysisOutcome, AnalysisReport, CompanyAnalysis, CompanyAnalysisOutcome, PortfolioSuggestion, RankedValue,
    Rankings, SummaryStatistics,
};
pub use sample::{MemoryMetricsStore, SampleDataSource, StaticRateProvider};

/// Parameters of one analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub tickers: Vec<String>,
    /// Analyze only the first N tickers when `0 < N < tickers.len()`.
    pub num_companies: Option<usize>,
    /// Adds a custom-criteria ranking to the report.
    pub criteria: Option<RankingCriteria>,
    /// Per-ticker beta; missing tickers use the configured default.
    pub betas: HashMap<String, f64>,
    /// Overrides the configured allocation profile.
    pub profile: Option<AllocationProfile>,
}

impl AnalysisRequest {
    pub fn new(tickers: Vec<String>) -> Self {
        Self {
            tickers,
            ..Default::default()
        }
    }

    pub fn with_num_companies(mut self, num_companies: usize) -> Self {
        self.num_companies = Some(num_companies);
        self
    }

    pub fn with_criteria(mut self, criteria: RankingCriteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn with_beta(mut self, ticker: &str, beta: f64) -> Self {
        self.betas.insert(analysis_core::normalize_ticker(ticker), beta);
        self
    }

    pub fn with_profile(mut self, profile: AllocationProfile) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// Runs collection, metrics, ranking, opportunity analysis and allocation
/// over a ticker universe.
///
/// Built by the caller and shared by `Arc`; holds no global state.
pub struct AnalysisOrchestrator {
    config: AnalysisConfig,
    data_source: Arc<dyn FinancialDataSource>,
    rate_provider: Option<Arc<dyn RateProvider>>,
    metrics_store: Option<Arc<dyn MetricsStore>>,
}

impl AnalysisOrchestrator {
    pub fn new(config: AnalysisConfig, data_source: Arc<dyn FinancialDataSource>) -> Self {
        Self {
            config,
            data_source,
            rate_provider: None,
            metrics_store: None,
        }
    }

    pub fn with_rate_provider(mut self, provider: Arc<dyn RateProvider>) -> Self {
        self.rate_provider = Some(provider);
        self
    }

    pub fn with_metrics_store(mut self, store: Arc<dyn MetricsStore>) -> Self {
        self.metrics_store = Some(store);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Engine for the current policy rate: the configured override, then the
    /// rate provider, then the default rate.
    pub async fn metrics_engine(&self) -> MetricsEngine {
        if let Some(rate) = self.config.risk_free_rate_percent {
            return MetricsEngine::from_policy_rate(Some(rate));
        }

        let rate = match &self.rate_provider {
            Some(provider) => match provider.policy_rate_percent().await {
                Ok(rate) => rate,
                Err(e) => {
                    tracing::warn!("Policy rate lookup failed: {:#}", e);
                    None
                }
            },
            None => None,
        };
        MetricsEngine::from_policy_rate(rate)
    }

    /// Full analysis with the configured defaults.
    pub async fn run_complete_analysis(&self, tickers: &[String], num_companies: Option<usize>) -> AnalysisOutcome {
        let request = AnalysisRequest {
            tickers: tickers.to_vec(),
            num_companies,
            ..Default::default()
        };
        self.run(request).await
    }

    pub async fn run(&self, request: AnalysisRequest) -> AnalysisOutcome {
        let started = Instant::now();

        let mut universe = collector::normalize_universe(&request.tickers);
        match request.num_companies {
            Some(n) if n > 0 && n < universe.len() => {
                tracing::info!("Running quick analysis for the first {} companies", n);
                universe.truncate(n);
            }
            _ => tracing::info!("Running complete analysis for {} companies", universe.len()),
        }

        let engine = self.metrics_engine().await;

        let stage = Instant::now();
        let records = collector::collect_records(Arc::clone(&self.data_source), &universe).await;
        tracing::info!("Data collection took {} ms", stage.elapsed().as_millis());

        if records.is_empty() {
            tracing::error!("No data was collected for the analysis");
            return AnalysisOutcome::error("No data was collected for the analysis.");
        }

        let outcome = match self.build_report(&engine, &records, &request) {
            Ok(report) => {
                self.persist(&records, &report).await;
                AnalysisOutcome::Success(Box::new(report))
            }
            Err(e) => {
                tracing::error!("Analysis failed: {}", e);
                AnalysisOutcome::error(e.to_string())
            }
        };

        tracing::info!("Complete analysis took {} ms", started.elapsed().as_millis());
        outcome
    }

    /// Synchronous core of a run: every stage after collection.
    pub fn build_report(
        &self,
        engine: &MetricsEngine,
        records: &[CompanyFinancialRecord],
        request: &AnalysisRequest,
    ) -> Result<AnalysisReport, AnalysisError> {
        let default_beta = self.config.default_beta;
        let beta_for = |record: &CompanyFinancialRecord| {
            request
                .betas
                .get(&record.ticker)
                .copied()
                .unwrap_or(default_beta)
        };

        let stage = Instant::now();
        let ranking = CompanyRanker::new(engine.clone())
            .with_default_beta(default_beta)
            .rank(records, beta_for);
        tracing::info!("Metrics and ranking took {} ms", stage.elapsed().as_millis());

        if ranking.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "The metrics report is empty.".to_string(),
            ));
        }

        let stage = Instant::now();
        let opportunities = OpportunityAnalyzer::new(engine.clone())
            .with_clustering(
                self.config.kmeans_seed,
                self.config.kmeans_restarts,
                self.config.kmeans_max_iterations,
            )
            .with_sector_top_n(self.config.sector_top_n)
            .with_default_beta(default_beta)
            .analyze_metrics(&ranking.rows);
        tracing::info!("Opportunity analysis took {} ms", stage.elapsed().as_millis());

        let profile = request.profile.unwrap_or(self.config.allocation_profile);
        let allocation = PortfolioAllocator::allocate_metrics(&ranking.rows, profile);
        let portfolio_eva = PortfolioAllocator::calculate_portfolio_eva(&allocation.weights, &ranking.rows);

        let custom_ranking = match request.criteria {
            Some(criteria) => Some(CompanyRanker::custom_rank_metrics(&ranking.rows, criteria)?),
            None => None,
        };

        let summary_statistics = report::SummaryStatistics::from_rows(&ranking.rows, opportunities.undervalued.len());
        let rankings = self.rankings(&ranking);

        Ok(AnalysisReport {
            timestamp: chrono::Utc::now(),
            risk_free_rate: engine.risk_free_rate(),
            total_companies_analyzed: ranking.len(),
            excluded_companies: ranking.excluded.clone(),
            summary_statistics,
            rankings,
            opportunities,
            portfolio_suggestion: PortfolioSuggestion {
                allocation,
                portfolio_eva,
            },
            custom_ranking,
            full_report_data: ranking.rows,
        })
    }

    fn rankings(&self, report: &RankingReport) -> Rankings {
        let top = |metric: Metric, ascending: bool| -> Vec<RankedValue> {
            CompanyRanker::rank_by(report, metric, ascending)
                .into_iter()
                .take(self.config.ranking_top_n)
                .map(RankedValue::from)
                .collect()
        };

        Rankings {
            top_combined_score: top(Metric::CombinedScore, false),
            top_eva: top(Metric::EvaPct, false),
            top_efv: top(Metric::EfvPct, false),
            top_upside: top(Metric::UpsidePct, false),
            lowest_wacc: top(Metric::Wacc, true),
        }
    }

    /// Hand each computed row to the metrics store. Failures are logged only.
    async fn persist(&self, records: &[CompanyFinancialRecord], report: &AnalysisReport) {
        let Some(store) = &self.metrics_store else {
            return;
        };

        for row in &report.full_report_data {
            let Some(record) = records.iter().find(|r| r.ticker == row.ticker) else {
                continue;
            };
            if let Err(e) = store.save_company_metrics(record, &row.metrics).await {
                tracing::error!("Failed to save metrics for {}: {:#}", row.ticker, e);
            }
        }
    }

    /// Metrics for one company at the configured default beta.
    pub async fn get_company_analysis(&self, ticker: &str) -> CompanyAnalysisOutcome {
        let started = Instant::now();
        let ticker = analysis_core::normalize_ticker(ticker);

        let record = match self.data_source.company_record(&ticker).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::error!("Could not collect data for {}", ticker);
                return CompanyAnalysisOutcome::error(format!("Could not collect data for {}", ticker));
            }
            Err(e) => {
                tracing::error!("Could not collect data for {}: {:#}", ticker, e);
                return CompanyAnalysisOutcome::error(format!("Could not collect data for {}: {}", ticker, e));
            }
        };

        let engine = self.metrics_engine().await;
        let beta = self.config.default_beta;

        let outcome = match engine.compute(&record, beta) {
            Ok(metrics) => {
                if let Some(store) = &self.metrics_store {
                    if let Err(e) = store.save_company_metrics(&record, &metrics).await {
                        tracing::error!("Failed to save metrics for {}: {:#}", ticker, e);
                    }
                }
                CompanyAnalysisOutcome::Success(Box::new(CompanyAnalysis {
                    timestamp: chrono::Utc::now(),
                    risk_free_rate: engine.risk_free_rate(),
                    beta,
                    company: analysis_core::CompanyMetrics::from_record(&record, metrics),
                }))
            }
            Err(e) => {
                tracing::error!("Analysis of {} failed: {}", ticker, e);
                CompanyAnalysisOutcome::error(format!("Analysis of {} failed: {}", ticker, e))
            }
        };

        tracing::info!("Analysis of {} took {} ms", ticker, started.elapsed().as_millis());
        outcome
    }
}
