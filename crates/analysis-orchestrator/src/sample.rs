//! In-memory collaborators: a fixture data source, a fixed policy rate and
//! a metrics store that keeps everything it is given.

use analysis_core::{normalize_ticker, sample, CompanyFinancialRecord, FinancialDataSource, MetricsResult, MetricsStore, RateProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Serves a fixed set of records keyed by normalized ticker.
#[derive(Debug, Clone, Default)]
pub struct SampleDataSource {
    records: HashMap<String, CompanyFinancialRecord>,
}

impl SampleDataSource {
    pub fn new(records: impl IntoIterator<Item = CompanyFinancialRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (normalize_ticker(&r.ticker), r))
                .collect(),
        }
    }

    /// The five-company Ibovespa sample.
    pub fn ibovespa() -> Self {
        Self::new(sample::ibovespa_sample())
    }

    /// Tickers served, sorted.
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.records.keys().cloned().collect();
        tickers.sort();
        tickers
    }
}

#[async_trait]
impl FinancialDataSource for SampleDataSource {
    async fn company_record(&self, ticker: &str) -> anyhow::Result<Option<CompanyFinancialRecord>> {
        Ok(self.records.get(&normalize_ticker(ticker)).cloned())
    }
}

/// Returns the same policy rate on every call.
#[derive(Debug, Clone, Copy)]
pub struct StaticRateProvider {
    rate_percent: Option<f64>,
}

impl StaticRateProvider {
    pub fn new(rate_percent: f64) -> Self {
        Self {
            rate_percent: Some(rate_percent),
        }
    }

    pub fn unavailable() -> Self {
        Self { rate_percent: None }
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    async fn policy_rate_percent(&self) -> anyhow::Result<Option<f64>> {
        Ok(self.rate_percent)
    }
}

/// Keeps saved metrics in memory, keyed by ticker.
#[derive(Debug, Default)]
pub struct MemoryMetricsStore {
    saved: Mutex<HashMap<String, MetricsResult>>,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, ticker: &str) -> Option<MetricsResult> {
        self.saved.lock().await.get(ticker).cloned()
    }

    pub async fn len(&self) -> usize {
        self.saved.lock().await.len()
    }
}

#[async_trait]
impl MetricsStore for MemoryMetricsStore {
    async fn save_company_metrics(&self, record: &CompanyFinancialRecord, metrics: &MetricsResult) -> anyhow::Result<()> {
        self.saved
            .lock()
            .await
            .insert(record.ticker.clone(), metrics.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sample_source_normalizes_lookups() {
        let source = SampleDataSource::ibovespa();
        assert_eq!(source.tickers(), vec!["BBDC4", "ITUB4", "PETR4", "VALE3", "WEGE3"]);

        let record = source.company_record("petr4.sa").await.unwrap().unwrap();
        assert_eq!(record.ticker, "PETR4");
        assert!(source.company_record("XXXX3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_static_rate_provider() {
        assert_eq!(StaticRateProvider::new(10.5).policy_rate_percent().await.unwrap(), Some(10.5));
        assert_eq!(StaticRateProvider::unavailable().policy_rate_percent().await.unwrap(), None);
    }
}
