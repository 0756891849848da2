use async_trait::async_trait;
use crate::{CompanyFinancialRecord, MetricsResult};

/// Source of raw company snapshots (market-data collectors, fixtures).
///
/// Retry, backoff and rate limiting are the implementation's concern.
/// `Ok(None)` means the provider has no data for the ticker.
#[async_trait]
pub trait FinancialDataSource: Send + Sync {
    async fn company_record(&self, ticker: &str) -> anyhow::Result<Option<CompanyFinancialRecord>>;
}

/// Source of the central-bank policy rate, in percent (e.g. `10.5`).
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn policy_rate_percent(&self) -> anyhow::Result<Option<f64>>;
}

/// Sink for per-company results (report storage, caches).
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn save_company_metrics(
        &self,
        record: &CompanyFinancialRecord,
        metrics: &MetricsResult,
    ) -> anyhow::Result<()>;
}
