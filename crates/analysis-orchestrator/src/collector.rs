use analysis_core::{normalize_ticker, CompanyFinancialRecord, FinancialDataSource};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Normalize tickers and drop repeats, keeping first-seen order.
pub fn normalize_universe(tickers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers
        .iter()
        .map(|t| normalize_ticker(t))
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

/// Fetch records for `tickers` concurrently.
///
/// Tickers the source has no data for, or fails on, are logged and skipped.
/// The result follows the order of `tickers` regardless of completion order.
pub async fn collect_records(source: Arc<dyn FinancialDataSource>, tickers: &[String]) -> Vec<CompanyFinancialRecord> {
    tracing::info!("Collecting data for {} tickers", tickers.len());

    let mut tasks = JoinSet::new();
    for (index, ticker) in tickers.iter().enumerate() {
        let source = Arc::clone(&source);
        let ticker = ticker.clone();
        tasks.spawn(async move {
            let result = source.company_record(&ticker).await;
            (index, ticker, result)
        });
    }

    let mut collected: Vec<(usize, CompanyFinancialRecord)> = Vec::with_capacity(tickers.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _, Ok(Some(record)))) => collected.push((index, record)),
            Ok((_, ticker, Ok(None))) => {
                tracing::warn!("No data available for {}", ticker);
            }
            Ok((_, ticker, Err(e))) => {
                tracing::warn!("Failed to collect data for {}: {:#}", ticker, e);
            }
            Err(e) => {
                tracing::error!("Collection task failed: {}", e);
            }
        }
    }

    collected.sort_by_key(|(index, _)| *index);
    tracing::info!("Collected {} of {} records", collected.len(), tickers.len());
    collected.into_iter().map(|(_, record)| record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleDataSource;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Answers slower for earlier tickers so tasks finish out of order.
    struct SlowSource {
        inner: SampleDataSource,
        order: Vec<String>,
    }

    #[async_trait]
    impl FinancialDataSource for SlowSource {
        async fn company_record(&self, ticker: &str) -> anyhow::Result<Option<CompanyFinancialRecord>> {
            let position = self.order.iter().position(|t| t == ticker).unwrap_or(0);
            let delay = (self.order.len() - position) as u64 * 5;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if ticker == "FAIL3" {
                anyhow::bail!("provider unavailable");
            }
            self.inner.company_record(ticker).await
        }
    }

    #[test]
    fn test_normalize_universe_dedupes() {
        let tickers: Vec<String> = ["petr4.sa", "VALE3", "PETR4", " ", "wege3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(normalize_universe(&tickers), vec!["PETR4", "VALE3", "WEGE3"]);
    }

    #[tokio::test]
    async fn test_collect_preserves_input_order_and_skips_failures() {
        let order: Vec<String> = ["WEGE3", "FAIL3", "PETR4", "XXXX3", "VALE3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let source: Arc<dyn FinancialDataSource> = Arc::new(SlowSource {
            inner: SampleDataSource::ibovespa(),
            order: order.clone(),
        });

        let records = collect_records(source, &order).await;
        let tickers: Vec<&str> = records.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["WEGE3", "PETR4", "VALE3"]);
    }
}
