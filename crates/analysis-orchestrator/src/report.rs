use analysis_core::sanitize::{finite, finite_opt};
use analysis_core::stats::mean_defined;
use analysis_core::{CompanyMetrics, ExcludedCompany};
use chrono::{DateTime, Utc};
use company_ranker::ScoredCompany;
use opportunity_analyzer::OpportunityReport;
use portfolio_allocator::{PortfolioAllocation, PortfolioEva};
use serde::{Deserialize, Serialize};

/// Result of a full analysis run, tagged by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Success(Box<AnalysisReport>),
    Error { message: String },
}

impl AnalysisOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        AnalysisOutcome::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success(_))
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Success(report) => Some(report),
            AnalysisOutcome::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub timestamp: DateTime<Utc>,
    /// Risk-free rate used, as a fraction.
    #[serde(serialize_with = "finite")]
    pub risk_free_rate: f64,
    pub total_companies_analyzed: usize,
    pub excluded_companies: Vec<ExcludedCompany>,
    pub summary_statistics: SummaryStatistics,
    pub rankings: Rankings,
    pub opportunities: OpportunityReport,
    pub portfolio_suggestion: PortfolioSuggestion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_ranking: Option<Vec<ScoredCompany>>,
    /// Every analyzed company, sorted by composite score.
    pub full_report_data: Vec<CompanyMetrics>,
}

/// Batch-level counts and averages. Averages cover defined values only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub positive_eva_count: usize,
    pub positive_efv_count: usize,
    pub undervalued_count: usize,
    #[serde(serialize_with = "finite_opt")]
    pub average_wacc_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub average_eva_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub average_efv_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub average_upside_pct: Option<f64>,
    #[serde(serialize_with = "finite")]
    pub total_market_cap: f64,
}

impl SummaryStatistics {
    pub fn from_rows(rows: &[CompanyMetrics], undervalued_count: usize) -> Self {
        let column = |f: fn(&CompanyMetrics) -> Option<f64>| -> Vec<Option<f64>> { rows.iter().map(f).collect() };
        Self {
            positive_eva_count: rows
                .iter()
                .filter(|r| r.metrics.eva_pct.is_some_and(|v| v > 0.0))
                .count(),
            positive_efv_count: rows
                .iter()
                .filter(|r| r.metrics.efv_pct.is_some_and(|v| v > 0.0))
                .count(),
            undervalued_count,
            average_wacc_pct: mean_defined(&column(|r| r.metrics.wacc_pct)),
            average_eva_pct: mean_defined(&column(|r| r.metrics.eva_pct)),
            average_efv_pct: mean_defined(&column(|r| r.metrics.efv_pct)),
            average_upside_pct: mean_defined(&column(|r| r.metrics.upside_pct)),
            total_market_cap: rows.iter().filter_map(|r| r.market_cap).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedValue {
    pub ticker: String,
    #[serde(serialize_with = "finite")]
    pub value: f64,
}

impl From<(String, f64)> for RankedValue {
    fn from((ticker, value): (String, f64)) -> Self {
        Self { ticker, value }
    }
}

/// Top-N lists per headline metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rankings {
    pub top_combined_score: Vec<RankedValue>,
    pub top_eva: Vec<RankedValue>,
    pub top_efv: Vec<RankedValue>,
    pub top_upside: Vec<RankedValue>,
    pub lowest_wacc: Vec<RankedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSuggestion {
    pub allocation: PortfolioAllocation,
    pub portfolio_eva: PortfolioEva,
}

/// Result of a single-company analysis, tagged by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CompanyAnalysisOutcome {
    Success(Box<CompanyAnalysis>),
    Error { message: String },
}

impl CompanyAnalysisOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        CompanyAnalysisOutcome::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompanyAnalysisOutcome::Success(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyAnalysis {
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "finite")]
    pub risk_free_rate: f64,
    #[serde(serialize_with = "finite")]
    pub beta: f64,
    pub company: CompanyMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::MetricsResult;
    use approx::assert_relative_eq;

    fn row(ticker: &str, market_cap: Option<f64>, eva: Option<f64>, efv: Option<f64>) -> CompanyMetrics {
        CompanyMetrics {
            ticker: ticker.to_string(),
            company_name: ticker.to_string(),
            sector: None,
            market_cap,
            stock_price: None,
            data_quality_score: 1.0,
            metrics: MetricsResult {
                eva_pct: eva,
                efv_pct: efv,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_summary_statistics_average_defined_values() {
        let rows = vec![
            row("AAAA3", Some(100.0), Some(4.0), Some(-1.0)),
            row("BBBB3", None, None, Some(3.0)),
            row("CCCC3", Some(50.0), Some(-2.0), None),
        ];
        let stats = SummaryStatistics::from_rows(&rows, 1);

        assert_eq!(stats.positive_eva_count, 1);
        assert_eq!(stats.positive_efv_count, 1);
        assert_eq!(stats.undervalued_count, 1);
        assert_relative_eq!(stats.average_eva_pct.unwrap(), 1.0);
        assert_relative_eq!(stats.average_efv_pct.unwrap(), 1.0);
        assert_eq!(stats.average_wacc_pct, None);
        assert_relative_eq!(stats.total_market_cap, 150.0);
    }

    #[test]
    fn test_error_outcome_shape() {
        let json = serde_json::to_value(AnalysisOutcome::error("no data")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "no data");
    }
}
