use analysis_core::sanitize::{finite, finite_opt};
use analysis_core::CompanyMetrics;
use metrics_engine::CompositeWeights;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CLUSTERING_ERROR_LABEL: &str = "Erro no Clustering";

pub const REASON_POSITIVE_EVA: &str = "EVA Positivo";
pub const REASON_POSITIVE_EFV: &str = "EFV Positivo";
pub const REASON_UPSIDE: &str = "Upside";

/// One company inside an opportunity bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityEntry {
    pub ticker: String,
    pub company_name: String,
    pub sector: Option<String>,
    #[serde(serialize_with = "finite_opt")]
    pub eva_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub efv_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub upside_pct: Option<f64>,
    /// Simple opportunity score; undefined inputs contribute 0.
    #[serde(serialize_with = "finite")]
    pub score: f64,
}

impl OpportunityEntry {
    pub fn from_row(row: &CompanyMetrics, weights: &CompositeWeights) -> Self {
        let m = &row.metrics;
        Self {
            ticker: row.ticker.clone(),
            company_name: row.company_name.clone(),
            sector: row.sector.clone(),
            eva_pct: m.eva_pct,
            efv_pct: m.efv_pct,
            upside_pct: m.upside_pct,
            score: weights.blend(m.eva_pct, m.efv_pct, m.upside_pct),
        }
    }

    /// Labels for the positive signals this company shows.
    pub fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.eva_pct.is_some_and(|v| v > 0.0) {
            reasons.push(REASON_POSITIVE_EVA.to_string());
        }
        if self.efv_pct.is_some_and(|v| v > 0.0) {
            reasons.push(REASON_POSITIVE_EFV.to_string());
        }
        if self.upside_pct.is_some_and(|v| v > 0.0) {
            reasons.push(REASON_UPSIDE.to_string());
        }
        reasons
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestOpportunity {
    #[serde(flatten)]
    pub entry: OpportunityEntry,
    pub reasons: Vec<String>,
}

/// Members and mean metrics of one cluster.
///
/// When clustering fails the report holds a single summary labelled
/// [`CLUSTERING_ERROR_LABEL`] with every ticker and `error` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: usize,
    pub label: String,
    pub count: usize,
    pub tickers: Vec<String>,
    #[serde(serialize_with = "finite_opt")]
    pub mean_eva_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub mean_efv_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub mean_upside_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClusterSummary {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityReport {
    pub value_creators: Vec<OpportunityEntry>,
    pub growth_potential: Vec<OpportunityEntry>,
    pub undervalued: Vec<OpportunityEntry>,
    pub best_opportunities: Vec<BestOpportunity>,
    pub clusters: Vec<ClusterSummary>,
    pub sector_rankings: BTreeMap<String, Vec<OpportunityEntry>>,
}
