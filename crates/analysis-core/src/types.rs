use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::sanitize::{finite, finite_opt};
use crate::AnalysisError;

/// Normalized per-company financial snapshot.
///
/// Every numeric field is optional: `None` means the collector could not
/// determine the value, which is not the same as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyFinancialRecord {
    pub ticker: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,

    // Market
    #[serde(default, serialize_with = "finite_opt")]
    pub market_cap: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub stock_price: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub shares_outstanding: Option<f64>,

    // Income statement
    #[serde(default, serialize_with = "finite_opt")]
    pub revenue: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub ebit: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub net_income: Option<f64>,

    // Cash flow
    #[serde(default, serialize_with = "finite_opt")]
    pub depreciation_amortization: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub capex: Option<f64>,

    // Balance sheet
    #[serde(default, serialize_with = "finite_opt")]
    pub total_assets: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub total_debt: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub equity: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub current_assets: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub current_liabilities: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub cash: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub accounts_receivable: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub inventory: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub accounts_payable: Option<f64>,
    #[serde(default, serialize_with = "finite_opt")]
    pub property_plant_equipment: Option<f64>,
}

impl CompanyFinancialRecord {
    pub fn new(ticker: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            company_name: company_name.into(),
            ..Default::default()
        }
    }

    /// All numeric fields paired with their names, in declaration order.
    pub fn numeric_fields(&self) -> [(&'static str, Option<f64>); 18] {
        [
            ("market_cap", self.market_cap),
            ("stock_price", self.stock_price),
            ("shares_outstanding", self.shares_outstanding),
            ("revenue", self.revenue),
            ("ebit", self.ebit),
            ("net_income", self.net_income),
            ("depreciation_amortization", self.depreciation_amortization),
            ("capex", self.capex),
            ("total_assets", self.total_assets),
            ("total_debt", self.total_debt),
            ("equity", self.equity),
            ("current_assets", self.current_assets),
            ("current_liabilities", self.current_liabilities),
            ("cash", self.cash),
            ("accounts_receivable", self.accounts_receivable),
            ("inventory", self.inventory),
            ("accounts_payable", self.accounts_payable),
            ("property_plant_equipment", self.property_plant_equipment),
        ]
    }

    /// Reject records carrying NaN or infinite values. Missing values are fine.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.ticker.trim().is_empty() {
            return Err(AnalysisError::InvalidData("record has an empty ticker".to_string()));
        }
        for (name, value) in self.numeric_fields() {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(AnalysisError::InvalidData(format!(
                        "{}: field '{}' is not a finite number ({})",
                        self.ticker, name, v
                    )));
                }
            }
        }
        Ok(())
    }

    /// Share of populated numeric inputs, between 0.0 and 1.0.
    pub fn data_quality_score(&self) -> f64 {
        let fields = self.numeric_fields();
        let present = fields
            .iter()
            .filter(|(_, v)| v.map(f64::is_finite).unwrap_or(false))
            .count();
        present as f64 / fields.len() as f64
    }

    /// Sector, ignoring the "N/A" placeholder some collectors emit.
    pub fn known_sector(&self) -> Option<&str> {
        known_sector(self.sector.as_deref())
    }
}

fn known_sector(sector: Option<&str>) -> Option<&str> {
    sector
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("n/a"))
}

/// Strip the exchange suffix (".SA") and uppercase a ticker symbol.
pub fn normalize_ticker(ticker: &str) -> String {
    let upper = ticker.trim().to_uppercase();
    upper
        .strip_suffix(".SA")
        .map(str::to_string)
        .unwrap_or(upper)
}

/// Derived valuation metrics for one company.
///
/// `None` is the "undefined" sentinel: a denominator was non-positive or an
/// input was missing. Only `combined_score` is always defined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    #[serde(serialize_with = "finite_opt")]
    pub wacc: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub wacc_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub roce: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub roce_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub capital_employed: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub eva_abs: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub eva_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub efv_abs: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub efv_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub wealth_current: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub wealth_future: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub upside_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub profitability_pct: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub liquidity_ratio: Option<f64>,
    #[serde(serialize_with = "finite")]
    pub combined_score: f64,
}

impl MetricsResult {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Wacc => self.wacc_pct,
            Metric::Roce => self.roce_pct,
            Metric::CapitalEmployed => self.capital_employed,
            Metric::EvaAbs => self.eva_abs,
            Metric::EvaPct => self.eva_pct,
            Metric::EfvAbs => self.efv_abs,
            Metric::EfvPct => self.efv_pct,
            Metric::WealthCurrent => self.wealth_current,
            Metric::WealthFuture => self.wealth_future,
            Metric::UpsidePct => self.upside_pct,
            Metric::Profitability => self.profitability_pct,
            Metric::Liquidity => self.liquidity_ratio,
            Metric::CombinedScore => Some(self.combined_score),
        }
    }
}

/// A metric column that rankings can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Wacc,
    Roce,
    CapitalEmployed,
    EvaAbs,
    EvaPct,
    EfvAbs,
    EfvPct,
    WealthCurrent,
    WealthFuture,
    UpsidePct,
    Profitability,
    Liquidity,
    CombinedScore,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::Wacc,
        Metric::Roce,
        Metric::CapitalEmployed,
        Metric::EvaAbs,
        Metric::EvaPct,
        Metric::EfvAbs,
        Metric::EfvPct,
        Metric::WealthCurrent,
        Metric::WealthFuture,
        Metric::UpsidePct,
        Metric::Profitability,
        Metric::Liquidity,
        Metric::CombinedScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Wacc => "wacc_pct",
            Metric::Roce => "roce_pct",
            Metric::CapitalEmployed => "capital_employed",
            Metric::EvaAbs => "eva_abs",
            Metric::EvaPct => "eva_pct",
            Metric::EfvAbs => "efv_abs",
            Metric::EfvPct => "efv_pct",
            Metric::WealthCurrent => "wealth_current",
            Metric::WealthFuture => "wealth_future",
            Metric::UpsidePct => "upside_pct",
            Metric::Profitability => "profitability_pct",
            Metric::Liquidity => "liquidity_ratio",
            Metric::CombinedScore => "combined_score",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let metric = match key.as_str() {
            "wacc" | "wacc_pct" => Metric::Wacc,
            "roce" | "roce_pct" => Metric::Roce,
            "capital_employed" => Metric::CapitalEmployed,
            "eva_abs" => Metric::EvaAbs,
            "eva" | "eva_pct" => Metric::EvaPct,
            "efv_abs" => Metric::EfvAbs,
            "efv" | "efv_pct" => Metric::EfvPct,
            "wealth_current" => Metric::WealthCurrent,
            "wealth_future" => Metric::WealthFuture,
            "upside" | "upside_pct" => Metric::UpsidePct,
            "profitability" | "profitability_pct" => Metric::Profitability,
            "liquidity" | "liquidity_ratio" => Metric::Liquidity,
            "combined_score" | "score" => Metric::CombinedScore,
            _ => {
                return Err(AnalysisError::InvalidData(format!("unknown metric '{}'", s)));
            }
        };
        Ok(metric)
    }
}

/// One company's identity plus its computed metrics: a row of the full report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyMetrics {
    pub ticker: String,
    pub company_name: String,
    pub sector: Option<String>,
    #[serde(serialize_with = "finite_opt")]
    pub market_cap: Option<f64>,
    #[serde(serialize_with = "finite_opt")]
    pub stock_price: Option<f64>,
    #[serde(serialize_with = "finite")]
    pub data_quality_score: f64,
    #[serde(flatten)]
    pub metrics: MetricsResult,
}

impl CompanyMetrics {
    pub fn from_record(record: &CompanyFinancialRecord, metrics: MetricsResult) -> Self {
        Self {
            ticker: record.ticker.clone(),
            company_name: record.company_name.clone(),
            sector: record.known_sector().map(str::to_string),
            market_cap: record.market_cap,
            stock_price: record.stock_price,
            data_quality_score: record.data_quality_score(),
            metrics,
        }
    }

    pub fn known_sector(&self) -> Option<&str> {
        known_sector(self.sector.as_deref())
    }
}

/// A company dropped from a batch because its metrics could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedCompany {
    pub ticker: String,
    pub reason: String,
}
