use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Risk profile used to split weight between the top names and the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationProfile {
    /// Top 5 take 70%, the rest share 30%
    Conservative,
    /// Weight proportional to score
    #[default]
    Moderate,
    /// Top 3 take 80%, the rest share 20%
    Aggressive,
}

impl AllocationProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationProfile::Conservative => "conservative",
            AllocationProfile::Moderate => "moderate",
            AllocationProfile::Aggressive => "aggressive",
        }
    }

    /// `(top_n, share of the top bucket)`, or `None` for a flat split.
    pub fn buckets(&self) -> Option<(usize, f64)> {
        match self {
            AllocationProfile::Conservative => Some((5, 0.7)),
            AllocationProfile::Moderate => None,
            AllocationProfile::Aggressive => Some((3, 0.8)),
        }
    }

    /// Parse a profile name, falling back to [`AllocationProfile::Moderate`]
    /// with a warning when it is not recognized.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|e| {
            tracing::warn!("{}; using moderate profile", e);
            AllocationProfile::Moderate
        })
    }
}

impl fmt::Display for AllocationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationProfile {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" | "conservador" => Ok(AllocationProfile::Conservative),
            "moderate" | "moderado" => Ok(AllocationProfile::Moderate),
            "aggressive" | "agressivo" => Ok(AllocationProfile::Aggressive),
            other => Err(AnalysisError::InvalidData(format!("unknown allocation profile '{}'", other))),
        }
    }
}
