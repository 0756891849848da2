//! Company Ranking Module
//!
//! Sorts companies by composite score or any single metric, and scores them
//! against user-supplied criteria with batch-relative min-max scaling.

pub mod criteria;
pub mod ranker;

pub use criteria::{RankingCriteria, RawCriteriaMetrics, ScaledCriteriaMetrics, ScoredCompany};
pub use ranker::{CompanyRanker, RankingReport};
