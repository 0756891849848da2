//! Opportunity Analyzer Module
//!
//! Buckets companies by value creation, growth potential and upside, and
//! groups them into k-means clusters over their valuation metrics.

pub mod analyzer;
pub mod kmeans;
pub mod models;

pub use analyzer::OpportunityAnalyzer;
pub use kmeans::{Clustering, KMeans};
pub use models::{BestOpportunity, ClusterSummary, OpportunityEntry, OpportunityReport};
