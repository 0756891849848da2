//! Portfolio Allocator Module
//!
//! Turns per-company valuation metrics into normalized portfolio weights
//! under a risk profile, and measures the EVA of a weighted portfolio.

pub mod allocator;
pub mod profile;

pub use allocator::{PortfolioAllocation, PortfolioAllocator, PortfolioEva};
pub use profile::AllocationProfile;
