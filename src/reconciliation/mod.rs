//! Reconciliation engine for withholding ledgers
//!
//! Normalization, automatic and manual matching, discrepancy aggregation,
//! and the session orchestrator that drives them against a storage backend.

pub mod auto_match;
pub mod discrepancy;
pub mod manual;
pub mod normalizer;
pub mod reconciler;
pub mod report;

pub use auto_match::*;
pub use discrepancy::*;
pub use manual::*;
pub use normalizer::*;
pub use reconciler::*;
pub use report::*;
