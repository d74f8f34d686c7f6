//! # Withholding Reconciliation
//!
//! A reconciliation library that pairs a tax-authority export of withholdings
//! with an internal accounting export and reports what does not line up.
//!
//! ## Features
//!
//! - **Normalization**: counterparty tax IDs and locale-formatted amounts from arbitrary columns
//! - **Automatic matching**: deterministic one-to-one pairing on identifier and amount to the cent
//! - **Manual reconciliation**: many-to-many matches with live totals, and reversal
//! - **Discrepancy analysis**: per-provider gross totals, filtered and ranked by difference
//! - **Storage abstraction**: database-agnostic design with trait-based session storage
//!
//! ## Quick Start
//!
//! ```rust
//! use withholding_recon::{auto_match_session, ColumnMapping, RawRecord, Session};
//!
//! let mapping = ColumnMapping::new("CUIT", "Monto", "CUIT", "Credito");
//! let mut session = Session::import(
//!     "March",
//!     mapping,
//!     vec![RawRecord::new().with("CUIT", "20-12345678-9").with("Monto", "1.500,00")],
//!     vec![RawRecord::new().with("CUIT", "20123456789").with("Credito", 1500.0)],
//! )
//! .unwrap();
//!
//! let matches = auto_match_session(&mut session);
//! assert_eq!(matches.len(), 1);
//! ```

pub mod config;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
