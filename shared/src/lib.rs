//! Shared types and models for the Stockroom platform
//!
//! This crate contains the domain model of the stock ledger: items, batches,
//! movements, orders, returns and transfers, plus the pure quantity and
//! status logic the backend services drive.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
