//! # LedgerSync Domain
//!
//! Business domain types for the ledger sync engine.
//!
//! This crate contains:
//! - Jobs, source documents, credentials and mapping records
//! - The domain error type and Result alias
//! - Configuration structures
//! - Field-name chains and target ledger constants
//!
//! ## Architecture
//! - No dependencies on other LedgerSync crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
