//! # LedgerSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLCipher repositories for jobs, credentials, mappings and settings
//! - The credential cipher
//! - HTTP clients for the source and target ledgers
//! - The config loader
//! - The polling job worker and the stale-job reaper
//!
//! ## Architecture
//! - Implements traits defined in `ledgersync-core`
//! - Contains all "impure" code (I/O, network, clocks)

pub mod config;
pub mod crypto;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod scheduling;
pub mod worker;

// Re-export commonly used items
pub use crypto::CredentialCipher;
pub use database::*;
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::{HttpSourceClient, HttpTargetClient};
pub use scheduling::{JobReaper, JobReaperConfig, SchedulerError, SchedulerResult};
pub use worker::{JobWorker, JobWorkerConfig, WorkerError};
