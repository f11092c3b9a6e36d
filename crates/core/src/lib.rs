//! # LedgerSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for job state, credentials, mappings and both
//!   external ledgers
//! - The document mapper
//! - The sync executor that drives one job to a terminal state
//!
//! ## Architecture Principles
//! - Only depends on `ledgersync-domain`
//! - No database or HTTP code
//! - All external dependencies via traits

pub mod clock;
pub mod sync;

pub use clock::{Clock, SystemClock};
pub use sync::ports::{
    CompanySettingsRepository, CredentialStore, JobRepository, MappingStore, PartyMappingStore,
    SourceClient, TargetClient, TargetEntity,
};
pub use sync::{CounterpartyResolver, DocumentMapper, SyncExecutor, SyncPorts, TaxMode};
