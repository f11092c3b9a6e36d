//! Domain types and models

pub mod credentials;
pub mod document;
pub mod job;
pub mod mapping;

pub use credentials::{
    SourceCredentials, SourceToken, TargetCredentials, TargetSession, TargetTokens,
};
pub use document::{DocumentKind, PartyKind, SourceDocument, TransactionType};
pub use job::{DocumentError, Job, JobResult, JobStatus, JobType, NewJob, SyncResults};
pub use mapping::{CompanySettings, CreatedRecord, MappingRecord, PartyMapping, VatRateMapping};
