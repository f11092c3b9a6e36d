//! Sync engine: ports, document mapping, counterparty resolution and the
//! job executor.

pub mod counterparty;
pub mod executor;
pub mod mapper;
pub mod ports;

pub use counterparty::CounterpartyResolver;
pub use executor::{DocumentOutcome, SyncExecutor, SyncPorts};
pub use mapper::{
    validate_document, BillPayload, DocumentMapper, InvoicePayload, MappedDocument, SkipReason,
    TaxMode,
};
