//! Port interfaces for sync operations

use async_trait::async_trait;
use chrono::NaiveDate;
use ledgersync_domain::{
    CompanySettings, CreatedRecord, DocumentKind, Job, MappingRecord, NewJob, PartyKind,
    PartyMapping, Result, SourceCredentials, SourceDocument, SourceToken, SyncResults,
    TargetCredentials, TargetSession, TargetTokens, TransactionType, VatRateMapping,
};

use super::mapper::{BillPayload, InvoicePayload};

/// Durable job state.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new pending job
    async fn create_job(&self, job: &NewJob) -> Result<Job>;

    async fn get_job(&self, job_id: i64) -> Result<Option<Job>>;

    /// Atomically move a pending job to running. Returns false when the job
    /// was not pending, leaving the row untouched.
    async fn claim_job(&self, job_id: i64, started_at: i64) -> Result<bool>;

    /// Mark a running job completed with its results
    async fn complete_job(&self, job_id: i64, results: &SyncResults, completed_at: i64)
        -> Result<()>;

    /// Mark a running job failed with a message
    async fn fail_job(&self, job_id: i64, message: &str, completed_at: i64) -> Result<()>;

    /// Pending jobs, oldest first
    async fn list_pending(&self, limit: usize) -> Result<Vec<Job>>;

    /// Force-fail running jobs that started before `started_before`.
    /// Returns the ids that were failed.
    async fn fail_stale_running(
        &self,
        started_before: i64,
        message: &str,
        now: i64,
    ) -> Result<Vec<i64>>;
}

/// Encrypted per-company credentials. Implementations hand out decrypted
/// copies and only persist refreshed tokens through `save_target_tokens`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn source_credentials(&self, company_id: i64) -> Result<Option<SourceCredentials>>;

    async fn target_credentials(&self, company_id: i64) -> Result<Option<TargetCredentials>>;

    async fn save_target_tokens(&self, company_id: i64, tokens: &TargetTokens) -> Result<()>;
}

/// Idempotency ledger.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn find(
        &self,
        company_id: i64,
        source_key: &str,
        transaction_type: TransactionType,
    ) -> Result<Option<MappingRecord>>;

    /// Insert or update on (company_id, source_key, transaction_type)
    async fn upsert(&self, record: &MappingRecord) -> Result<()>;

    /// Returns true when a row was removed
    async fn delete(
        &self,
        company_id: i64,
        source_key: &str,
        transaction_type: TransactionType,
    ) -> Result<bool>;

    /// All mappings for a company, optionally narrowed to one transaction type
    async fn list_for_company(
        &self,
        company_id: i64,
        transaction_type: Option<TransactionType>,
    ) -> Result<Vec<MappingRecord>>;
}

/// Customer/vendor id cache.
#[async_trait]
pub trait PartyMappingStore: Send + Sync {
    async fn find(
        &self,
        company_id: i64,
        party_kind: PartyKind,
        counterparty_name: &str,
    ) -> Result<Option<PartyMapping>>;

    async fn upsert(&self, mapping: &PartyMapping) -> Result<()>;

    async fn delete(
        &self,
        company_id: i64,
        party_kind: PartyKind,
        counterparty_name: &str,
    ) -> Result<()>;
}

/// Read-only per-company target ledger options.
#[async_trait]
pub trait CompanySettingsRepository: Send + Sync {
    /// Settings for the company, or defaults when none are stored
    async fn company_settings(&self, company_id: i64) -> Result<CompanySettings>;

    async fn vat_rate_mappings(&self, company_id: i64) -> Result<Vec<VatRateMapping>>;
}

/// POS/e-invoicing platform.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Password grant; the returned token is scoped to one job
    async fn authenticate(&self, credentials: &SourceCredentials) -> Result<SourceToken>;

    /// Documents of `kind` dated within `[from, to]`. Never partial: any
    /// failure is an error.
    async fn fetch_documents(
        &self,
        token: &SourceToken,
        tenant_id: &str,
        kind: DocumentKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SourceDocument>>;

    /// Full detail for one document, used when the list response lacks the
    /// PDF.
    async fn fetch_document_detail(
        &self,
        token: &SourceToken,
        tenant_id: &str,
        kind: DocumentKind,
        external_id: &str,
    ) -> Result<SourceDocument>;
}

/// Record families addressable on the target ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetEntity {
    Invoice,
    Bill,
    Customer,
    Vendor,
}

impl TargetEntity {
    /// Entity name as used in target ledger paths and queries.
    pub fn entity_name(self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::Bill => "Bill",
            Self::Customer => "Customer",
            Self::Vendor => "Vendor",
        }
    }
}

impl From<TransactionType> for TargetEntity {
    fn from(value: TransactionType) -> Self {
        match value {
            TransactionType::Invoice => Self::Invoice,
            TransactionType::Bill => Self::Bill,
        }
    }
}

impl From<PartyKind> for TargetEntity {
    fn from(value: PartyKind) -> Self {
        match value {
            PartyKind::Customer => Self::Customer,
            PartyKind::Vendor => Self::Vendor,
        }
    }
}

/// Accounting platform. A 401 on any call except `refresh_tokens` must
/// surface as `SyncError::Authentication`.
#[async_trait]
pub trait TargetClient: Send + Sync {
    async fn refresh_tokens(&self, credentials: &TargetCredentials) -> Result<TargetTokens>;

    async fn create_invoice(
        &self,
        session: &TargetSession,
        payload: &InvoicePayload,
    ) -> Result<CreatedRecord>;

    async fn create_bill(&self, session: &TargetSession, payload: &BillPayload)
        -> Result<CreatedRecord>;

    /// Create a customer or vendor and return its id
    async fn create_party(
        &self,
        session: &TargetSession,
        kind: PartyKind,
        name: &str,
        tax_id: Option<&str>,
    ) -> Result<String>;

    async fn find_party_by_tax_id(
        &self,
        session: &TargetSession,
        kind: PartyKind,
        tax_id: &str,
    ) -> Result<Option<String>>;

    async fn find_party_by_name(
        &self,
        session: &TargetSession,
        kind: PartyKind,
        name: &str,
    ) -> Result<Option<String>>;

    /// Live existence check by id
    async fn record_exists(
        &self,
        session: &TargetSession,
        entity: TargetEntity,
        id: &str,
    ) -> Result<bool>;

    /// Attach a PDF to a created invoice or bill
    async fn upload_attachment(
        &self,
        session: &TargetSession,
        transaction_type: TransactionType,
        record_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<()>;
}
