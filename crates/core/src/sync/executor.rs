//! Sync executor: drives one job from pending to completed or failed.
//!
//! Job-level failures (missing credentials, rejected tokens, upstream errors
//! before the document loop) fail the job. Inside the loop each document
//! yields its own outcome and one failure never stops the batch, with the
//! exception of authentication errors, which invalidate every remaining call.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ledgersync_domain::constants::{
    DEFAULT_CUSTOMER_NAME, DEFAULT_VENDOR_NAME, TOKEN_REFRESH_WINDOW_SECS,
};
use ledgersync_domain::{
    CreatedRecord, DocumentKind, Job, JobResult, MappingRecord, SourceDocument, SourceToken,
    SyncError, SyncResults, TargetCredentials, TargetSession, TransactionType, VatRateMapping,
    Result,
};
use tracing::{debug, error, info, instrument, warn};

use super::counterparty::CounterpartyResolver;
use super::mapper::{validate_document, DocumentMapper, SkipReason, TaxMode};
use super::ports::{
    CompanySettingsRepository, CredentialStore, JobRepository, MappingStore, PartyMappingStore,
    SourceClient, TargetClient,
};
use crate::clock::{Clock, SystemClock};

/// Everything the executor talks to.
#[derive(Clone)]
pub struct SyncPorts {
    /// Job rows and their state transitions.
    pub jobs: Arc<dyn JobRepository>,
    /// Per-company secrets for both ledgers.
    pub credentials: Arc<dyn CredentialStore>,
    /// Idempotency ledger.
    pub mappings: Arc<dyn MappingStore>,
    /// Customer/vendor id cache.
    pub parties: Arc<dyn PartyMappingStore>,
    pub settings: Arc<dyn CompanySettingsRepository>,
    pub source: Arc<dyn SourceClient>,
    pub target: Arc<dyn TargetClient>,
}

/// Result of processing one source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// A target record was created.
    Created {
        transaction_type: TransactionType,
        attachment_uploaded: bool,
        degraded_date: bool,
        /// Set when the mapping write failed after the create succeeded.
        unrecorded: Option<String>,
    },
    /// Mapping exists and the target record is still live.
    AlreadySynced,
    /// Failed validation; nothing was sent to the target.
    Invalid(SkipReason),
}

/// Per-job values threaded through the document loop.
struct JobContext<'a> {
    company_id: i64,
    tenant_id: &'a str,
    source_token: &'a SourceToken,
    session: &'a TargetSession,
    mapper: &'a DocumentMapper,
    vat_mappings: &'a [VatRateMapping],
}

/// Drives one sync job from `pending` to a terminal state.
pub struct SyncExecutor {
    ports: SyncPorts,
    counterparties: CounterpartyResolver,
    clock: Arc<dyn Clock>,
}

impl SyncExecutor {
    /// Executor on the system clock.
    pub fn new(ports: SyncPorts) -> Self {
        let counterparties =
            CounterpartyResolver::new(Arc::clone(&ports.parties), Arc::clone(&ports.target));
        Self { ports, counterparties, clock: Arc::new(SystemClock) }
    }

    /// Replace the wall clock (tests pin time with this).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run a pending job to a terminal state.
    ///
    /// Returns `NotFound` for an unknown id and `InvalidState` when the job
    /// could not be claimed; neither touches the job row. Every other outcome
    /// is persisted on the job and reported through the returned
    /// [`JobResult`].
    #[instrument(skip(self))]
    pub async fn execute_job(&self, job_id: i64) -> Result<JobResult> {
        let job = self
            .ports
            .jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("job {job_id} does not exist")))?;

        if !self.ports.jobs.claim_job(job_id, self.clock.timestamp()).await? {
            return Err(SyncError::InvalidState(format!(
                "job {job_id} cannot be claimed (status {})",
                job.status
            )));
        }

        info!(
            job_id,
            company_id = job.company_id,
            job_type = %job.job_type,
            from = %job.from_date,
            to = %job.to_date,
            "sync job started"
        );

        match self.run_claimed(&job).await {
            Ok(results) => {
                self.ports.jobs.complete_job(job_id, &results, self.clock.timestamp()).await?;
                info!(
                    job_id,
                    total = results.total,
                    created = results.created(),
                    skipped = results.skipped,
                    errors = results.errors,
                    "sync job completed"
                );
                Ok(JobResult::completed(job_id, results))
            }
            Err(err) => {
                let message = err.to_string();
                error!(job_id, company_id = job.company_id, error = %message, "sync job failed");
                self.ports.jobs.fail_job(job_id, &message, self.clock.timestamp()).await?;
                Ok(JobResult::failed(job_id, message))
            }
        }
    }

    /// Refresh target tokens that expire within the guard window, persist
    /// them, and return the credentials to use from here on.
    pub async fn ensure_fresh_tokens(
        &self,
        company_id: i64,
        credentials: TargetCredentials,
    ) -> Result<TargetCredentials> {
        if !credentials.expires_within(TOKEN_REFRESH_WINDOW_SECS, self.clock.timestamp()) {
            return Ok(credentials);
        }

        info!(company_id, "target access token near expiry; refreshing");
        let tokens = self.ports.target.refresh_tokens(&credentials).await.map_err(|err| match err {
            SyncError::Authentication(message) => SyncError::Authentication(message),
            other => SyncError::Authentication(format!("token refresh failed: {other}")),
        })?;

        self.ports.credentials.save_target_tokens(company_id, &tokens).await?;
        Ok(credentials.with_tokens(&tokens))
    }

    async fn run_claimed(&self, job: &Job) -> Result<SyncResults> {
        let company_id = job.company_id;

        let source_credentials =
            self.ports.credentials.source_credentials(company_id).await?.ok_or_else(|| {
                SyncError::Configuration(format!(
                    "source credentials are not configured for company {company_id}"
                ))
            })?;
        let target_credentials =
            self.ports.credentials.target_credentials(company_id).await?.ok_or_else(|| {
                SyncError::Configuration(format!(
                    "target credentials are not configured for company {company_id}"
                ))
            })?;

        let target_credentials = self.ensure_fresh_tokens(company_id, target_credentials).await?;
        let session = target_credentials.session();

        let source_token = self.ports.source.authenticate(&source_credentials).await?;

        let settings = self.ports.settings.company_settings(company_id).await?;
        let vat_mappings = if settings.tracks_vat {
            self.ports.settings.vat_rate_mappings(company_id).await?
        } else {
            Vec::new()
        };
        let mapper = DocumentMapper::new(settings, self.clock.today());

        let mut documents = Vec::new();
        for kind in job.job_type.document_kinds() {
            let fetched = self
                .ports
                .source
                .fetch_documents(
                    &source_token,
                    &source_credentials.tenant_id,
                    *kind,
                    job.from_date,
                    job.to_date,
                )
                .await?;
            debug!(job_id = job.id, kind = %kind, count = fetched.len(), "fetched source documents");
            documents.extend(fetched);
        }

        let ctx = JobContext {
            company_id,
            tenant_id: &source_credentials.tenant_id,
            source_token: &source_token,
            session: &session,
            mapper: &mapper,
            vat_mappings: &vat_mappings,
        };

        let mut results = SyncResults {
            total: u32::try_from(documents.len()).unwrap_or(u32::MAX),
            ..SyncResults::default()
        };

        for doc in &documents {
            match self.sync_document(&ctx, doc).await {
                Ok(DocumentOutcome::Created {
                    transaction_type,
                    attachment_uploaded,
                    degraded_date,
                    unrecorded,
                }) => {
                    results.record_created(transaction_type);
                    if let Some(message) = unrecorded {
                        results.record_unrecorded(doc.display_id(), message);
                    }
                    if attachment_uploaded {
                        results.attachments_uploaded += 1;
                    }
                    if degraded_date {
                        results.degraded_dates += 1;
                    }
                }
                Ok(DocumentOutcome::AlreadySynced) => {
                    debug!(document_id = %doc.display_id(), "document already synced");
                    results.record_skipped();
                }
                Ok(DocumentOutcome::Invalid(reason)) => {
                    debug!(document_id = %doc.display_id(), %reason, "skipping invalid document");
                    results.record_skipped();
                }
                Err(err) if err.is_authentication() => return Err(err),
                Err(err) => {
                    warn!(
                        job_id = job.id,
                        document_id = %doc.display_id(),
                        error = %err,
                        "document sync failed"
                    );
                    results.record_error(doc.display_id(), err.to_string());
                }
            }
        }

        Ok(results)
    }

    async fn sync_document(
        &self,
        ctx: &JobContext<'_>,
        doc: &SourceDocument,
    ) -> Result<DocumentOutcome> {
        if let Some(reason) = validate_document(doc) {
            return Ok(DocumentOutcome::Invalid(reason));
        }

        let transaction_type = doc.kind.transaction_type();
        let source_key = doc.source_key().ok_or_else(|| {
            SyncError::Validation("document has neither an external id nor a number".into())
        })?;

        if let Some(existing) =
            self.ports.mappings.find(ctx.company_id, &source_key, transaction_type).await?
        {
            if self
                .ports
                .target
                .record_exists(ctx.session, transaction_type.into(), &existing.target_id)
                .await?
            {
                return Ok(DocumentOutcome::AlreadySynced);
            }

            warn!(
                company_id = ctx.company_id,
                source_key = %source_key,
                target_id = %existing.target_id,
                "mapped target record no longer exists; recreating"
            );
            self.ports.mappings.delete(ctx.company_id, &source_key, transaction_type).await?;
        }

        let counterparty_name = doc.counterparty_name().unwrap_or(match doc.kind {
            DocumentKind::Sales => DEFAULT_CUSTOMER_NAME,
            DocumentKind::Purchase => DEFAULT_VENDOR_NAME,
        });
        let party_id = self
            .counterparties
            .resolve(
                ctx.company_id,
                ctx.session,
                doc.kind.party_kind(),
                counterparty_name,
                doc.counterparty_tax_id(),
            )
            .await?;

        let (created, amount, degraded_date): (CreatedRecord, f64, bool) = match doc.kind {
            DocumentKind::Sales => {
                let tax_mode = TaxMode::for_company(ctx.mapper.settings(), ctx.vat_mappings);
                let mapped = ctx.mapper.map_to_target_invoice(doc, &party_id, tax_mode);
                let created = self.ports.target.create_invoice(ctx.session, &mapped.payload).await?;
                (created, mapped.amount, mapped.degraded_date)
            }
            DocumentKind::Purchase => {
                let mapped = ctx.mapper.map_to_target_bill(doc, &party_id);
                let created = self.ports.target.create_bill(ctx.session, &mapped.payload).await?;
                (created, mapped.amount, mapped.degraded_date)
            }
        };

        let now = self.clock.timestamp();
        let record = MappingRecord {
            company_id: ctx.company_id,
            source_key,
            transaction_type,
            target_id: created.id.clone(),
            target_doc_number: created.doc_number.clone(),
            amount,
            counterparty_name: Some(counterparty_name.to_string()),
            synced_at: now,
            last_synced_at: now,
        };

        // The target record exists from here on, so a ledger write failure
        // must not turn the document into a retryable failure.
        let unrecorded = match self.ports.mappings.upsert(&record).await {
            Ok(()) => {
                info!(
                    company_id = ctx.company_id,
                    document_id = %doc.display_id(),
                    target_id = %created.id,
                    %transaction_type,
                    "document synced"
                );
                None
            }
            Err(err) => {
                error!(
                    company_id = ctx.company_id,
                    document_id = %doc.display_id(),
                    source_key = %record.source_key,
                    target_id = %created.id,
                    %transaction_type,
                    error = %err,
                    "target record created but mapping was not recorded; reconcile manually"
                );
                Some(format!(
                    "created {transaction_type} {} in target ledger but failed to record mapping: {err}",
                    created.id
                ))
            }
        };

        let attachment_uploaded =
            self.attach_pdf(ctx, doc, transaction_type, &created.id).await;

        Ok(DocumentOutcome::Created {
            transaction_type,
            attachment_uploaded,
            degraded_date,
            unrecorded,
        })
    }

    /// Best effort. Failures are logged and never fail the document.
    async fn attach_pdf(
        &self,
        ctx: &JobContext<'_>,
        doc: &SourceDocument,
        transaction_type: TransactionType,
        record_id: &str,
    ) -> bool {
        match self.upload_pdf(ctx, doc, transaction_type, record_id).await {
            Ok(uploaded) => uploaded,
            Err(err) => {
                warn!(
                    document_id = %doc.display_id(),
                    target_id = record_id,
                    error = %err,
                    "attachment upload failed"
                );
                false
            }
        }
    }

    async fn upload_pdf(
        &self,
        ctx: &JobContext<'_>,
        doc: &SourceDocument,
        transaction_type: TransactionType,
        record_id: &str,
    ) -> Result<bool> {
        let encoded = match doc.pdf_base64() {
            Some(pdf) => pdf.to_string(),
            None => {
                let Some(external_id) = doc.external_id() else {
                    return Ok(false);
                };
                let detail = self
                    .ports
                    .source
                    .fetch_document_detail(ctx.source_token, ctx.tenant_id, doc.kind, &external_id)
                    .await?;
                match detail.pdf_base64() {
                    Some(pdf) => pdf.to_string(),
                    None => return Ok(false),
                }
            }
        };

        let content = BASE64
            .decode(encoded.as_bytes())
            .map_err(|err| SyncError::Validation(format!("document PDF is not valid base64: {err}")))?;

        let file_name = format!("{}.pdf", file_stem(&doc.display_id()));
        self.ports
            .target
            .upload_attachment(ctx.session, transaction_type, record_id, &file_name, content)
            .await?;
        Ok(true)
    }
}

fn file_stem(id: &str) -> String {
    id.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' }).collect()
}
