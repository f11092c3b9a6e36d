//! Scriptable fakes for the two external ledgers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use ledgersync_core::sync::{BillPayload, InvoicePayload};
use ledgersync_core::{SourceClient, TargetClient, TargetEntity};
use ledgersync_domain::{
    CreatedRecord, DocumentKind, PartyKind, Result as DomainResult, SourceCredentials,
    SourceDocument, SourceToken, SyncError, TargetCredentials, TargetSession, TargetTokens,
    TransactionType,
};

/// Source ledger fake serving fixed document lists.
#[derive(Default, Clone)]
pub struct FakeSourceClient {
    documents: Arc<Mutex<HashMap<DocumentKind, Vec<SourceDocument>>>>,
    details: Arc<Mutex<HashMap<String, SourceDocument>>>,
    auth_error: Arc<Mutex<Option<SyncError>>>,
    fetch_error: Arc<Mutex<Option<SyncError>>>,
    fetches: Arc<Mutex<Vec<(DocumentKind, NaiveDate, NaiveDate)>>>,
}

impl FakeSourceClient {
    pub fn set_documents(&self, kind: DocumentKind, docs: Vec<SourceDocument>) {
        self.documents.lock().unwrap().insert(kind, docs);
    }

    pub fn set_detail(&self, external_id: &str, doc: SourceDocument) {
        self.details.lock().unwrap().insert(external_id.to_string(), doc);
    }

    pub fn fail_auth(&self, error: SyncError) {
        *self.auth_error.lock().unwrap() = Some(error);
    }

    pub fn fail_fetch(&self, error: SyncError) {
        *self.fetch_error.lock().unwrap() = Some(error);
    }

    pub fn fetches(&self) -> Vec<(DocumentKind, NaiveDate, NaiveDate)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceClient for FakeSourceClient {
    async fn authenticate(&self, _credentials: &SourceCredentials) -> DomainResult<SourceToken> {
        if let Some(err) = self.auth_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(SourceToken { access_token: "source-token".into() })
    }

    async fn fetch_documents(
        &self,
        _token: &SourceToken,
        _tenant_id: &str,
        kind: DocumentKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DomainResult<Vec<SourceDocument>> {
        self.fetches.lock().unwrap().push((kind, from, to));
        if let Some(err) = self.fetch_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.documents.lock().unwrap().get(&kind).cloned().unwrap_or_default())
    }

    async fn fetch_document_detail(
        &self,
        _token: &SourceToken,
        _tenant_id: &str,
        _kind: DocumentKind,
        external_id: &str,
    ) -> DomainResult<SourceDocument> {
        self.details
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| SyncError::Upstream(format!("HTTP 404: no document {external_id}")))
    }
}

/// Target ledger fake that keeps created records in memory.
#[derive(Default, Clone)]
pub struct FakeTargetClient {
    live: Arc<Mutex<HashSet<(TargetEntity, String)>>>,
    next_id: Arc<AtomicUsize>,
    invoices: Arc<Mutex<Vec<InvoicePayload>>>,
    bills: Arc<Mutex<Vec<BillPayload>>>,
    parties_by_tax_id: Arc<Mutex<HashMap<(PartyKind, String), String>>>,
    parties_by_name: Arc<Mutex<HashMap<(PartyKind, String), String>>>,
    created_parties: Arc<Mutex<Vec<(PartyKind, String)>>>,
    failing_doc_numbers: Arc<Mutex<HashSet<String>>>,
    unauthorized_doc_numbers: Arc<Mutex<HashSet<String>>>,
    refresh_result: Arc<Mutex<Option<DomainResult<TargetTokens>>>>,
    refresh_calls: Arc<AtomicUsize>,
    seen_access_tokens: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<Vec<(TransactionType, String, String, Vec<u8>)>>>,
    fail_uploads: Arc<AtomicBool>,
}

impl FakeTargetClient {
    fn allocate_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 100).to_string()
    }

    fn observe(&self, session: &TargetSession) {
        self.seen_access_tokens.lock().unwrap().push(session.access_token.clone());
    }

    /// Simulate an out-of-band deletion in the target ledger.
    pub fn delete_record(&self, entity: TargetEntity, id: &str) {
        self.live.lock().unwrap().remove(&(entity, id.to_string()));
    }

    pub fn add_party(&self, kind: PartyKind, name: &str, tax_id: Option<&str>, id: &str) {
        let entity = TargetEntity::from(kind);
        self.live.lock().unwrap().insert((entity, id.to_string()));
        self.parties_by_name.lock().unwrap().insert((kind, name.to_string()), id.to_string());
        if let Some(tax_id) = tax_id {
            self.parties_by_tax_id.lock().unwrap().insert((kind, tax_id.to_string()), id.to_string());
        }
    }

    pub fn fail_create_for(&self, doc_number: &str) {
        self.failing_doc_numbers.lock().unwrap().insert(doc_number.to_string());
    }

    pub fn reject_token_for(&self, doc_number: &str) {
        self.unauthorized_doc_numbers.lock().unwrap().insert(doc_number.to_string());
    }

    pub fn set_refresh_result(&self, result: DomainResult<TargetTokens>) {
        *self.refresh_result.lock().unwrap() = Some(result);
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn invoices(&self) -> Vec<InvoicePayload> {
        self.invoices.lock().unwrap().clone()
    }

    pub fn bills(&self) -> Vec<BillPayload> {
        self.bills.lock().unwrap().clone()
    }

    pub fn created_parties(&self) -> Vec<(PartyKind, String)> {
        self.created_parties.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen_access_tokens(&self) -> Vec<String> {
        self.seen_access_tokens.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(TransactionType, String, String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }

    fn check_create(&self, doc_number: Option<&str>) -> DomainResult<()> {
        let Some(number) = doc_number else {
            return Ok(());
        };
        if self.unauthorized_doc_numbers.lock().unwrap().contains(number) {
            return Err(SyncError::Authentication("HTTP 401: token expired".into()));
        }
        if self.failing_doc_numbers.lock().unwrap().contains(number) {
            return Err(SyncError::Upstream(format!("HTTP 400: duplicate document {number}")));
        }
        Ok(())
    }

    fn create(&self, entity: TargetEntity, doc_number: Option<&str>) -> CreatedRecord {
        let id = self.allocate_id();
        self.live.lock().unwrap().insert((entity, id.clone()));
        CreatedRecord { id, doc_number: doc_number.map(str::to_string) }
    }
}

#[async_trait]
impl TargetClient for FakeTargetClient {
    async fn refresh_tokens(&self, _credentials: &TargetCredentials) -> DomainResult<TargetTokens> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(SyncError::Authentication("refresh not scripted".into())))
    }

    async fn create_invoice(
        &self,
        session: &TargetSession,
        payload: &InvoicePayload,
    ) -> DomainResult<CreatedRecord> {
        self.observe(session);
        self.check_create(payload.doc_number.as_deref())?;
        self.invoices.lock().unwrap().push(payload.clone());
        Ok(self.create(TargetEntity::Invoice, payload.doc_number.as_deref()))
    }

    async fn create_bill(
        &self,
        session: &TargetSession,
        payload: &BillPayload,
    ) -> DomainResult<CreatedRecord> {
        self.observe(session);
        self.check_create(payload.doc_number.as_deref())?;
        self.bills.lock().unwrap().push(payload.clone());
        Ok(self.create(TargetEntity::Bill, payload.doc_number.as_deref()))
    }

    async fn create_party(
        &self,
        session: &TargetSession,
        kind: PartyKind,
        name: &str,
        tax_id: Option<&str>,
    ) -> DomainResult<String> {
        self.observe(session);
        let id = self.allocate_id();
        self.add_party(kind, name, tax_id, &id);
        self.created_parties.lock().unwrap().push((kind, name.to_string()));
        Ok(id)
    }

    async fn find_party_by_tax_id(
        &self,
        session: &TargetSession,
        kind: PartyKind,
        tax_id: &str,
    ) -> DomainResult<Option<String>> {
        self.observe(session);
        Ok(self.parties_by_tax_id.lock().unwrap().get(&(kind, tax_id.to_string())).cloned())
    }

    async fn find_party_by_name(
        &self,
        session: &TargetSession,
        kind: PartyKind,
        name: &str,
    ) -> DomainResult<Option<String>> {
        self.observe(session);
        Ok(self.parties_by_name.lock().unwrap().get(&(kind, name.to_string())).cloned())
    }

    async fn record_exists(
        &self,
        session: &TargetSession,
        entity: TargetEntity,
        id: &str,
    ) -> DomainResult<bool> {
        self.observe(session);
        Ok(self.live.lock().unwrap().contains(&(entity, id.to_string())))
    }

    async fn upload_attachment(
        &self,
        session: &TargetSession,
        transaction_type: TransactionType,
        record_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> DomainResult<()> {
        self.observe(session);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(SyncError::Upstream("HTTP 500: upload rejected".into()));
        }
        self.uploads.lock().unwrap().push((
            transaction_type,
            record_id.to_string(),
            file_name.to_string(),
            content,
        ));
        Ok(())
    }
}
