//! Mock repository implementations for testing
//!
//! In-memory versions of every storage port the executor depends on.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ledgersync_core::{
    CompanySettingsRepository, CredentialStore, JobRepository, MappingStore, PartyMappingStore,
};
use ledgersync_domain::{
    CompanySettings, Job, JobStatus, MappingRecord, NewJob, PartyKind, PartyMapping,
    Result as DomainResult, SourceCredentials, SyncError, SyncResults, TargetCredentials, TargetTokens,
    TransactionType, VatRateMapping,
};

/// In-memory mock for `JobRepository`.
#[derive(Default, Clone)]
pub struct MockJobRepository {
    jobs: Arc<Mutex<Vec<Job>>>,
}

impl MockJobRepository {
    pub fn job(&self, job_id: i64) -> Job {
        self.jobs.lock().unwrap().iter().find(|j| j.id == job_id).cloned().unwrap()
    }
}

#[async_trait]
impl JobRepository for MockJobRepository {
    async fn create_job(&self, job: &NewJob) -> DomainResult<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let created = Job {
            id: jobs.len() as i64 + 1,
            company_id: job.company_id,
            job_type: job.job_type,
            from_date: job.from_date,
            to_date: job.to_date,
            status: JobStatus::Pending,
            started_at: None,
            completed_at: None,
            error_message: None,
            results: None,
            created_at: 0,
        };
        jobs.push(created.clone());
        Ok(created)
    }

    async fn get_job(&self, job_id: i64) -> DomainResult<Option<Job>> {
        Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == job_id).cloned())
    }

    async fn claim_job(&self, job_id: i64, started_at: i64) -> DomainResult<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.iter_mut().find(|j| j.id == job_id && j.status == JobStatus::Pending) {
            Some(job) => {
                job.status = JobStatus::Running;
                job.started_at = Some(started_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete_job(
        &self,
        job_id: i64,
        results: &SyncResults,
        completed_at: i64,
    ) -> DomainResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id && j.status == JobStatus::Running)
        {
            job.status = JobStatus::Completed;
            job.results = Some(results.clone());
            job.completed_at = Some(completed_at);
        }
        Ok(())
    }

    async fn fail_job(&self, job_id: i64, message: &str, completed_at: i64) -> DomainResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id && j.status == JobStatus::Running)
        {
            job.status = JobStatus::Failed;
            job.error_message = Some(message.to_string());
            job.completed_at = Some(completed_at);
        }
        Ok(())
    }

    async fn list_pending(&self, limit: usize) -> DomainResult<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fail_stale_running(
        &self,
        started_before: i64,
        message: &str,
        now: i64,
    ) -> DomainResult<Vec<i64>> {
        let mut failed = Vec::new();
        for job in self.jobs.lock().unwrap().iter_mut() {
            if job.status == JobStatus::Running && job.started_at.unwrap_or(0) < started_before {
                job.status = JobStatus::Failed;
                job.error_message = Some(message.to_string());
                job.completed_at = Some(now);
                failed.push(job.id);
            }
        }
        Ok(failed)
    }
}

/// In-memory mock for `CredentialStore`.
#[derive(Default, Clone)]
pub struct MockCredentialStore {
    source: Arc<Mutex<HashMap<i64, SourceCredentials>>>,
    target: Arc<Mutex<HashMap<i64, TargetCredentials>>>,
}

impl MockCredentialStore {
    pub fn set_source(&self, company_id: i64, credentials: SourceCredentials) {
        self.source.lock().unwrap().insert(company_id, credentials);
    }

    pub fn set_target(&self, company_id: i64, credentials: TargetCredentials) {
        self.target.lock().unwrap().insert(company_id, credentials);
    }

    pub fn target(&self, company_id: i64) -> Option<TargetCredentials> {
        self.target.lock().unwrap().get(&company_id).cloned()
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn source_credentials(&self, company_id: i64) -> DomainResult<Option<SourceCredentials>> {
        Ok(self.source.lock().unwrap().get(&company_id).cloned())
    }

    async fn target_credentials(&self, company_id: i64) -> DomainResult<Option<TargetCredentials>> {
        Ok(self.target(company_id))
    }

    async fn save_target_tokens(&self, company_id: i64, tokens: &TargetTokens) -> DomainResult<()> {
        let mut target = self.target.lock().unwrap();
        if let Some(existing) = target.get(&company_id).cloned() {
            target.insert(company_id, existing.with_tokens(tokens));
        }
        Ok(())
    }
}

/// In-memory mock for `MappingStore`, keyed like the unique constraint.
#[derive(Default, Clone)]
pub struct MockMappingStore {
    rows: Arc<Mutex<HashMap<(i64, String, TransactionType), MappingRecord>>>,
    failing_keys: Arc<Mutex<HashSet<String>>>,
}

impl MockMappingStore {
    /// Make `upsert` fail with a database error for `source_key`.
    pub fn fail_upsert_for(&self, source_key: &str) {
        self.failing_keys.lock().unwrap().insert(source_key.to_string());
    }

    pub fn count_for(&self, company_id: i64) -> usize {
        self.rows.lock().unwrap().keys().filter(|(c, _, _)| *c == company_id).count()
    }

    pub fn get(&self, company_id: i64, key: &str, tx: TransactionType) -> Option<MappingRecord> {
        self.rows.lock().unwrap().get(&(company_id, key.to_string(), tx)).cloned()
    }
}

#[async_trait]
impl MappingStore for MockMappingStore {
    async fn find(
        &self,
        company_id: i64,
        source_key: &str,
        transaction_type: TransactionType,
    ) -> DomainResult<Option<MappingRecord>> {
        Ok(self.get(company_id, source_key, transaction_type))
    }

    async fn upsert(&self, record: &MappingRecord) -> DomainResult<()> {
        if self.failing_keys.lock().unwrap().contains(&record.source_key) {
            return Err(SyncError::Database("disk I/O error".into()));
        }
        let key = (record.company_id, record.source_key.clone(), record.transaction_type);
        let mut rows = self.rows.lock().unwrap();
        let synced_at = rows.get(&key).map_or(record.synced_at, |existing| existing.synced_at);
        rows.insert(key, MappingRecord { synced_at, ..record.clone() });
        Ok(())
    }

    async fn delete(
        &self,
        company_id: i64,
        source_key: &str,
        transaction_type: TransactionType,
    ) -> DomainResult<bool> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .remove(&(company_id, source_key.to_string(), transaction_type))
            .is_some())
    }

    async fn list_for_company(
        &self,
        company_id: i64,
        transaction_type: Option<TransactionType>,
    ) -> DomainResult<Vec<MappingRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.company_id == company_id)
            .filter(|r| transaction_type.map_or(true, |t| r.transaction_type == t))
            .cloned()
            .collect())
    }
}

/// In-memory mock for `PartyMappingStore`.
#[derive(Default, Clone)]
pub struct MockPartyMappingStore {
    rows: Arc<Mutex<HashMap<(i64, PartyKind, String), PartyMapping>>>,
}

impl MockPartyMappingStore {
    pub fn cached_id(&self, company_id: i64, kind: PartyKind, name: &str) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(&(company_id, kind, name.to_string()))
            .map(|m| m.target_party_id.clone())
    }
}

#[async_trait]
impl PartyMappingStore for MockPartyMappingStore {
    async fn find(
        &self,
        company_id: i64,
        party_kind: PartyKind,
        counterparty_name: &str,
    ) -> DomainResult<Option<PartyMapping>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&(company_id, party_kind, counterparty_name.to_string()))
            .cloned())
    }

    async fn upsert(&self, mapping: &PartyMapping) -> DomainResult<()> {
        self.rows.lock().unwrap().insert(
            (mapping.company_id, mapping.party_kind, mapping.counterparty_name.clone()),
            mapping.clone(),
        );
        Ok(())
    }

    async fn delete(
        &self,
        company_id: i64,
        party_kind: PartyKind,
        counterparty_name: &str,
    ) -> DomainResult<()> {
        self.rows.lock().unwrap().remove(&(company_id, party_kind, counterparty_name.to_string()));
        Ok(())
    }
}

/// In-memory mock for `CompanySettingsRepository`.
#[derive(Default, Clone)]
pub struct MockSettingsRepository {
    settings: Arc<Mutex<HashMap<i64, CompanySettings>>>,
    vat: Arc<Mutex<Vec<VatRateMapping>>>,
}

impl MockSettingsRepository {
    pub fn set(&self, settings: CompanySettings) {
        self.settings.lock().unwrap().insert(settings.company_id, settings);
    }

    pub fn add_vat_mapping(&self, mapping: VatRateMapping) {
        self.vat.lock().unwrap().push(mapping);
    }
}

#[async_trait]
impl CompanySettingsRepository for MockSettingsRepository {
    async fn company_settings(&self, company_id: i64) -> DomainResult<CompanySettings> {
        Ok(self
            .settings
            .lock()
            .unwrap()
            .get(&company_id)
            .cloned()
            .unwrap_or_else(|| CompanySettings::defaults_for(company_id)))
    }

    async fn vat_rate_mappings(&self, company_id: i64) -> DomainResult<Vec<VatRateMapping>> {
        Ok(self.vat.lock().unwrap().iter().filter(|m| m.company_id == company_id).cloned().collect())
    }
}
