//! Shared test helpers for `ledgersync-core` integration tests.
//!
//! The harness wires the executor to in-memory stores and scriptable
//! ledger fakes so scenarios only describe documents and expectations.

#![allow(dead_code)]

pub mod clients;
pub mod repositories;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ledgersync_core::{Clock, SyncExecutor, SyncPorts};
use ledgersync_domain::{
    DocumentKind, JobType, NewJob, SourceCredentials, SourceDocument, TargetCredentials,
};
use serde_json::{Map, Value};

use self::clients::{FakeSourceClient, FakeTargetClient};
use self::repositories::{
    MockCredentialStore, MockJobRepository, MockMappingStore, MockPartyMappingStore,
    MockSettingsRepository,
};

/// 2025-03-14 12:00:00 UTC.
pub const NOW: i64 = 1_741_953_600;

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.0, 0).single().unwrap()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Build a source document from a JSON object literal.
pub fn doc(kind: DocumentKind, fields: Value) -> SourceDocument {
    let map: Map<String, Value> = match fields {
        Value::Object(map) => map,
        other => panic!("fixture must be a JSON object, got {other}"),
    };
    SourceDocument::new(kind, map)
}

pub fn source_credentials() -> SourceCredentials {
    SourceCredentials {
        tenant_id: "tenant-7".into(),
        username: "sync@example.com".into(),
        password: "hunter2".into(),
    }
}

/// Target credentials valid for another hour.
pub fn fresh_target_credentials() -> TargetCredentials {
    TargetCredentials {
        realm_id: "9130".into(),
        access_token: "access-current".into(),
        refresh_token: "refresh-current".into(),
        expires_at: NOW + 3600,
    }
}

pub struct Harness {
    pub jobs: MockJobRepository,
    pub credentials: MockCredentialStore,
    pub mappings: MockMappingStore,
    pub parties: MockPartyMappingStore,
    pub settings: MockSettingsRepository,
    pub source: FakeSourceClient,
    pub target: FakeTargetClient,
    pub executor: SyncExecutor,
}

impl Harness {
    /// Harness with credentials configured for `company_id`.
    pub fn new(company_id: i64) -> Self {
        let harness = Self::unconfigured();
        harness.credentials.set_source(company_id, source_credentials());
        harness.credentials.set_target(company_id, fresh_target_credentials());
        harness
    }

    pub fn unconfigured() -> Self {
        let jobs = MockJobRepository::default();
        let credentials = MockCredentialStore::default();
        let mappings = MockMappingStore::default();
        let parties = MockPartyMappingStore::default();
        let settings = MockSettingsRepository::default();
        let source = FakeSourceClient::default();
        let target = FakeTargetClient::default();

        let ports = SyncPorts {
            jobs: Arc::new(jobs.clone()),
            credentials: Arc::new(credentials.clone()),
            mappings: Arc::new(mappings.clone()),
            parties: Arc::new(parties.clone()),
            settings: Arc::new(settings.clone()),
            source: Arc::new(source.clone()),
            target: Arc::new(target.clone()),
        };
        let executor = SyncExecutor::new(ports).with_clock(Arc::new(FixedClock(NOW)));

        Self { jobs, credentials, mappings, parties, settings, source, target, executor }
    }

    /// Insert a pending job covering March 2025.
    pub async fn pending_job(&self, company_id: i64, job_type: JobType) -> i64 {
        use ledgersync_core::JobRepository;

        self.jobs
            .create_job(&NewJob {
                company_id,
                job_type,
                from_date: date(2025, 3, 1),
                to_date: date(2025, 3, 31),
            })
            .await
            .unwrap()
            .id
    }
}
