//! Shared fixtures for `ledgersync-infra` integration tests.
//!
//! Every test gets its own encrypted database in a temp dir and two
//! wiremock servers standing in for the source and target ledgers.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use ledgersync_core::{JobRepository, SyncExecutor, SyncPorts};
use ledgersync_domain::{
    JobType, NewJob, SourceApiConfig, SourceCredentials, TargetApiConfig, TargetCredentials,
};
use ledgersync_infra::crypto::CredentialCipher;
use ledgersync_infra::database::{
    DbManager, SqlCipherCredentialStore, SqlCipherJobRepository, SqlCipherMappingStore,
    SqlCipherPartyMappingStore, SqlCipherSettingsRepository,
};
use ledgersync_infra::integrations::{HttpSourceClient, HttpTargetClient};
use tempfile::TempDir;
use wiremock::MockServer;

pub const TEST_DB_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const COLUMN_KEY: &str = "integration-column-key";
pub const REALM: &str = "9130";
pub const TENANT: &str = "tenant-7";

/// Encrypted database with the schema applied.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("ledgersync.db");
        let manager = DbManager::new(&path, 4, Some(TEST_DB_KEY)).expect("failed to open database");
        manager.run_migrations().expect("failed to run migrations");
        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

/// Real repositories and HTTP clients wired into a [`SyncExecutor`].
pub struct TestStack {
    pub db: TestDatabase,
    pub source_server: MockServer,
    pub target_server: MockServer,
    pub jobs: Arc<SqlCipherJobRepository>,
    pub credentials: Arc<SqlCipherCredentialStore>,
    pub mappings: Arc<SqlCipherMappingStore>,
    pub parties: Arc<SqlCipherPartyMappingStore>,
    pub settings: Arc<SqlCipherSettingsRepository>,
    pub executor: Arc<SyncExecutor>,
}

impl TestStack {
    pub async fn start() -> Self {
        let db = TestDatabase::new();
        let source_server = MockServer::start().await;
        let target_server = MockServer::start().await;

        let cipher = Arc::new(CredentialCipher::new(COLUMN_KEY).expect("cipher"));
        let jobs = Arc::new(SqlCipherJobRepository::new(Arc::clone(&db.manager)));
        let credentials = Arc::new(SqlCipherCredentialStore::new(Arc::clone(&db.manager), cipher));
        let mappings = Arc::new(SqlCipherMappingStore::new(Arc::clone(&db.manager)));
        let parties = Arc::new(SqlCipherPartyMappingStore::new(Arc::clone(&db.manager)));
        let settings = Arc::new(SqlCipherSettingsRepository::new(Arc::clone(&db.manager)));

        let source = HttpSourceClient::new(&SourceApiConfig {
            base_url: source_server.uri(),
            client_credentials: "pos-client:pos-secret".into(),
            timeout_secs: 5,
        })
        .expect("source client");
        let target = HttpTargetClient::new(&TargetApiConfig {
            base_url: target_server.uri(),
            token_url: format!("{}/oauth2/v1/tokens/bearer", target_server.uri()),
            client_id: "app-id".into(),
            client_secret: "app-secret".into(),
            minor_version: "75".into(),
            timeout_secs: 5,
        })
        .expect("target client");

        let ports = SyncPorts {
            jobs: jobs.clone(),
            credentials: credentials.clone(),
            mappings: mappings.clone(),
            parties: parties.clone(),
            settings: settings.clone(),
            source: Arc::new(source),
            target: Arc::new(target),
        };

        Self {
            db,
            source_server,
            target_server,
            jobs,
            credentials,
            mappings,
            parties,
            settings,
            executor: Arc::new(SyncExecutor::new(ports)),
        }
    }

    /// Store both credential sets; the target token expires `expires_in` seconds from now.
    pub async fn connect_company(&self, company_id: i64, expires_in: i64) {
        self.credentials
            .save_source_credentials(
                company_id,
                &SourceCredentials {
                    tenant_id: TENANT.into(),
                    username: "sync@example.com".into(),
                    password: "hunter2".into(),
                },
            )
            .await
            .expect("save source credentials");
        self.credentials
            .save_target_credentials(
                company_id,
                &TargetCredentials {
                    realm_id: REALM.into(),
                    access_token: "access-current".into(),
                    refresh_token: "refresh-current".into(),
                    expires_at: Utc::now().timestamp() + expires_in,
                },
            )
            .await
            .expect("save target credentials");
    }

    pub async fn pending_job(&self, company_id: i64, job_type: JobType) -> i64 {
        self.jobs
            .create_job(&NewJob {
                company_id,
                job_type,
                from_date: date(2025, 3, 1),
                to_date: date(2025, 3, 31),
            })
            .await
            .expect("create job")
            .id
    }

    /// `{target}/v3/company/{realm}/{tail}` as a request path.
    pub fn company_path(tail: &str) -> String {
        format!("/v3/company/{REALM}/{tail}")
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
