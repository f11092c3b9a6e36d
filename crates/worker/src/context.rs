//! Worker context - wires infra adapters into the core ports.

use std::sync::Arc;

use ledgersync_core::{JobRepository, SyncExecutor, SyncPorts};
use ledgersync_domain::{Config, Result};
use ledgersync_infra::{
    CredentialCipher, DbManager, HttpSourceClient, HttpTargetClient, JobReaper, JobReaperConfig,
    JobWorker, JobWorkerConfig, SqlCipherCredentialStore, SqlCipherJobRepository,
    SqlCipherMappingStore, SqlCipherPartyMappingStore, SqlCipherSettingsRepository,
};
use tracing::{info, warn};

/// Everything the worker process owns for its lifetime.
pub struct WorkerContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub jobs: Arc<dyn JobRepository>,
    pub executor: Arc<SyncExecutor>,
}

impl WorkerContext {
    pub fn new(config: Config) -> Result<Self> {
        let encryption_key = match config.database.encryption_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => {
                warn!("no database encryption key configured; using the credential key");
                config.security.credential_key.as_str()
            }
        };

        let db = Arc::new(DbManager::new(
            &config.database.path,
            config.database.pool_size,
            Some(encryption_key),
        )?);
        db.run_migrations()?;
        info!(path = %config.database.path, "database ready");

        let cipher = Arc::new(CredentialCipher::new(&config.security.credential_key)?);
        let jobs: Arc<dyn JobRepository> = Arc::new(SqlCipherJobRepository::new(Arc::clone(&db)));

        let ports = SyncPorts {
            jobs: Arc::clone(&jobs),
            credentials: Arc::new(SqlCipherCredentialStore::new(Arc::clone(&db), cipher)),
            mappings: Arc::new(SqlCipherMappingStore::new(Arc::clone(&db))),
            parties: Arc::new(SqlCipherPartyMappingStore::new(Arc::clone(&db))),
            settings: Arc::new(SqlCipherSettingsRepository::new(Arc::clone(&db))),
            source: Arc::new(HttpSourceClient::new(&config.source)?),
            target: Arc::new(HttpTargetClient::new(&config.target)?),
        };

        Ok(Self { executor: Arc::new(SyncExecutor::new(ports)), config, db, jobs })
    }

    pub fn job_worker(&self) -> JobWorker {
        JobWorker::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.jobs),
            JobWorkerConfig::from(&self.config.worker),
        )
    }

    pub fn job_reaper(&self) -> JobReaper {
        JobReaper::new(Arc::clone(&self.jobs), JobReaperConfig::from(&self.config.worker))
    }
}
