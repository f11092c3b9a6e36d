//! Encrypted per-company credentials.
//!
//! Secrets are sealed with [`CredentialCipher`] before they reach SQL, on top
//! of the SQLCipher page encryption. Identifiers (tenant, username, realm)
//! stay readable for support queries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ledgersync_core::CredentialStore;
use ledgersync_domain::{
    Result as DomainResult, SourceCredentials, SyncError, TargetCredentials, TargetTokens,
};
use rusqlite::{params, OptionalExtension};
use tokio::task;
use tracing::debug;

use super::manager::{map_join_error, map_sql_error, DbManager};
use crate::crypto::CredentialCipher;

pub struct SqlCipherCredentialStore {
    db: Arc<DbManager>,
    cipher: Arc<CredentialCipher>,
}

impl SqlCipherCredentialStore {
    pub fn new(db: Arc<DbManager>, cipher: Arc<CredentialCipher>) -> Self {
        Self { db, cipher }
    }

    /// Store or replace source platform credentials for a company.
    pub async fn save_source_credentials(
        &self,
        company_id: i64,
        credentials: &SourceCredentials,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let tenant_id = credentials.tenant_id.clone();
        let username = credentials.username.clone();
        let password_enc = self.cipher.encrypt(&credentials.password)?;

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO source_credentials (company_id, tenant_id, username, password_enc, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(company_id) DO UPDATE SET
                    tenant_id = excluded.tenant_id,
                    username = excluded.username,
                    password_enc = excluded.password_enc,
                    updated_at = excluded.updated_at",
                params![company_id, tenant_id, username, password_enc, Utc::now().timestamp()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    /// Store or replace the target ledger connection for a company.
    pub async fn save_target_credentials(
        &self,
        company_id: i64,
        credentials: &TargetCredentials,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let realm_id = credentials.realm_id.clone();
        let expires_at = credentials.expires_at;
        let access_enc = self.cipher.encrypt(&credentials.access_token)?;
        let refresh_enc = self.cipher.encrypt(&credentials.refresh_token)?;

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO target_credentials
                    (company_id, realm_id, access_token_enc, refresh_token_enc, expires_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(company_id) DO UPDATE SET
                    realm_id = excluded.realm_id,
                    access_token_enc = excluded.access_token_enc,
                    refresh_token_enc = excluded.refresh_token_enc,
                    expires_at = excluded.expires_at,
                    updated_at = excluded.updated_at",
                params![company_id, realm_id, access_enc, refresh_enc, expires_at, Utc::now().timestamp()],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

struct SourceRow {
    tenant_id: String,
    username: String,
    password_enc: String,
}

struct TargetRow {
    realm_id: String,
    access_token_enc: String,
    refresh_token_enc: String,
    expires_at: i64,
}

#[async_trait]
impl CredentialStore for SqlCipherCredentialStore {
    async fn source_credentials(&self, company_id: i64) -> DomainResult<Option<SourceCredentials>> {
        let db = Arc::clone(&self.db);

        let row = task::spawn_blocking(move || -> DomainResult<Option<SourceRow>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT tenant_id, username, password_enc FROM source_credentials WHERE company_id = ?1",
                params![company_id],
                |row| {
                    Ok(SourceRow {
                        tenant_id: row.get(0)?,
                        username: row.get(1)?,
                        password_enc: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)??;

        row.map(|row| {
            Ok(SourceCredentials {
                password: self.cipher.decrypt(&row.password_enc)?,
                tenant_id: row.tenant_id,
                username: row.username,
            })
        })
        .transpose()
    }

    async fn target_credentials(&self, company_id: i64) -> DomainResult<Option<TargetCredentials>> {
        let db = Arc::clone(&self.db);

        let row = task::spawn_blocking(move || -> DomainResult<Option<TargetRow>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT realm_id, access_token_enc, refresh_token_enc, expires_at
                 FROM target_credentials WHERE company_id = ?1",
                params![company_id],
                |row| {
                    Ok(TargetRow {
                        realm_id: row.get(0)?,
                        access_token_enc: row.get(1)?,
                        refresh_token_enc: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)??;

        row.map(|row| {
            Ok(TargetCredentials {
                access_token: self.cipher.decrypt(&row.access_token_enc)?,
                refresh_token: self.cipher.decrypt(&row.refresh_token_enc)?,
                realm_id: row.realm_id,
                expires_at: row.expires_at,
            })
        })
        .transpose()
    }

    async fn save_target_tokens(&self, company_id: i64, tokens: &TargetTokens) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let expires_at = tokens.expires_at;
        let access_enc = self.cipher.encrypt(&tokens.access_token)?;
        let refresh_enc = self.cipher.encrypt(&tokens.refresh_token)?;

        let updated = task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE target_credentials
                 SET access_token_enc = ?2, refresh_token_enc = ?3, expires_at = ?4, updated_at = ?5
                 WHERE company_id = ?1",
                params![company_id, access_enc, refresh_enc, expires_at, Utc::now().timestamp()],
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)??;

        if updated == 0 {
            return Err(SyncError::NotFound(format!(
                "no target connection stored for company {company_id}"
            )));
        }

        debug!(company_id, expires_at, "persisted refreshed target tokens");
        Ok(())
    }
}
