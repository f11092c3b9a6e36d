//! Idempotency ledger and counterparty id cache.

use std::sync::Arc;

use async_trait::async_trait;
use ledgersync_core::{MappingStore, PartyMappingStore};
use ledgersync_domain::{
    MappingRecord, PartyKind, PartyMapping, Result as DomainResult, TransactionType,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use super::job_repository::parse_column;
use super::manager::{map_join_error, map_sql_error, DbManager};

const MAPPING_COLUMNS: &str = "company_id, source_key, transaction_type, target_id, \
                               target_doc_number, amount, counterparty_name, synced_at, last_synced_at";

/// SqlCipher-backed document mapping store
pub struct SqlCipherMappingStore {
    db: Arc<DbManager>,
}

impl SqlCipherMappingStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MappingStore for SqlCipherMappingStore {
    async fn find(
        &self,
        company_id: i64,
        source_key: &str,
        transaction_type: TransactionType,
    ) -> DomainResult<Option<MappingRecord>> {
        let db = Arc::clone(&self.db);
        let source_key = source_key.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<MappingRecord>> {
            let conn = db.get_connection()?;
            query_mapping(&conn, company_id, &source_key, transaction_type)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(&self, record: &MappingRecord) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let record = record.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            upsert_mapping(&conn, &record)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(
        &self,
        company_id: i64,
        source_key: &str,
        transaction_type: TransactionType,
    ) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let source_key = source_key.to_string();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let removed = conn
                .execute(
                    "DELETE FROM document_mappings
                     WHERE company_id = ?1 AND source_key = ?2 AND transaction_type = ?3",
                    params![company_id, source_key, transaction_type.to_string()],
                )
                .map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_for_company(
        &self,
        company_id: i64,
        transaction_type: Option<TransactionType>,
    ) -> DomainResult<Vec<MappingRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<MappingRecord>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {MAPPING_COLUMNS} FROM document_mappings
                 WHERE company_id = ?1 AND (?2 IS NULL OR transaction_type = ?2)
                 ORDER BY synced_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(
                    params![company_id, transaction_type.map(|t| t.to_string())],
                    map_mapping_row,
                )
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_mapping(
    conn: &Connection,
    company_id: i64,
    source_key: &str,
    transaction_type: TransactionType,
) -> DomainResult<Option<MappingRecord>> {
    let sql = format!(
        "SELECT {MAPPING_COLUMNS} FROM document_mappings
         WHERE company_id = ?1 AND source_key = ?2 AND transaction_type = ?3"
    );
    conn.query_row(&sql, params![company_id, source_key, transaction_type.to_string()], map_mapping_row)
        .optional()
        .map_err(map_sql_error)
}

/// A re-sync keeps the first `synced_at` and moves `last_synced_at`.
fn upsert_mapping(conn: &Connection, record: &MappingRecord) -> DomainResult<()> {
    conn.execute(
        "INSERT INTO document_mappings
            (company_id, source_key, transaction_type, target_id, target_doc_number, amount,
             counterparty_name, synced_at, last_synced_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(company_id, source_key, transaction_type) DO UPDATE SET
            target_id = excluded.target_id,
            target_doc_number = excluded.target_doc_number,
            amount = excluded.amount,
            counterparty_name = excluded.counterparty_name,
            last_synced_at = excluded.last_synced_at",
        params![
            record.company_id,
            record.source_key,
            record.transaction_type.to_string(),
            record.target_id,
            record.target_doc_number,
            record.amount,
            record.counterparty_name,
            record.synced_at,
            record.last_synced_at,
        ],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

fn map_mapping_row(row: &Row<'_>) -> rusqlite::Result<MappingRecord> {
    Ok(MappingRecord {
        company_id: row.get(0)?,
        source_key: row.get(1)?,
        transaction_type: parse_column::<TransactionType>(row, 2)?,
        target_id: row.get(3)?,
        target_doc_number: row.get(4)?,
        amount: row.get(5)?,
        counterparty_name: row.get(6)?,
        synced_at: row.get(7)?,
        last_synced_at: row.get(8)?,
    })
}

/// SqlCipher-backed customer/vendor cache
pub struct SqlCipherPartyMappingStore {
    db: Arc<DbManager>,
}

impl SqlCipherPartyMappingStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PartyMappingStore for SqlCipherPartyMappingStore {
    async fn find(
        &self,
        company_id: i64,
        party_kind: PartyKind,
        counterparty_name: &str,
    ) -> DomainResult<Option<PartyMapping>> {
        let db = Arc::clone(&self.db);
        let name = counterparty_name.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<PartyMapping>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT company_id, party_kind, counterparty_name, counterparty_tax_id, target_party_id
                 FROM party_mappings
                 WHERE company_id = ?1 AND party_kind = ?2 AND counterparty_name = ?3",
                params![company_id, party_kind.to_string(), name],
                |row| {
                    Ok(PartyMapping {
                        company_id: row.get(0)?,
                        party_kind: parse_column::<PartyKind>(row, 1)?,
                        counterparty_name: row.get(2)?,
                        counterparty_tax_id: row.get(3)?,
                        target_party_id: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(&self, mapping: &PartyMapping) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let mapping = mapping.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO party_mappings
                    (company_id, party_kind, counterparty_name, counterparty_tax_id, target_party_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(company_id, party_kind, counterparty_name) DO UPDATE SET
                    counterparty_tax_id = excluded.counterparty_tax_id,
                    target_party_id = excluded.target_party_id",
                params![
                    mapping.company_id,
                    mapping.party_kind.to_string(),
                    mapping.counterparty_name,
                    mapping.counterparty_tax_id,
                    mapping.target_party_id,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(
        &self,
        company_id: i64,
        party_kind: PartyKind,
        counterparty_name: &str,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let name = counterparty_name.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "DELETE FROM party_mappings
                 WHERE company_id = ?1 AND party_kind = ?2 AND counterparty_name = ?3",
                params![company_id, party_kind.to_string(), name],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}
