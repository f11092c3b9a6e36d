//! Per-company target ledger options and VAT rate → tax code table.

use std::sync::Arc;

use async_trait::async_trait;
use ledgersync_core::CompanySettingsRepository;
use ledgersync_domain::{CompanySettings, Result as DomainResult, VatRateMapping};
use rusqlite::{params, OptionalExtension};
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};

pub struct SqlCipherSettingsRepository {
    db: Arc<DbManager>,
}

impl SqlCipherSettingsRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    pub async fn save_company_settings(&self, settings: &CompanySettings) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let settings = settings.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO company_settings
                    (company_id, tracks_vat, eic_custom_field_id, sales_item_id, expense_account_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(company_id) DO UPDATE SET
                    tracks_vat = excluded.tracks_vat,
                    eic_custom_field_id = excluded.eic_custom_field_id,
                    sales_item_id = excluded.sales_item_id,
                    expense_account_id = excluded.expense_account_id",
                params![
                    settings.company_id,
                    settings.tracks_vat,
                    settings.eic_custom_field_id,
                    settings.sales_item_id,
                    settings.expense_account_id,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    pub async fn save_vat_rate_mapping(&self, mapping: &VatRateMapping) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let mapping = mapping.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO vat_rate_mappings (company_id, source_vat_rate, target_tax_code, is_excluded)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(company_id, source_vat_rate) DO UPDATE SET
                    target_tax_code = excluded.target_tax_code,
                    is_excluded = excluded.is_excluded",
                params![
                    mapping.company_id,
                    mapping.source_vat_rate,
                    mapping.target_tax_code,
                    mapping.is_excluded,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl CompanySettingsRepository for SqlCipherSettingsRepository {
    async fn company_settings(&self, company_id: i64) -> DomainResult<CompanySettings> {
        let db = Arc::clone(&self.db);

        let stored = task::spawn_blocking(move || -> DomainResult<Option<CompanySettings>> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT company_id, tracks_vat, eic_custom_field_id, sales_item_id, expense_account_id
                 FROM company_settings WHERE company_id = ?1",
                params![company_id],
                |row| {
                    Ok(CompanySettings {
                        company_id: row.get(0)?,
                        tracks_vat: row.get(1)?,
                        eic_custom_field_id: row.get(2)?,
                        sales_item_id: row.get(3)?,
                        expense_account_id: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)??;

        Ok(stored.unwrap_or_else(|| CompanySettings::defaults_for(company_id)))
    }

    async fn vat_rate_mappings(&self, company_id: i64) -> DomainResult<Vec<VatRateMapping>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<VatRateMapping>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT company_id, source_vat_rate, target_tax_code, is_excluded
                     FROM vat_rate_mappings WHERE company_id = ?1
                     ORDER BY source_vat_rate ASC",
                )
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![company_id], |row| {
                    Ok(VatRateMapping {
                        company_id: row.get(0)?,
                        source_vat_rate: row.get(1)?,
                        target_tax_code: row.get(2)?,
                        is_excluded: row.get(3)?,
                    })
                })
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}
