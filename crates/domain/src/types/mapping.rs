//! Idempotency ledger rows, counterparty cache rows and per-company settings

use serde::{Deserialize, Serialize};

use super::document::{PartyKind, TransactionType};
use crate::constants::{DEFAULT_EXPENSE_ACCOUNT_ID, DEFAULT_SALES_ITEM_ID};

/// Links one source document to the target record created for it.
///
/// Unique per (company_id, source_key, transaction_type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub company_id: i64,
    pub source_key: String,
    pub transaction_type: TransactionType,
    pub target_id: String,
    pub target_doc_number: Option<String>,
    pub amount: f64,
    pub counterparty_name: Option<String>,
    pub synced_at: i64,
    pub last_synced_at: i64,
}

/// Cached target id for a customer or vendor. The target ledger stays
/// authoritative; a cached id that no longer resolves is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMapping {
    pub company_id: i64,
    pub party_kind: PartyKind,
    pub counterparty_name: String,
    pub counterparty_tax_id: Option<String>,
    pub target_party_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatRateMapping {
    pub company_id: i64,
    pub source_vat_rate: f64,
    pub target_tax_code: String,
    /// Marks the company's "excluded" code, used for unmapped 0% rates.
    pub is_excluded: bool,
}

/// Target-ledger options configured per company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySettings {
    pub company_id: i64,
    pub tracks_vat: bool,
    pub eic_custom_field_id: Option<String>,
    pub sales_item_id: String,
    pub expense_account_id: String,
}

impl CompanySettings {
    pub fn defaults_for(company_id: i64) -> Self {
        Self {
            company_id,
            tracks_vat: false,
            eic_custom_field_id: None,
            sales_item_id: DEFAULT_SALES_ITEM_ID.to_string(),
            expense_account_id: DEFAULT_EXPENSE_ACCOUNT_ID.to_string(),
        }
    }
}

/// Target record created for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
    pub doc_number: Option<String>,
}
