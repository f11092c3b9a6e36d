//! Source document → target payload mapping.
//!
//! Everything here is pure. "Today" is supplied by the caller so the date
//! fallback stays deterministic under test.

use std::borrow::Cow;

use chrono::NaiveDate;
use ledgersync_domain::constants::{
    AMOUNT_FIELDS, DATE_FIELDS, EXTERNAL_ID_FIELD_NAME, MAX_EXTERNAL_ID_LENGTH, NON_TAXABLE_CODE,
    TAXABLE_CODE,
};
use ledgersync_domain::{CompanySettings, SourceDocument, VatRateMapping};
use serde::Serialize;
use tracing::warn;

/// How tax codes are applied to invoice lines.
#[derive(Debug, Clone, Copy)]
pub enum TaxMode<'a> {
    /// The company does not track VAT; payloads carry no tax fields at all.
    Disabled,
    /// Resolve codes through the company's VAT rate table.
    Tracked(&'a [VatRateMapping]),
}

impl<'a> TaxMode<'a> {
    pub fn for_company(settings: &CompanySettings, mappings: &'a [VatRateMapping]) -> Self {
        if settings.tracks_vat {
            Self::Tracked(mappings)
        } else {
            Self::Disabled
        }
    }

    /// Tax code for a VAT rate, or None when tax is not tracked.
    pub fn resolve_code(&self, rate: f64) -> Option<String> {
        let Self::Tracked(mappings) = self else {
            return None;
        };

        if let Some(exact) = mappings.iter().find(|m| rates_equal(m.source_vat_rate, rate)) {
            return Some(exact.target_tax_code.clone());
        }

        if rates_equal(rate, 0.0) {
            let code = mappings
                .iter()
                .find(|m| m.is_excluded)
                .map_or(NON_TAXABLE_CODE, |m| m.target_tax_code.as_str());
            return Some(code.to_string());
        }

        Some(TAXABLE_CODE.to_string())
    }
}

fn rates_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Why a document was skipped before any target call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Amount is zero or absent.
    ZeroAmount,
    /// Neither `documentNumber` nor `invoiceNumber` is present.
    MissingDocumentNumber,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroAmount => write!(f, "amount is zero or missing"),
            Self::MissingDocumentNumber => write!(f, "document number is missing"),
        }
    }
}

/// Minimal business validation. A missing amount counts as zero.
pub fn validate_document(doc: &SourceDocument) -> Option<SkipReason> {
    if doc.document_number().is_none() {
        return Some(SkipReason::MissingDocumentNumber);
    }
    if resolve_amount(doc) == 0.0 {
        return Some(SkipReason::ZeroAmount);
    }
    None
}

/// Amount from the first populated field in the chain, else 0.
pub fn resolve_amount(doc: &SourceDocument) -> f64 {
    doc.first_number(&AMOUNT_FIELDS).map_or(0.0, round_cents)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Date-only string from the first populated field in the chain. Falls back
/// to `today` and reports the fallback as degraded.
pub fn resolve_date(doc: &SourceDocument, today: NaiveDate) -> (String, bool) {
    match doc.first_str(&DATE_FIELDS) {
        Some(raw) => (raw.chars().take(10).collect(), false),
        None => (today.format("%Y-%m-%d").to_string(), true),
    }
}

/// Truncate on a character boundary.
pub fn truncate_external_id(value: &str) -> String {
    value.chars().take(MAX_EXTERNAL_ID_LENGTH).collect()
}

// =============================================================================
// Target payloads
// =============================================================================

/// `{"value": id}` reference to another target record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub value: String,
}

impl Reference {
    fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

/// Body of the target ledger's invoice create call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvoicePayload {
    pub customer_ref: Reference,
    pub txn_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_number: Option<String>,
    pub line: Vec<SalesLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_field: Vec<CustomField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_tax_calculation: Option<String>,
}

/// One sales item line; invoices always carry exactly one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SalesLine {
    pub amount: f64,
    pub detail_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sales_item_line_detail: SalesItemLineDetail,
}

/// Item and optional tax code for a sales line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SalesItemLineDetail {
    pub item_ref: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_code_ref: Option<Reference>,
}

/// String custom field holding the document's external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomField {
    pub definition_id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub field_type: String,
    pub string_value: String,
}

/// Body of the target ledger's bill create call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BillPayload {
    pub vendor_ref: Reference,
    pub txn_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_number: Option<String>,
    pub line: Vec<ExpenseLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_note: Option<String>,
}

/// Account-based expense line on a bill.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpenseLine {
    pub amount: f64,
    pub detail_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub account_based_expense_line_detail: AccountLineDetail,
}

/// Expense account for a bill line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountLineDetail {
    pub account_ref: Reference,
}

/// A payload plus the values the executor records in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedDocument<P> {
    pub payload: P,
    pub txn_date: String,
    pub amount: f64,
    /// The date fell back to "today".
    pub degraded_date: bool,
}

// =============================================================================
// Mapper
// =============================================================================

/// Maps source documents for one company.
#[derive(Debug, Clone)]
pub struct DocumentMapper {
    settings: CompanySettings,
    today: NaiveDate,
}

impl DocumentMapper {
    /// `today` is the fallback transaction date.
    pub fn new(settings: CompanySettings, today: NaiveDate) -> Self {
        Self { settings, today }
    }

    pub fn settings(&self) -> &CompanySettings {
        &self.settings
    }

    /// Invoice payload for a sales document. Tax fields follow `tax_mode`.
    pub fn map_to_target_invoice(
        &self,
        doc: &SourceDocument,
        customer_id: &str,
        tax_mode: TaxMode<'_>,
    ) -> MappedDocument<InvoicePayload> {
        let (txn_date, degraded_date) = self.date_for(doc);
        let amount = resolve_amount(doc);
        let doc_number = doc.document_number().map(Cow::into_owned);

        let tax_code_ref = tax_mode.resolve_code(doc.vat_rate().unwrap_or(0.0)).map(Reference::new);
        let global_tax_calculation = match tax_mode {
            TaxMode::Disabled => None,
            TaxMode::Tracked(_) => Some("TaxExcluded".to_string()),
        };

        let custom_field = match (&self.settings.eic_custom_field_id, doc.external_id()) {
            (Some(definition_id), Some(eic)) => vec![CustomField {
                definition_id: definition_id.clone(),
                name: EXTERNAL_ID_FIELD_NAME.to_string(),
                field_type: "StringType".to_string(),
                string_value: truncate_external_id(&eic),
            }],
            _ => Vec::new(),
        };

        let payload = InvoicePayload {
            customer_ref: Reference::new(customer_id),
            txn_date: txn_date.clone(),
            line: vec![SalesLine {
                amount,
                detail_type: "SalesItemLineDetail".to_string(),
                description: doc_number.as_ref().map(|n| format!("Sales document {n}")),
                sales_item_line_detail: SalesItemLineDetail {
                    item_ref: Reference::new(self.settings.sales_item_id.clone()),
                    tax_code_ref,
                },
            }],
            doc_number,
            custom_field,
            global_tax_calculation,
        };

        MappedDocument { payload, txn_date, amount, degraded_date }
    }

    /// Bills never carry tax fields.
    pub fn map_to_target_bill(
        &self,
        doc: &SourceDocument,
        vendor_id: &str,
    ) -> MappedDocument<BillPayload> {
        let (txn_date, degraded_date) = self.date_for(doc);
        let amount = resolve_amount(doc);
        let doc_number = doc.document_number().map(Cow::into_owned);

        let payload = BillPayload {
            vendor_ref: Reference::new(vendor_id),
            txn_date: txn_date.clone(),
            line: vec![ExpenseLine {
                amount,
                detail_type: "AccountBasedExpenseLineDetail".to_string(),
                description: doc_number.as_ref().map(|n| format!("Purchase document {n}")),
                account_based_expense_line_detail: AccountLineDetail {
                    account_ref: Reference::new(self.settings.expense_account_id.clone()),
                },
            }],
            doc_number,
            private_note: doc.external_id().map(|eic| format!("{EXTERNAL_ID_FIELD_NAME}: {eic}")),
        };

        MappedDocument { payload, txn_date, amount, degraded_date }
    }

    fn date_for(&self, doc: &SourceDocument) -> (String, bool) {
        let (date, degraded) = resolve_date(doc, self.today);
        if degraded {
            warn!(
                document_id = %doc.display_id(),
                fallback_date = %date,
                "document has no date field; using processing date"
            );
        }
        (date, degraded)
    }
}
