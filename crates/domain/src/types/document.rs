//! Source documents as fetched from the e-invoicing platform
//!
//! The source API has renamed fields across versions, so a document keeps the
//! raw JSON object and resolves values through ordered field-name chains.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    BUYER_NAME_FIELD, BUYER_TAX_ID_FIELD, DOCUMENT_NUMBER_FIELDS, EXTERNAL_ID_FIELD, PDF_FIELD,
    SELLER_NAME_FIELD, SELLER_TAX_ID_FIELD, VAT_RATE_FIELD,
};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Sales,
    Purchase,
}

impl_domain_status_conversions!(DocumentKind {
    Sales => "sales",
    Purchase => "purchase",
});

impl DocumentKind {
    pub fn transaction_type(self) -> TransactionType {
        match self {
            Self::Sales => TransactionType::Invoice,
            Self::Purchase => TransactionType::Bill,
        }
    }

    pub fn party_kind(self) -> PartyKind {
        match self {
            Self::Sales => PartyKind::Customer,
            Self::Purchase => PartyKind::Vendor,
        }
    }
}

/// Target-side record family a source document becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Invoice,
    Bill,
}

impl_domain_status_conversions!(TransactionType {
    Invoice => "invoice",
    Bill => "bill",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Vendor,
}

impl_domain_status_conversions!(PartyKind {
    Customer => "customer",
    Vendor => "vendor",
});

/// Read-only document from the source ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub kind: DocumentKind,
    pub fields: Map<String, Value>,
}

impl SourceDocument {
    pub fn new(kind: DocumentKind, fields: Map<String, Value>) -> Self {
        Self { kind, fields }
    }

    /// Builder used by fixtures and the detail merge.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// First non-blank string among `names`.
    pub fn first_str(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| {
            self.fields.get(*name).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
        })
    }

    /// First numeric value among `names`. Numeric strings are accepted.
    pub fn first_number(&self, names: &[&str]) -> Option<f64> {
        names.iter().find_map(|name| match self.fields.get(*name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }

    /// First non-blank identifier among `names`. Some source versions send
    /// numbers and ids as JSON numbers; those are rendered as text.
    pub fn first_identifier(&self, names: &[&str]) -> Option<Cow<'_, str>> {
        names.iter().find_map(|name| match self.fields.get(*name)? {
            Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(Cow::Borrowed),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            _ => None,
        })
    }

    pub fn external_id(&self) -> Option<Cow<'_, str>> {
        self.first_identifier(&[EXTERNAL_ID_FIELD])
    }

    pub fn document_number(&self) -> Option<Cow<'_, str>> {
        self.first_identifier(&DOCUMENT_NUMBER_FIELDS)
    }

    pub fn counterparty_name(&self) -> Option<&str> {
        match self.kind {
            DocumentKind::Sales => self.first_str(&[BUYER_NAME_FIELD]),
            DocumentKind::Purchase => self.first_str(&[SELLER_NAME_FIELD]),
        }
    }

    pub fn counterparty_tax_id(&self) -> Option<&str> {
        match self.kind {
            DocumentKind::Sales => self.first_str(&[BUYER_TAX_ID_FIELD]),
            DocumentKind::Purchase => self.first_str(&[SELLER_TAX_ID_FIELD]),
        }
    }

    pub fn vat_rate(&self) -> Option<f64> {
        self.first_number(&[VAT_RATE_FIELD])
    }

    pub fn pdf_base64(&self) -> Option<&str> {
        self.first_str(&[PDF_FIELD])
    }

    /// Idempotency key: the external id when present, else the document
    /// number joined with the counterparty's tax id (or name).
    pub fn source_key(&self) -> Option<String> {
        if let Some(eic) = self.external_id() {
            return Some(eic.into_owned());
        }
        let number = self.document_number()?;
        let party = self.counterparty_tax_id().or_else(|| self.counterparty_name()).unwrap_or("");
        Some(format!("{number}:{party}"))
    }

    /// Identifier used in logs and error details.
    pub fn display_id(&self) -> String {
        self.external_id()
            .or_else(|| self.document_number())
            .map_or_else(|| "unidentified".to_string(), Cow::into_owned)
    }
}
