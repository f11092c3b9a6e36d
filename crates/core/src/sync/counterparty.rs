//! Customer/vendor resolution against the target ledger.
//!
//! Lookup order: cached mapping (verified live) → query by tax id → query by
//! name → create. Callers must run this sequentially per company; two
//! concurrent resolutions for a new counterparty would both create it.

use std::sync::Arc;

use ledgersync_domain::{PartyKind, PartyMapping, Result, TargetSession};
use tracing::{debug, error, info, warn};

use super::ports::{PartyMappingStore, TargetClient};

pub struct CounterpartyResolver {
    parties: Arc<dyn PartyMappingStore>,
    target: Arc<dyn TargetClient>,
}

impl CounterpartyResolver {
    pub fn new(parties: Arc<dyn PartyMappingStore>, target: Arc<dyn TargetClient>) -> Self {
        Self { parties, target }
    }

    /// Return the target id for a counterparty, creating it if needed.
    pub async fn resolve(
        &self,
        company_id: i64,
        session: &TargetSession,
        kind: PartyKind,
        name: &str,
        tax_id: Option<&str>,
    ) -> Result<String> {
        if let Some(cached) = self.parties.find(company_id, kind, name).await? {
            if self.target.record_exists(session, kind.into(), &cached.target_party_id).await? {
                debug!(company_id, party_kind = %kind, "counterparty resolved from cache");
                return Ok(cached.target_party_id);
            }

            warn!(
                company_id,
                party_kind = %kind,
                target_party_id = %cached.target_party_id,
                "cached counterparty no longer exists in target ledger; re-resolving"
            );
            self.parties.delete(company_id, kind, name).await?;
        }

        if let Some(tax_id) = tax_id {
            if let Some(id) = self.target.find_party_by_tax_id(session, kind, tax_id).await? {
                self.remember(company_id, kind, name, Some(tax_id), &id).await;
                return Ok(id);
            }
        }

        if let Some(id) = self.target.find_party_by_name(session, kind, name).await? {
            self.remember(company_id, kind, name, tax_id, &id).await;
            return Ok(id);
        }

        let id = self.target.create_party(session, kind, name, tax_id).await?;
        info!(company_id, party_kind = %kind, target_party_id = %id, "created counterparty");
        self.remember(company_id, kind, name, tax_id, &id).await;
        Ok(id)
    }

    /// Cache writes are best effort; the target ledger stays authoritative.
    async fn remember(
        &self,
        company_id: i64,
        kind: PartyKind,
        name: &str,
        tax_id: Option<&str>,
        target_party_id: &str,
    ) {
        let mapping = PartyMapping {
            company_id,
            party_kind: kind,
            counterparty_name: name.to_string(),
            counterparty_tax_id: tax_id.map(str::to_string),
            target_party_id: target_party_id.to_string(),
        };

        if let Err(err) = self.parties.upsert(&mapping).await {
            error!(company_id, party_kind = %kind, error = %err, "failed to cache counterparty");
        }
    }
}
