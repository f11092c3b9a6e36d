//! REST client for the accounting ledger.
//!
//! Every call is scoped by the [`TargetSession`] passed in; the client holds
//! only app-level OAuth settings.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use ledgersync_core::sync::mapper::{BillPayload, InvoicePayload};
use ledgersync_core::{TargetClient, TargetEntity};
use ledgersync_domain::config::TargetApiConfig;
use ledgersync_domain::{
    CreatedRecord, PartyKind, Result, SyncError, TargetCredentials, TargetSession, TargetTokens,
    TransactionType,
};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

use super::errors::{error_from_response, ApiError};
use super::normalize_base_url;
use crate::http::HttpClient;

const PDF_CONTENT_TYPE: &str = "application/pdf";

pub struct HttpTargetClient {
    base_url: String,
    token_url: String,
    basic_auth: Zeroizing<String>,
    minor_version: String,
    http_client: HttpClient,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EntityBody {
    id: String,
    doc_number: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NewParty<'a> {
    display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_tax_identifier: Option<&'a str>,
}

impl HttpTargetClient {
    pub fn new(config: &TargetApiConfig) -> Result<Self> {
        let base_url = normalize_base_url("target.base_url", &config.base_url)?;
        let token_url = normalize_base_url("target.token_url", &config.token_url)?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .max_attempts(3)
            .build()?;

        let client_pair = Zeroizing::new(format!("{}:{}", config.client_id, config.client_secret));

        Ok(Self {
            base_url,
            token_url,
            basic_auth: Zeroizing::new(format!("Basic {}", BASE64.encode(client_pair.as_bytes()))),
            minor_version: config.minor_version.clone(),
            http_client,
        })
    }

    fn company_url(&self, session: &TargetSession, tail: &str) -> String {
        format!(
            "{}/v3/company/{}/{}",
            self.base_url,
            urlencoding::encode(&session.realm_id),
            tail
        )
    }

    fn authorized(&self, session: &TargetSession, method: Method, url: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(&session.access_token)
            .header(ACCEPT, "application/json")
            .query(&[("minorversion", self.minor_version.as_str())])
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|err| SyncError::Upstream(format!("malformed target response: {err}")))
    }

    /// Creates are not idempotent on the ledger side, so they go out once.
    async fn create_entity<B: Serialize + ?Sized>(
        &self,
        session: &TargetSession,
        entity: TargetEntity,
        body: &B,
    ) -> Result<CreatedRecord> {
        let url = self.company_url(session, &entity.entity_name().to_ascii_lowercase());
        let request = self.authorized(session, Method::POST, &url).json(body);

        let envelope: Value = Self::read_json(self.http_client.send_once(request).await?).await?;
        let created = envelope
            .get(entity.entity_name())
            .cloned()
            .ok_or_else(|| {
                SyncError::Upstream(format!("target response has no {} object", entity.entity_name()))
            })
            .and_then(|value| {
                serde_json::from_value::<EntityBody>(value).map_err(|err| {
                    SyncError::Upstream(format!("malformed {} in response: {err}", entity.entity_name()))
                })
            })?;

        debug!(entity = entity.entity_name(), id = %created.id, "target record created");
        Ok(CreatedRecord { id: created.id, doc_number: created.doc_number })
    }

    async fn query_first_id(
        &self,
        session: &TargetSession,
        entity: TargetEntity,
        filter_field: &str,
        value: &str,
    ) -> Result<Option<String>> {
        let statement = format!(
            "select Id from {} where {} = '{}'",
            entity.entity_name(),
            filter_field,
            escape_query_value(value)
        );
        let url = self.company_url(session, "query");
        let request =
            self.authorized(session, Method::GET, &url).query(&[("query", statement.as_str())]);

        let body: Value = Self::read_json(self.http_client.send(request).await?).await?;
        let id = body
            .get("QueryResponse")
            .and_then(|resp| resp.get(entity.entity_name()))
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("Id"))
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        Ok(id)
    }
}

/// Quote-safe literal for the ledger's SQL-like query language.
pub(crate) fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl TargetClient for HttpTargetClient {
    #[instrument(skip_all, fields(realm_id = %credentials.realm_id))]
    async fn refresh_tokens(&self, credentials: &TargetCredentials) -> Result<TargetTokens> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", credentials.refresh_token.as_str()),
        ];
        let request = self
            .http_client
            .request(Method::POST, &self.token_url)
            .header(AUTHORIZATION, self.basic_auth.as_str())
            .header(ACCEPT, "application/json")
            .form(&form);

        let response = self.http_client.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::new(status, body.trim());
            return Err(if status.is_client_error() {
                SyncError::Authentication(format!("token refresh rejected: {err}"))
            } else {
                SyncError::Upstream(format!("token refresh failed: {err}"))
            });
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Upstream(format!("malformed token refresh response: {err}")))?;

        info!(expires_in = body.expires_in, "target tokens refreshed");
        Ok(TargetTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token.unwrap_or_else(|| credentials.refresh_token.clone()),
            expires_at: Utc::now().timestamp() + body.expires_in,
        })
    }

    async fn create_invoice(
        &self,
        session: &TargetSession,
        payload: &InvoicePayload,
    ) -> Result<CreatedRecord> {
        self.create_entity(session, TargetEntity::Invoice, payload).await
    }

    async fn create_bill(&self, session: &TargetSession, payload: &BillPayload) -> Result<CreatedRecord> {
        self.create_entity(session, TargetEntity::Bill, payload).await
    }

    async fn create_party(
        &self,
        session: &TargetSession,
        kind: PartyKind,
        name: &str,
        tax_id: Option<&str>,
    ) -> Result<String> {
        let body = NewParty { display_name: name, primary_tax_identifier: tax_id };
        let created = self.create_entity(session, kind.into(), &body).await?;
        Ok(created.id)
    }

    async fn find_party_by_tax_id(
        &self,
        session: &TargetSession,
        kind: PartyKind,
        tax_id: &str,
    ) -> Result<Option<String>> {
        self.query_first_id(session, kind.into(), "PrimaryTaxIdentifier", tax_id).await
    }

    async fn find_party_by_name(
        &self,
        session: &TargetSession,
        kind: PartyKind,
        name: &str,
    ) -> Result<Option<String>> {
        self.query_first_id(session, kind.into(), "DisplayName", name).await
    }

    async fn record_exists(
        &self,
        session: &TargetSession,
        entity: TargetEntity,
        id: &str,
    ) -> Result<bool> {
        let url = self.company_url(
            session,
            &format!("{}/{}", entity.entity_name().to_ascii_lowercase(), urlencoding::encode(id)),
        );
        let response = self.http_client.send(self.authorized(session, Method::GET, &url)).await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED => Err(error_from_response(response).await),
            status => {
                debug!(entity = entity.entity_name(), id, %status, "target record not readable");
                Ok(false)
            }
        }
    }

    #[instrument(skip(self, session, content), fields(size = content.len()))]
    async fn upload_attachment(
        &self,
        session: &TargetSession,
        transaction_type: TransactionType,
        record_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<()> {
        let entity = TargetEntity::from(transaction_type);
        let metadata = json!({
            "AttachableRef": [{
                "EntityRef": { "type": entity.entity_name(), "value": record_id }
            }],
            "FileName": file_name,
            "ContentType": PDF_CONTENT_TYPE,
        });

        let metadata_part = Part::text(metadata.to_string())
            .mime_str("application/json")
            .map_err(|err| SyncError::Internal(format!("invalid attachment metadata part: {err}")))?;
        let file_part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str(PDF_CONTENT_TYPE)
            .map_err(|err| SyncError::Internal(format!("invalid attachment file part: {err}")))?;
        let form = Form::new().part("file_metadata_01", metadata_part).part("file_content_01", file_part);

        let url = self.company_url(session, "upload");
        let request = self.authorized(session, Method::POST, &url).multipart(form);
        let response = self.http_client.send_once(request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        debug!("attachment uploaded");
        Ok(())
    }
}
