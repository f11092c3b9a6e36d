//! REST client for the POS/e-invoicing platform.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDate;
use ledgersync_core::SourceClient;
use ledgersync_domain::config::SourceApiConfig;
use ledgersync_domain::{DocumentKind, Result, SourceCredentials, SourceDocument, SourceToken, SyncError};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use super::errors::error_from_response;
use super::normalize_base_url;
use crate::http::HttpClient;

const TENANT_HEADER: &str = "Tenant";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct HttpSourceClient {
    base_url: String,
    basic_auth: Zeroizing<String>,
    http_client: HttpClient,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

impl HttpSourceClient {
    pub fn new(config: &SourceApiConfig) -> Result<Self> {
        let base_url = normalize_base_url("source.base_url", &config.base_url)?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .max_attempts(3)
            .build()?;

        Ok(Self {
            base_url,
            basic_auth: Zeroizing::new(format!(
                "Basic {}",
                BASE64.encode(config.client_credentials.as_bytes())
            )),
            http_client,
        })
    }

    fn list_path(kind: DocumentKind) -> &'static str {
        match kind {
            DocumentKind::Sales => "api/sales-invoices",
            DocumentKind::Purchase => "api/purchase-invoices",
        }
    }

    async fn ensure_success(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    #[instrument(skip_all, fields(tenant_id = %credentials.tenant_id))]
    async fn authenticate(&self, credentials: &SourceCredentials) -> Result<SourceToken> {
        let url = format!("{}/token", self.base_url);
        let form = [
            ("grant_type", "password"),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];

        let request = self
            .http_client
            .request(Method::POST, &url)
            .header(AUTHORIZATION, self.basic_auth.as_str())
            .header(TENANT_HEADER, credentials.tenant_id.as_str())
            .form(&form);

        let response = Self::ensure_success(self.http_client.send(request).await?).await?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Upstream(format!("malformed source token response: {err}")))?;

        let access_token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SyncError::Upstream("source token response has no access_token".into()))?;

        debug!("source platform authenticated");
        Ok(SourceToken { access_token })
    }

    #[instrument(skip_all, fields(kind = %kind, from = %from, to = %to))]
    async fn fetch_documents(
        &self,
        token: &SourceToken,
        tenant_id: &str,
        kind: DocumentKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SourceDocument>> {
        let url = format!("{}/{}", self.base_url, Self::list_path(kind));
        let from_date = from.format(DATE_FORMAT).to_string();
        let to_date = to.format(DATE_FORMAT).to_string();

        let request = self
            .http_client
            .request(Method::GET, &url)
            .bearer_auth(&token.access_token)
            .header(TENANT_HEADER, tenant_id)
            .header(ACCEPT, "application/json")
            .query(&[("fromDate", from_date.as_str()), ("toDate", to_date.as_str())]);

        let response = Self::ensure_success(self.http_client.send(request).await?).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|err| SyncError::Upstream(format!("malformed {kind} document list: {err}")))?;

        let Value::Array(items) = body else {
            return Err(SyncError::Upstream(format!("{kind} document list is not an array")));
        };

        let documents = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(fields) => Ok(SourceDocument::new(kind, fields)),
                _ => Err(SyncError::Upstream(format!("{kind} document list entry {idx} is not an object"))),
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(count = documents.len(), "fetched source documents");
        Ok(documents)
    }

    #[instrument(skip_all, fields(kind = %kind, external_id = %external_id))]
    async fn fetch_document_detail(
        &self,
        token: &SourceToken,
        tenant_id: &str,
        kind: DocumentKind,
        external_id: &str,
    ) -> Result<SourceDocument> {
        let url = format!("{}/api/invoices/{}", self.base_url, urlencoding::encode(external_id));

        let request = self
            .http_client
            .request(Method::GET, &url)
            .bearer_auth(&token.access_token)
            .header(TENANT_HEADER, tenant_id)
            .header(ACCEPT, "application/json");

        let response = Self::ensure_success(self.http_client.send(request).await?).await?;
        match response.json::<Value>().await {
            Ok(Value::Object(fields)) => Ok(SourceDocument::new(kind, fields)),
            Ok(_) => Err(SyncError::Upstream(format!("document {external_id} detail is not an object"))),
            Err(err) => Err(SyncError::Upstream(format!("malformed document detail: {err}"))),
        }
    }
}
