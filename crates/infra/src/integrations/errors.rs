//! HTTP status classification shared by both ledger clients.
//!
//! Callers hand non-2xx responses to [`error_from_response`], which reads
//! the body (truncated) and picks the domain variant.

use std::fmt;

use ledgersync_domain::SyncError;
use reqwest::{Response, StatusCode};

const MAX_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// 401, 403
    Authentication,
    /// 429
    RateLimited,
    /// Remaining 4xx
    Rejected,
    /// 5xx
    ServerUnavailable,
    Unknown,
}

impl ApiErrorCategory {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimited,
            400..=499 => Self::Rejected,
            500..=599 => Self::ServerUnavailable,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ApiErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => f.write_str("authentication rejected"),
            Self::RateLimited => f.write_str("rate limited"),
            Self::Rejected => f.write_str("request rejected"),
            Self::ServerUnavailable => f.write_str("server unavailable"),
            Self::Unknown => f.write_str("unexpected status"),
        }
    }
}

/// Non-2xx response from one of the ledgers, with its body.
#[derive(Debug, Clone)]
pub struct ApiError {
    category: ApiErrorCategory,
    status: StatusCode,
    body: String,
}

impl ApiError {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self { category: ApiErrorCategory::from_status(status), status, body: truncate(body.into()) }
    }

    pub fn category(&self) -> ApiErrorCategory {
        self.category
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_domain_error(self) -> SyncError {
        let message = self.to_string();
        match self.category {
            ApiErrorCategory::Authentication => SyncError::Authentication(message),
            _ => SyncError::Upstream(message),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status.as_u16())?;
        if !self.body.is_empty() {
            write!(f, ": {}", self.body)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        err.into_domain_error()
    }
}

/// Consume a failed response into a domain error.
pub async fn error_from_response(response: Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ApiError::new(status, body.trim()).into_domain_error()
}

fn truncate(mut body: String) -> String {
    if let Some((idx, _)) = body.char_indices().nth(MAX_BODY_CHARS) {
        body.truncate(idx);
        body.push('…');
    }
    body
}
