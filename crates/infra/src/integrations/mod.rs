//! External service integrations

pub mod errors;
pub mod source_client;
pub mod target_client;

pub use errors::{ApiError, ApiErrorCategory};
pub use source_client::HttpSourceClient;
pub use target_client::HttpTargetClient;

use ledgersync_domain::{Result, SyncError};
use url::Url;

/// Validate an absolute http(s) URL from config and strip trailing slashes.
pub(crate) fn normalize_base_url(setting: &str, raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim())
        .map_err(|err| SyncError::Configuration(format!("{setting} is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SyncError::Configuration(format!(
            "{setting} must use http or https, got {}",
            parsed.scheme()
        )));
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}
