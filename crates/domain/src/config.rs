//! Configuration structures
//!
//! Populated by `ledgersync_infra::config::loader` from environment variables
//! or a TOML/JSON file.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub source: SourceApiConfig,
    pub target: TargetApiConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// SQLCipher key. The database refuses to open without one.
    pub encryption_key: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("path", &self.path)
            .field("pool_size", &self.pool_size)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Key material for encrypting stored company credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub credential_key: String,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig").field("credential_key", &"[REDACTED]").finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SourceApiConfig {
    pub base_url: String,
    /// Fixed Basic credential sent on the password grant, as `client:secret`.
    pub client_credentials: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for SourceApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceApiConfig")
            .field("base_url", &self.base_url)
            .field("client_credentials", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TargetApiConfig {
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_minor_version")]
    pub minor_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for TargetApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetApiConfig")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("minor_version", &self.minor_version)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Polling worker and stale-job reaper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub poll_interval_secs: u64,
    pub batch_size: usize,
    /// Wall-clock budget for one job before the worker stops waiting on it.
    pub job_timeout_secs: u64,
    /// Running jobs older than this are force-failed by the reaper.
    pub stale_job_threshold_secs: u64,
    pub reaper_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            batch_size: 10,
            job_timeout_secs: 1800,
            stale_job_threshold_secs: 3600,
            reaper_cron: "0 */5 * * * *".into(),
        }
    }
}

pub const DEFAULT_POOL_SIZE: u32 = 8;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MINOR_VERSION: &str = "75";

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_minor_version() -> String {
    DEFAULT_MINOR_VERSION.into()
}
