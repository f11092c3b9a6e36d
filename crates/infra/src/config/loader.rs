//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables (`LEDGERSYNC_*`)
//! 2. If any required variable is missing, the first config file found by
//!    [`probe_config_paths`] (TOML or JSON)
//!
//! ## Environment Variables
//! Required:
//! - `LEDGERSYNC_DB_PATH`
//! - `LEDGERSYNC_CREDENTIAL_KEY`
//! - `LEDGERSYNC_SOURCE_BASE_URL`, `LEDGERSYNC_SOURCE_CLIENT_CREDENTIALS`
//! - `LEDGERSYNC_TARGET_BASE_URL`, `LEDGERSYNC_TARGET_TOKEN_URL`,
//!   `LEDGERSYNC_TARGET_CLIENT_ID`, `LEDGERSYNC_TARGET_CLIENT_SECRET`
//!
//! Optional:
//! - `LEDGERSYNC_DB_POOL_SIZE`, `LEDGERSYNC_DB_ENCRYPTION_KEY`
//! - `LEDGERSYNC_SOURCE_TIMEOUT_SECS`
//! - `LEDGERSYNC_TARGET_MINOR_VERSION`, `LEDGERSYNC_TARGET_TIMEOUT_SECS`
//! - `LEDGERSYNC_WORKER_POLL_INTERVAL_SECS`, `LEDGERSYNC_WORKER_BATCH_SIZE`,
//!   `LEDGERSYNC_WORKER_JOB_TIMEOUT_SECS`,
//!   `LEDGERSYNC_WORKER_STALE_JOB_THRESHOLD_SECS`,
//!   `LEDGERSYNC_WORKER_REAPER_CRON`

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ledgersync_domain::{
    Config, DatabaseConfig, Result, SecurityConfig, SourceApiConfig, SyncError, TargetApiConfig,
    WorkerConfig, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MINOR_VERSION, DEFAULT_POOL_SIZE,
};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["ledgersync.toml", "ledgersync.json", "config.toml", "config.json"];

/// Load configuration from the environment, falling back to a file.
///
/// # Errors
/// Returns `SyncError::Configuration` when neither source yields a complete,
/// valid configuration.
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = %e, "environment incomplete, trying config file");
            load_from_file(None)?
        }
    };

    validate(&config)?;
    Ok(config)
}

/// Load configuration from `LEDGERSYNC_*` variables only.
pub fn load_from_env() -> Result<Config> {
    let defaults = WorkerConfig::default();

    Ok(Config {
        database: DatabaseConfig {
            path: env_var("LEDGERSYNC_DB_PATH")?,
            pool_size: env_parse("LEDGERSYNC_DB_POOL_SIZE", DEFAULT_POOL_SIZE)?,
            encryption_key: env_opt("LEDGERSYNC_DB_ENCRYPTION_KEY"),
        },
        security: SecurityConfig { credential_key: env_var("LEDGERSYNC_CREDENTIAL_KEY")? },
        source: SourceApiConfig {
            base_url: env_var("LEDGERSYNC_SOURCE_BASE_URL")?,
            client_credentials: env_var("LEDGERSYNC_SOURCE_CLIENT_CREDENTIALS")?,
            timeout_secs: env_parse("LEDGERSYNC_SOURCE_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        },
        target: TargetApiConfig {
            base_url: env_var("LEDGERSYNC_TARGET_BASE_URL")?,
            token_url: env_var("LEDGERSYNC_TARGET_TOKEN_URL")?,
            client_id: env_var("LEDGERSYNC_TARGET_CLIENT_ID")?,
            client_secret: env_var("LEDGERSYNC_TARGET_CLIENT_SECRET")?,
            minor_version: env_opt("LEDGERSYNC_TARGET_MINOR_VERSION")
                .unwrap_or_else(|| DEFAULT_MINOR_VERSION.to_string()),
            timeout_secs: env_parse("LEDGERSYNC_TARGET_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        },
        worker: WorkerConfig {
            poll_interval_secs: env_parse(
                "LEDGERSYNC_WORKER_POLL_INTERVAL_SECS",
                defaults.poll_interval_secs,
            )?,
            batch_size: env_parse("LEDGERSYNC_WORKER_BATCH_SIZE", defaults.batch_size)?,
            job_timeout_secs: env_parse(
                "LEDGERSYNC_WORKER_JOB_TIMEOUT_SECS",
                defaults.job_timeout_secs,
            )?,
            stale_job_threshold_secs: env_parse(
                "LEDGERSYNC_WORKER_STALE_JOB_THRESHOLD_SECS",
                defaults.stale_job_threshold_secs,
            )?,
            reaper_cron: env_opt("LEDGERSYNC_WORKER_REAPER_CRON").unwrap_or(defaults.reaper_cron),
        },
    })
}

/// Load configuration from `path`, or from the first probed location.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) if p.exists() => p,
        Some(p) => {
            return Err(SyncError::Configuration(format!(
                "config file not found: {}",
                p.display()
            )))
        }
        None => probe_config_paths().ok_or_else(|| {
            SyncError::Configuration("no config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SyncError::Configuration(format!("failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SyncError::Configuration(format!("invalid TOML config: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SyncError::Configuration(format!("invalid JSON config: {e}"))),
        other => Err(SyncError::Configuration(format!("unsupported config format: {other}"))),
    }
}

/// Cross-field checks that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    if config.security.credential_key.is_empty() {
        return Err(SyncError::Configuration("security.credential_key must not be empty".into()));
    }
    if config.worker.batch_size == 0 {
        return Err(SyncError::Configuration("worker.batch_size must be at least 1".into()));
    }
    if config.worker.poll_interval_secs == 0 {
        return Err(SyncError::Configuration("worker.poll_interval_secs must be at least 1".into()));
    }
    if config.worker.stale_job_threshold_secs < config.worker.job_timeout_secs {
        return Err(SyncError::Configuration(
            "worker.stale_job_threshold_secs must not be shorter than worker.job_timeout_secs"
                .into(),
        ));
    }
    Ok(())
}

/// Config file candidates: the working directory and two parents, then the
/// executable's directory and two parents.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.extend(exe_dir.ancestors().take(3).map(Path::to_path_buf));
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|candidate| candidate.is_file())
}

fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        SyncError::Configuration(format!("missing required environment variable: {key}"))
    })
}

/// Unset and blank are treated alike.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| SyncError::Configuration(format!("invalid value for {key}: {e}"))),
        None => Ok(default),
    }
}
