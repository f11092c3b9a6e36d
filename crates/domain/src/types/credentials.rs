//! Per-company credentials for both external systems
//!
//! Plaintext copies only exist in memory for the duration of a job and are
//! wiped on drop. `Debug` output never includes secrets.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Password-grant credentials for the source ledger.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SourceCredentials {
    pub tenant_id: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Job-scoped bearer token from the source ledger. Never persisted.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SourceToken {
    pub access_token: String,
}

impl fmt::Debug for SourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceToken").field("access_token", &"[REDACTED]").finish()
    }
}

/// OAuth tokens issued by the target ledger.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TargetTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl fmt::Debug for TargetTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Realm plus current tokens for the target ledger.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TargetCredentials {
    pub realm_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl TargetCredentials {
    /// True when the access token expires within `window_secs` of `now`.
    pub fn expires_within(&self, window_secs: i64, now: i64) -> bool {
        self.expires_at - now <= window_secs
    }

    /// Copy of these credentials carrying freshly issued tokens.
    #[must_use]
    pub fn with_tokens(&self, tokens: &TargetTokens) -> Self {
        Self {
            realm_id: self.realm_id.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at,
        }
    }

    pub fn session(&self) -> TargetSession {
        TargetSession { realm_id: self.realm_id.clone(), access_token: self.access_token.clone() }
    }
}

impl fmt::Debug for TargetCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetCredentials")
            .field("realm_id", &self.realm_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Explicit per-call context for target ledger requests.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TargetSession {
    pub realm_id: String,
    pub access_token: String,
}

impl fmt::Debug for TargetSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSession")
            .field("realm_id", &self.realm_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}
