//! CRM credential set
//!
//! One credential set per CRM installation, created from the OAuth
//! handshake at install time and mutated in place whenever a token refresh
//! succeeds. Durability belongs to the [`crate::storage::SettingsStore`]
//! collaborator; this type only models the in-process state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth credentials plus the REST endpoint they are valid for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// CRM portal domain (e.g. "example.crm.test")
    pub domain: String,

    /// Access token sent as the `auth` parameter of every call
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    pub refresh_token: String,

    /// Access token lifetime in seconds, as reported by the token endpoint
    pub expires_in: i64,

    /// REST endpoint base URL, trailing slash included
    /// (e.g. "https://example.crm.test/rest/")
    pub endpoint: String,

    /// When the token triple was last replaced (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(
        domain: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in,
            endpoint: endpoint.into(),
            refreshed_at: None,
        }
    }

    /// Whether a call may be attempted with this credential set
    ///
    /// Missing domain or access token is a configuration fault, not a
    /// retryable one.
    pub fn is_callable(&self) -> bool {
        !self.domain.is_empty() && !self.access_token.is_empty()
    }

    /// Replace the token triple after a successful refresh
    pub(crate) fn apply_refresh(
        &mut self,
        access_token: String,
        refresh_token: String,
        expires_in: i64,
    ) {
        self.access_token = access_token;
        self.refresh_token = refresh_token;
        self.expires_in = expires_in;
        self.refreshed_at = Some(Utc::now());
    }
}
