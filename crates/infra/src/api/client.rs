//! Reliable CRM API client
//!
//! Executes one logical call with end-to-end reliability semantics: rate
//! limiting, error classification against the policy table, token refresh,
//! and a shared retry budget across API-error and network-failure retries.
//! Callers see either the success payload or one terminal [`CallError`];
//! intermediate attempts never surface.

use std::sync::Arc;
use std::time::Duration;

use quotelink_common::resilience::SlidingWindowLimiter;
use reqwest::Client as ReqwestClient;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::credentials::Credentials;
use super::errors::{classify, CallError, RecommendedAction};
use crate::storage::SettingsStore;

/// Additional attempts beyond the first for one logical call
pub const MAX_RETRIES: u32 = 3;

/// Fixed identifying user-agent header
const DEFAULT_USER_AGENT: &str = "QuoteLink/0.1";

/// Configuration for the CRM client
#[derive(Debug, Clone)]
pub struct CrmClientConfig {
    /// Identifying user-agent sent with every request
    pub user_agent: String,
    /// OAuth token endpoint for refresh (e.g. "https://oauth.host/oauth/token/")
    pub token_url: String,
    /// OAuth client id; required for refresh
    pub client_id: String,
    /// OAuth client secret; required for refresh
    pub client_secret: String,
    /// Additional attempts beyond the first, shared across retry classes
    pub max_retries: u32,
    /// Pause before retrying a transient network failure
    pub network_retry_delay: Duration,
}

impl Default for CrmClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            token_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            max_retries: MAX_RETRIES,
            network_retry_delay: Duration::from_millis(1000),
        }
    }
}

/// CRM API client with retry, refresh and rate limiting
///
/// Cheap to share behind an `Arc`; the rate limiter handle it holds is a
/// clone of the process-wide limiter owned by the composition root, so all
/// clients pace against one quota.
pub struct CrmClient {
    http: ReqwestClient,
    limiter: SlidingWindowLimiter,
    credentials: Arc<RwLock<Credentials>>,
    settings: Arc<dyn SettingsStore>,
    config: CrmClientConfig,
    // Serializes refreshes so concurrent expired-token discoveries coalesce
    refresh_gate: Mutex<()>,
}

impl CrmClient {
    /// Create a builder for fluent configuration
    pub fn builder() -> CrmClientBuilder {
        CrmClientBuilder::default()
    }

    /// Snapshot of the current credentials
    pub async fn credentials(&self) -> Credentials {
        self.credentials.read().await.clone()
    }

    /// Execute one logical call against the CRM
    ///
    /// `params` must be a JSON object (or null for parameterless methods);
    /// the access token is merged in as `auth`. Retryable conditions
    /// (expired tokens, quota errors, CRM-internal errors, transport
    /// failures, 5xx statuses) are resolved internally within a budget of
    /// `max_retries` additional attempts. Terminal failures surface as one
    /// structured [`CallError`].
    #[instrument(skip(self, params), fields(method = %method))]
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(CallError::from_code(
                    "invalid_params",
                    "call params must be a JSON object",
                ))
            }
        };

        let mut attempt: u32 = 0;

        loop {
            let (url, body) = {
                let credentials = self.credentials.read().await;
                if !credentials.is_callable() {
                    return Err(CallError::config(
                        "credentials are missing a domain or access token",
                    ));
                }

                let url = format!("{}{}.json", credentials.endpoint, method);
                let mut body = params.clone();
                body.insert("auth".to_string(), Value::String(credentials.access_token.clone()));
                (url, Value::Object(body))
            };

            self.limiter.acquire().await;

            debug!(attempt, %url, "sending CRM request");

            let response = match self.http.post(&url).json(&body).send().await {
                Ok(response) => response,
                Err(cause) => {
                    if attempt < self.config.max_retries {
                        warn!(attempt, error = %cause, "transport failure, retrying");
                        tokio::time::sleep(self.config.network_retry_delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(CallError::network(attempt + 1, cause));
                }
            };

            let status = response.status();
            if !status.is_success() {
                // 5xx statuses ride the transient-network budget; every
                // other non-2xx status is terminal immediately.
                let text = response.text().await.unwrap_or_default();
                if status.is_server_error() && attempt < self.config.max_retries {
                    warn!(attempt, %status, "server error status, retrying");
                    tokio::time::sleep(self.config.network_retry_delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(CallError::http_status(status.as_u16(), text));
            }

            let payload: Value = match response.json().await {
                Ok(payload) => payload,
                Err(cause) => {
                    if attempt < self.config.max_retries {
                        warn!(attempt, error = %cause, "malformed response body, retrying");
                        tokio::time::sleep(self.config.network_retry_delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(CallError::network(attempt + 1, cause));
                }
            };

            if payload.get("error").is_none() {
                info!(attempt, "CRM call succeeded");
                return Ok(payload);
            }

            let error = classify(&payload);
            debug!(
                code = %error.code,
                retryable = error.retryable,
                action = %error.action,
                "classified API error"
            );

            if error.recommended_action() == RecommendedAction::Refresh {
                self.refresh_credentials().await?;
            }

            if error.is_retryable() && attempt < self.config.max_retries {
                let delay = error.retry_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
                continue;
            }

            return Err(error);
        }
    }

    /// Refresh the access token through the OAuth token endpoint
    ///
    /// Requires client id/secret configuration; failure there never touches
    /// the network. On success the token triple is persisted through the
    /// settings store first and only then applied in memory, so a persist
    /// failure leaves the credentials unchanged. Refresh requests are not
    /// rate-limited.
    #[instrument(skip(self))]
    pub async fn refresh_credentials(&self) -> Result<(), CallError> {
        if self.config.client_id.is_empty()
            || self.config.client_secret.is_empty()
            || self.config.token_url.is_empty()
        {
            return Err(CallError::config(
                "token refresh requires client id, client secret and token URL",
            ));
        }

        let stale_token = self.credentials.read().await.access_token.clone();

        let _gate = self.refresh_gate.lock().await;

        // A concurrent call may have refreshed while we waited on the gate
        let refresh_token = {
            let credentials = self.credentials.read().await;
            if credentials.access_token != stale_token {
                debug!("token already refreshed by a concurrent call");
                return Ok(());
            }
            if credentials.refresh_token.is_empty() {
                return Err(CallError::refresh_failed("no refresh token stored"));
            }
            credentials.refresh_token.clone()
        };

        let mut url = Url::parse(&self.config.token_url)
            .map_err(|cause| CallError::config(format!("invalid token URL: {cause}")))?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("client_secret", &self.config.client_secret)
            .append_pair("refresh_token", &refresh_token);

        debug!("requesting new access token");

        let response = self.http.get(url).send().await.map_err(|cause| {
            CallError::refresh_failed(format!("token endpoint unreachable: {cause}"))
                .with_source(cause)
        })?;

        let payload: Value = response.json().await.map_err(|cause| {
            CallError::refresh_failed(format!("malformed token response: {cause}"))
                .with_source(cause)
        })?;

        if payload.get("error").is_some() {
            let api_error = classify(&payload);
            return Err(CallError::refresh_failed(format!(
                "token endpoint returned {}",
                api_error.code
            ))
            .with_source(api_error));
        }

        let access_token = payload
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| CallError::refresh_failed("token response missing access_token"))?;
        let new_refresh_token = payload
            .get("refresh_token")
            .and_then(Value::as_str)
            .ok_or_else(|| CallError::refresh_failed("token response missing refresh_token"))?;
        let expires_in = parse_expires_in(&payload)
            .ok_or_else(|| CallError::refresh_failed("token response missing expires_in"))?;

        // Persist first, commit to memory on success only
        let updated = {
            let mut snapshot = self.credentials.read().await.clone();
            snapshot.apply_refresh(
                access_token.to_string(),
                new_refresh_token.to_string(),
                expires_in,
            );
            snapshot
        };

        self.settings.save(&updated).await.map_err(|cause| {
            CallError::refresh_failed(format!("failed to persist refreshed tokens: {cause}"))
        })?;

        *self.credentials.write().await = updated;

        info!("access token refreshed");
        Ok(())
    }

    /// Handle on the shared rate limiter
    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.limiter
    }
}

/// The token endpoint reports `expires_in` as a number or numeric string
fn parse_expires_in(payload: &Value) -> Option<i64> {
    match payload.get("expires_in")? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

/// Builder for [`CrmClient`]
#[derive(Default)]
pub struct CrmClientBuilder {
    config: Option<CrmClientConfig>,
    credentials: Option<Credentials>,
    settings: Option<Arc<dyn SettingsStore>>,
    limiter: Option<SlidingWindowLimiter>,
}

impl CrmClientBuilder {
    /// Set the client configuration
    pub fn config(mut self, config: CrmClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the initial credentials (from installation or the settings store)
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the settings store that owns credential durability
    pub fn settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Inject the shared rate limiter handle
    pub fn limiter(mut self, limiter: SlidingWindowLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns a configuration error if credentials or settings store are
    /// missing, or if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<CrmClient, CallError> {
        let config = self.config.unwrap_or_default();
        let credentials =
            self.credentials.ok_or_else(|| CallError::config("credentials not set"))?;
        let settings = self.settings.ok_or_else(|| CallError::config("settings store not set"))?;
        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => SlidingWindowLimiter::with_config(Default::default())
                .map_err(CallError::config)?,
        };

        let http = ReqwestClient::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|cause| {
                CallError::config(format!("failed to build HTTP client: {cause}"))
            })?;

        Ok(CrmClient {
            http,
            limiter,
            credentials: Arc::new(RwLock::new(credentials)),
            settings,
            config,
            refresh_gate: Mutex::new(()),
        })
    }
}
