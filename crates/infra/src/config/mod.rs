//! Configuration loading
//!
//! Loads the application configuration from environment variables.
//!
//! ## Environment Variables
//! - `QUOTELINK_CLIENT_ID`: OAuth client id (required)
//! - `QUOTELINK_CLIENT_SECRET`: OAuth client secret (required)
//! - `QUOTELINK_TOKEN_URL`: OAuth token endpoint URL (required)
//! - `QUOTELINK_USER_AGENT`: user-agent override (optional)
//! - `QUOTELINK_MAX_REQUESTS`: rate-limit quota per window (default 2)
//! - `QUOTELINK_WINDOW_MS`: rate-limit window in milliseconds (default 1000)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::api::client::CrmClientConfig;
use crate::errors::InfraError;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OAuth client id used for token refresh
    pub client_id: String,
    /// OAuth client secret used for token refresh
    pub client_secret: String,
    /// OAuth token endpoint
    pub token_url: String,
    /// Optional user-agent override
    pub user_agent: Option<String>,
    /// Rate-limit quota per rolling window
    pub max_requests: usize,
    /// Rate-limit rolling window
    pub window: Duration,
}

impl AppConfig {
    /// Derive the CRM client configuration from this application config
    pub fn crm_client_config(&self) -> CrmClientConfig {
        let mut config = CrmClientConfig {
            token_url: self.token_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            ..CrmClientConfig::default()
        };
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `InfraError::Config` if a required variable is missing or an
/// optional numeric variable fails to parse.
pub fn load_from_env() -> Result<AppConfig, InfraError> {
    let client_id = env_var("QUOTELINK_CLIENT_ID")?;
    let client_secret = env_var("QUOTELINK_CLIENT_SECRET")?;
    let token_url = env_var("QUOTELINK_TOKEN_URL")?;
    let user_agent = env::var("QUOTELINK_USER_AGENT").ok();
    let max_requests = optional_parsed("QUOTELINK_MAX_REQUESTS", 2usize)?;
    let window = Duration::from_millis(optional_parsed("QUOTELINK_WINDOW_MS", 1000u64)?);

    debug!("configuration loaded from environment variables");

    Ok(AppConfig { client_id, client_secret, token_url, user_agent, max_requests, window })
}

fn env_var(name: &str) -> Result<String, InfraError> {
    env::var(name)
        .map_err(|_| InfraError::Config(format!("missing required environment variable {name}")))
}

fn optional_parsed<T: FromStr>(name: &str, default: T) -> Result<T, InfraError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| InfraError::Config(format!("invalid value for {name}: {raw}"))),
        Err(_) => Ok(default),
    }
}
