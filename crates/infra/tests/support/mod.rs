//! Shared helpers for the wiremock-backed integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use quotelink_common::resilience::SlidingWindowLimiter;
use quotelink_infra::{CrmClient, CrmClientConfig, Credentials, MemorySettingsStore};

/// Credentials pointing at the mock server's REST prefix
pub fn valid_credentials(server_uri: &str) -> Credentials {
    Credentials::new(
        "example.crm.test",
        "old-token",
        "old-refresh",
        3600,
        format!("{server_uri}/rest/"),
    )
}

/// Client wired to the mock server with a generous rate limit and a short
/// network retry delay so suites stay fast.
pub fn build_client(server_uri: &str) -> (Arc<CrmClient>, Arc<MemorySettingsStore>) {
    build_client_with(server_uri, valid_credentials(server_uri), |_| {})
}

pub fn build_client_with(
    server_uri: &str,
    credentials: Credentials,
    tweak: impl FnOnce(&mut CrmClientConfig),
) -> (Arc<CrmClient>, Arc<MemorySettingsStore>) {
    let mut config = CrmClientConfig {
        token_url: format!("{server_uri}/oauth/token/"),
        client_id: "app.local".to_string(),
        client_secret: "s3cret".to_string(),
        network_retry_delay: Duration::from_millis(50),
        ..CrmClientConfig::default()
    };
    tweak(&mut config);

    let store = Arc::new(MemorySettingsStore::new());
    let limiter = SlidingWindowLimiter::new(50, Duration::from_millis(1000)).unwrap();

    let client = CrmClient::builder()
        .config(config)
        .credentials(credentials)
        .settings(store.clone())
        .limiter(limiter)
        .build()
        .unwrap();

    (Arc::new(client), store)
}
