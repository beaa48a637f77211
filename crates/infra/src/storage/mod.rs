//! Credential persistence port
//!
//! Durable storage for CRM credentials is an external collaborator (the
//! host application owns a key-value store). This module defines the port
//! the API client persists through, plus an in-memory implementation used
//! for composition roots without durable storage and for tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::api::Credentials;
use crate::errors::InfraError;

/// Port for loading and persisting CRM credentials
///
/// Implementations merge-and-persist: `save` replaces the stored credential
/// set wholesale, `load` returns the last saved set if any.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the stored credentials, if any
    async fn load(&self) -> Result<Option<Credentials>, InfraError>;

    /// Persist the given credentials, replacing any previous set
    async fn save(&self, credentials: &Credentials) -> Result<(), InfraError>;

    /// Remove the stored credentials
    async fn clear(&self) -> Result<(), InfraError>;
}

/// In-memory settings store
///
/// Loses state on process exit; production deployments wire a durable
/// implementation instead.
#[derive(Default)]
pub struct MemorySettingsStore {
    inner: RwLock<Option<Credentials>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with credentials
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { inner: RwLock::new(Some(credentials)) }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Option<Credentials>, InfraError> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), InfraError> {
        *self.inner.write().await = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), InfraError> {
        *self.inner.write().await = None;
        Ok(())
    }
}
