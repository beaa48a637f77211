//! Crate-level infrastructure errors
//!
//! Distinct from [`crate::api::CallError`]: `InfraError` covers failures in
//! the surrounding plumbing (configuration loading, settings storage),
//! while `CallError` carries the CRM API retry contract.

use thiserror::Error;

/// Infrastructure operation errors
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}
