//! # QuoteLink Infrastructure
//!
//! Reliability layer around the third-party CRM REST API.
//!
//! This crate contains:
//! - The CRM API client (`api::client`) with retry, token refresh and
//!   rate limiting
//! - Error classification driven by the CRM's error-code policy table
//! - Batch execution over the CRM's `batch` method
//! - The credential persistence port (`storage`)
//! - Environment-driven configuration (`config`)
//!
//! ## Architecture
//! - Resilience primitives come from `quotelink-common`
//! - Durable settings storage is an external collaborator consumed through
//!   the `SettingsStore` trait; only an in-memory implementation ships here
//! - Template/HTML rendering, routing and installation flows live outside
//!   this crate entirely

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod api;
pub mod config;
pub mod errors;
pub mod storage;

// Re-export commonly used items
pub use api::{
    classify, BatchCommand, BatchExecutor, BatchOutcome, CallError, CrmClient, CrmClientBuilder,
    CrmClientConfig, Credentials, ErrorPolicy, RecommendedAction,
};
pub use config::{load_from_env, AppConfig};
pub use errors::InfraError;
pub use storage::{MemorySettingsStore, SettingsStore};
