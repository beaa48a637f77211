//! CRM REST API client layer
//!
//! The reliability core of QuoteLink: every outbound CRM call goes through
//! [`CrmClient::call`], which rate-limits, classifies API errors against a
//! static policy table, refreshes expired tokens and retries transient
//! failures within a shared attempt budget. [`BatchExecutor`] layers the
//! CRM batch protocol on top of the same path.

pub mod batch;
pub mod client;
pub mod credentials;
pub mod errors;

// Re-export commonly used items
pub use batch::{BatchCommand, BatchExecutor, BatchOutcome, BATCH_COUNT};
pub use client::{CrmClient, CrmClientBuilder, CrmClientConfig, MAX_RETRIES};
pub use credentials::Credentials;
pub use errors::{classify, CallError, ErrorPolicy, RecommendedAction};
