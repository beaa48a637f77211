//! Shared utilities for QuoteLink crates.
//!
//! Currently this crate carries the resilience primitives used by the CRM
//! API layer. Modules here are generic: nothing in this crate knows about
//! the CRM wire protocol or credential handling.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

// Re-export commonly used types for convenience
pub use resilience::{
    SlidingWindowConfig, SlidingWindowConfigBuilder, SlidingWindowLimiter,
};
