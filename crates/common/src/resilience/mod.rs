//! Resilience patterns for controlling outbound request rates
//!
//! This module provides a **sliding-window rate limiter** that enforces a
//! hard cap on the number of admissions within any rolling time window.
//! Unlike a token bucket it never allows bursts past the cap: the limiter
//! tracks the timestamp of every recent admission and suspends callers
//! until the oldest one falls out of the window.
//!
//! The limiter is `Clone`; clones share the same window, so a single
//! instance cloned into every client enforces one global quota.

pub mod rate_limiter;

// Re-export rate limiter types
pub use rate_limiter::{SlidingWindowConfig, SlidingWindowConfigBuilder, SlidingWindowLimiter};
