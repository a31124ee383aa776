#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Fetch/cache orchestration for the reporting client.
//!
//! This crate provides:
//!
//! - [`QueryCache`] - Keyed cache with single-flight de-duplication and
//!   generation-based invalidation
//! - [`RetryPolicy`] - Bounded, exponential retry of transient failures

/// Keyed query cache.
pub mod query;
/// Retry policy for cached reads.
pub mod retry;

pub use query::{CacheEntry, FetchStatus, QueryCache, QueryOptions};
pub use retry::RetryPolicy;
