#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Client for NGO monthly reporting.
//!
//! This crate re-exports the core types and the HTTP gateway, and provides a
//! [`ReportsClient`] that combines them with caching, job polling and
//! one-at-a-time writes.
//!
//! # Features
//!
//! - `http` - HTTP gateway and [`ReportsClient::connect`] (default)
//!
//! # Example
//!
//! ```rust,ignore
//! use reports::{ClientConfig, DashboardView, Month, ReportsClient};
//!
//! #[tokio::main]
//! async fn main() -> reports::Result<()> {
//!     let (client, _notices) = ReportsClient::connect(ClientConfig::load()?)?;
//!
//!     match client.dashboard(Month::current()).await {
//!         DashboardView::Loaded(snapshot) => println!("{snapshot:?}"),
//!         DashboardView::Empty { month } => println!("No reports for {month}"),
//!         DashboardView::Failed { message, .. } => eprintln!("{message}"),
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Client facade.
pub mod client;
/// Client configuration.
pub mod config;
/// Dashboard read outcome.
pub mod dashboard;
/// Report form state.
pub mod form;
/// One-at-a-time write operations.
pub mod mutation;
/// User-facing notices.
pub mod notify;
/// Ingestion job polling.
pub mod poll;

#[cfg(test)]
mod test_support;

// Core types and traits
pub use reports_core::*;

// Caching
pub use reports_cache::{CacheEntry, FetchStatus, QueryCache, QueryOptions, RetryPolicy};

// Gateways
#[cfg(feature = "http")]
pub use reports_http::HttpGateway;

pub use client::ReportsClient;
pub use config::ClientConfig;
pub use dashboard::DashboardView;
pub use form::ReportForm;
pub use mutation::{Mutation, MutationFailure, MutationState, MutationStatus};
pub use notify::{Notice, Notices, Notifier, Severity};
pub use poll::{JobPoller, PollState};
