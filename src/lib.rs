//! carteira-core - Client-side caching and invalidation for a portfolio app.
//!
//! This crate keeps several independently-fetched views of a stock
//! portfolio/watchlist application consistent with server state while
//! minimizing redundant network calls.
//!
//! # Architecture
//!
//! Four coordinated pieces sit behind a per-login [`service::Session`]:
//!
//! - [`service::MembershipCache`] - which tickers belong to the portfolio and
//!   watchlist, with optimistic add/remove mutations and an explicit
//!   commit/rollback lifecycle
//! - [`service::DetailCache`] - TTL-bound joined display rows, one instance
//!   per view, persisted through a key-value store
//! - [`service::InvalidationBridge`] - write-through invalidation from
//!   membership mutations to detail refreshes, no polling
//! - [`service::StockView`] - the single-ticker page state machine with
//!   generation-tagged fetches
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`domain`] - Backend-agnostic types: tickers, membership sets, rows, series
//! - [`error`] - Error types for the crate
//! - [`port`] - Trait seams: fetchers, storage, clock, identity
//! - [`adapter`] - REST API client and key-value store implementations
//! - [`service`] - The caches, bridge, view state machine, and session wiring
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use carteira_core::adapter::{ApiClient, MemoryStore};
//! use carteira_core::config::Config;
//! use carteira_core::domain::UserId;
//! use carteira_core::port::SystemClock;
//! use carteira_core::service::{Session, SessionDeps};
//!
//! # fn identity() -> Arc<dyn carteira_core::port::IdentityProvider> { unimplemented!() }
//! let config = Config::default();
//! let api = Arc::new(ApiClient::new(config.network.api_url.clone()));
//! let deps = SessionDeps {
//!     membership_fetcher: api.clone(),
//!     detail_fetcher: api.clone(),
//!     quotes: api.clone(),
//!     directory: api,
//!     identity: identity(),
//!     store: Arc::new(MemoryStore::new()),
//!     clock: Arc::new(SystemClock),
//! };
//! let session = Session::new(UserId::random(), deps, &config);
//! ```

pub mod adapter;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;
pub mod service;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
