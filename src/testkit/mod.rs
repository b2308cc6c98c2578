//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`fetcher`] — Scripted implementations of the fetch ports with call
//!   counting and an optional gate to hold fetches in flight.
//! - [`clock`] — [`ManualClock`] for TTL boundary tests.
//! - [`identity`] — [`SwitchableIdentity`] for logout and account-switch
//!   scenarios.

mod clock;
mod fetcher;
mod identity;

pub use clock::ManualClock;
pub use fetcher::{
    series_for, StubDetailFetcher, StubDirectory, StubMembershipFetcher, StubQuoteFetcher,
};
pub use identity::SwitchableIdentity;
