//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports are the seams between the caching core and its collaborators:
//! the backend REST API, the session's identity source, durable storage,
//! and the wall clock.

mod clock;
mod fetcher;
mod identity;
mod storage;

pub use clock::{Clock, SystemClock};
pub use fetcher::{
    CompanyDirectory, DetailFetcher, DetailView, MembershipFetcher, MutationOutcome, QuoteFetcher,
};
pub use identity::IdentityProvider;
pub use storage::{KeyValueStore, StoredEnvelope};
