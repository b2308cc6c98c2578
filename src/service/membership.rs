//! Membership cache: optimistic portfolio/watchlist membership per user.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::{
    MembershipKind, MembershipSet, MutationId, MutationOp, MutationRecord, MutationState, Ticker,
    UserId,
};
use crate::port::{Clock, KeyValueStore, MembershipFetcher, StoredEnvelope};

/// Notification sent on every `last_mutated` advance caused by a mutation.
#[derive(Debug, Clone)]
pub struct MembershipEvent {
    pub user: UserId,
    pub mutated_at: DateTime<Utc>,
}

/// Membership badge for one search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipBadge {
    pub ticker: Ticker,
    pub in_portfolio: bool,
    pub in_watchlist: bool,
}

/// Optimistic, TTL-bound membership cache.
///
/// Holds which tickers belong to the user's portfolio and watchlist.
/// Mutations apply synchronously and may run ahead of the server; the caller
/// settles each one via [`commit`](Self::commit) or
/// [`roll_back`](Self::roll_back) once the write request resolves.
///
/// Network failures during [`load`](Self::load) never escape: the cache keeps
/// its previous state and records the message in
/// [`last_error`](Self::last_error).
pub struct MembershipCache {
    inner: RwLock<Option<MembershipSet>>,
    mutations: RwLock<HashMap<MutationId, MutationRecord>>,
    fetcher: Arc<dyn MembershipFetcher>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    tx: broadcast::Sender<MembershipEvent>,
    is_loading: AtomicBool,
    last_error: RwLock<Option<String>>,
}

fn storage_key(user: &UserId) -> String {
    format!("membership_{user}")
}

impl MembershipCache {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn MembershipFetcher>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        let (tx, _) = broadcast::channel(32);
        Self {
            inner: RwLock::new(None),
            mutations: RwLock::new(HashMap::new()),
            fetcher,
            store,
            clock,
            ttl,
            tx,
            is_loading: AtomicBool::new(false),
            last_error: RwLock::new(None),
        }
    }

    /// Subscribe to mutation notifications (the invalidation bridge's input).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.tx.subscribe()
    }

    /// Pure O(1) membership lookup; `false` when nothing is loaded.
    #[must_use]
    pub fn is_member(&self, kind: MembershipKind, ticker: &Ticker) -> bool {
        self.inner
            .read()
            .as_ref()
            .is_some_and(|set| set.is_member(kind, ticker))
    }

    /// Badges for a batch of search results, answered entirely from cache.
    #[must_use]
    pub fn badges(&self, tickers: &[Ticker]) -> Vec<MembershipBadge> {
        let inner = self.inner.read();
        tickers
            .iter()
            .map(|ticker| MembershipBadge {
                ticker: ticker.clone(),
                in_portfolio: inner
                    .as_ref()
                    .is_some_and(|s| s.is_member(MembershipKind::Portfolio, ticker)),
                in_watchlist: inner
                    .as_ref()
                    .is_some_and(|s| s.is_member(MembershipKind::Watchlist, ticker)),
            })
            .collect()
    }

    /// Snapshot of the current set, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<MembershipSet> {
        self.inner.read().clone()
    }

    /// `last_mutated` of the current set, if any.
    #[must_use]
    pub fn last_mutated(&self) -> Option<DateTime<Utc>> {
        self.inner.read().as_ref().map(|s| s.last_mutated)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::SeqCst)
    }

    /// Apply a mutation synchronously and advance `last_mutated`.
    ///
    /// Cannot fail. Returns the id of the recorded `Pending` mutation; the
    /// caller fires the matching network write alongside and settles the
    /// record from its outcome.
    pub fn mutate_optimistic(
        &self,
        user: &UserId,
        kind: MembershipKind,
        ticker: Ticker,
        op: MutationOp,
    ) -> MutationId {
        let now = self.clock.now();
        let mutated_at = {
            let mut inner = self.inner.write();
            if inner.as_ref().is_some_and(|set| set.owner != *user) {
                // A leftover set from another account is never mutated into.
                *inner = None;
            }
            let set = inner.get_or_insert_with(|| MembershipSet::empty(*user, now));
            set.apply(kind, ticker.clone(), op, now);
            // The durable snapshot tracks every mutation, so a reload within
            // the TTL adopts the optimistic set, not the pre-mutation one.
            self.persist(set);
            set.last_mutated
        };

        let id = MutationId::random();
        self.mutations.write().insert(
            id,
            MutationRecord {
                id,
                kind,
                ticker: ticker.clone(),
                op,
                state: MutationState::Pending,
            },
        );

        debug!(%ticker, %kind, ?op, %id, "Optimistic membership mutation applied");
        let _ = self.tx.send(MembershipEvent {
            user: *user,
            mutated_at,
        });
        id
    }

    /// Mark a pending mutation as confirmed by the server.
    pub fn commit(&self, id: MutationId) {
        if let Some(record) = self.mutations.write().get_mut(&id) {
            if record.state == MutationState::Pending {
                record.state = MutationState::Committed;
            }
        }
    }

    /// Undo a pending mutation the server rejected.
    ///
    /// Re-applies the inverse op and advances `last_mutated`, so subscribed
    /// detail views refresh back to server truth.
    pub fn roll_back(&self, user: &UserId, id: MutationId) {
        let record = {
            let mut mutations = self.mutations.write();
            match mutations.get_mut(&id) {
                Some(record) if record.state == MutationState::Pending => {
                    record.state = MutationState::RolledBack;
                    record.clone()
                }
                _ => return,
            }
        };

        warn!(ticker = %record.ticker, kind = %record.kind, %id, "Rolling back rejected mutation");

        let now = self.clock.now();
        let mutated_at = {
            let mut inner = self.inner.write();
            let Some(set) = inner.as_mut().filter(|s| s.owner == *user) else {
                return;
            };
            set.apply(record.kind, record.ticker, record.op.inverse(), now);
            self.persist(set);
            set.last_mutated
        };

        let _ = self.tx.send(MembershipEvent {
            user: *user,
            mutated_at,
        });
    }

    /// Settlement state of a recorded mutation.
    #[must_use]
    pub fn mutation_state(&self, id: MutationId) -> Option<MutationState> {
        self.mutations.read().get(&id).map(|r| r.state)
    }

    /// Load membership for a user.
    ///
    /// Adopts the durable snapshot synchronously when it is owned by `user`,
    /// fresher than the TTL, and `force_refresh` is false; otherwise fetches
    /// the portfolio and watchlist summaries concurrently, replaces the set
    /// with the fused result and persists it.
    ///
    /// Loading does not fire membership events: a freshly loaded set is not a
    /// mutation, and detail views fetch on their own mount.
    pub async fn load(&self, user: &UserId, force_refresh: bool) {
        if !force_refresh && self.has_fresh_set(user) {
            debug!(%user, "Membership cache fresh, skipping load");
            return;
        }

        if !force_refresh && self.adopt_snapshot(user) {
            info!(%user, "Membership adopted from durable snapshot");
            return;
        }

        if self.is_loading.swap(true, Ordering::SeqCst) {
            debug!(%user, "Membership load already in flight");
            return;
        }

        let result = tokio::join!(
            self.fetcher.fetch_portfolio(user),
            self.fetcher.fetch_watchlist(user)
        );

        match result {
            (Ok(portfolio), Ok(watchlist)) => {
                let now = self.clock.now();
                let mut set = MembershipSet::empty(*user, now);
                set.portfolio = portfolio.into_iter().map(|r| r.ticker).collect();
                set.watchlist = watchlist.into_iter().map(|r| r.ticker).collect();

                self.persist(&set);
                info!(
                    %user,
                    portfolio = set.portfolio.len(),
                    watchlist = set.watchlist.len(),
                    "Membership refreshed from server"
                );
                *self.inner.write() = Some(set);
                *self.last_error.write() = None;
            }
            (Err(e), _) | (_, Err(e)) => {
                // Previous state stays; the error surfaces via last_error.
                warn!(%user, error = %e, "Membership load failed");
                *self.last_error.write() = Some(e.to_string());
            }
        }

        self.is_loading.store(false, Ordering::SeqCst);
    }

    /// Drop the in-memory set and the durable snapshot for a user.
    pub fn clear(&self, user: &UserId) {
        *self.inner.write() = None;
        self.mutations.write().clear();
        self.store.remove(&storage_key(user));
    }

    fn has_fresh_set(&self, user: &UserId) -> bool {
        let inner = self.inner.read();
        inner.as_ref().is_some_and(|set| {
            set.owner == *user && self.clock.now() - set.last_mutated <= self.ttl
        })
    }

    /// Adopt the durable snapshot if owned and fresh. Synchronous, no I/O
    /// beyond the key-value read.
    fn adopt_snapshot(&self, user: &UserId) -> bool {
        let Some(raw) = self.store.get(&storage_key(user)) else {
            return false;
        };

        let envelope = match StoredEnvelope::<MembershipSet>::from_json(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(%user, error = %e, "Corrupt membership snapshot, discarding");
                self.store.remove(&storage_key(user));
                return false;
            }
        };

        let now = self.clock.now();
        let fresh = envelope.data.owner == *user && now - envelope.timestamp <= self.ttl;
        if !fresh {
            return false;
        }

        let mut set = envelope.data;
        set.last_mutated = now;
        *self.inner.write() = Some(set);
        true
    }

    fn persist(&self, set: &MembershipSet) {
        let envelope = StoredEnvelope::new(set.clone(), set.last_mutated);
        match envelope.to_json() {
            Ok(json) => self.store.set(&storage_key(&set.owner), json),
            Err(e) => warn!(error = %e, "Failed to serialize membership snapshot"),
        }
    }
}
