//! Per-view detail cache: TTL-bound joined rows, durably persisted.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{DetailRow, UserId};
use crate::port::{Clock, DetailFetcher, DetailView, KeyValueStore, StoredEnvelope};

/// One cached payload for one (user, view).
#[derive(Debug, Clone)]
pub struct DetailCacheEntry {
    pub payload: Vec<DetailRow>,
    pub captured_at: DateTime<Utc>,
    pub owner: UserId,
}

/// Durable form of an entry; the capture time rides in the envelope.
#[derive(Debug, Serialize, Deserialize)]
struct DetailSnapshot {
    owner: UserId,
    rows: Vec<DetailRow>,
}

/// TTL-bound cache of fully joined display rows for one view.
///
/// Exactly one entry exists per (user, view); replacement is atomic — the
/// payload and capture time are swapped in one write, and the durable
/// envelope carries both in a single value. An entry past the TTL is treated
/// as absent, never served stale: for financial data an extra fetch beats a
/// wrong price.
///
/// Concurrent `get`s share one in-flight fetch per instance: callers that
/// queue behind an identical fetch adopt its result instead of issuing
/// another request.
pub struct DetailCache {
    view: DetailView,
    entry: RwLock<Option<DetailCacheEntry>>,
    fetcher: Arc<dyn DetailFetcher>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    inflight: Mutex<()>,
    last_error: RwLock<Option<String>>,
}

impl DetailCache {
    #[must_use]
    pub fn new(
        view: DetailView,
        fetcher: Arc<dyn DetailFetcher>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            view,
            entry: RwLock::new(None),
            fetcher,
            store,
            clock,
            ttl,
            inflight: Mutex::new(()),
            last_error: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn view(&self) -> DetailView {
        self.view
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Capture time of the current entry, if fresh for `user`.
    #[must_use]
    pub fn captured_at(&self, user: &UserId) -> Option<DateTime<Utc>> {
        let entry = self.entry.read();
        entry
            .as_ref()
            .filter(|e| self.is_fresh(e, user))
            .map(|e| e.captured_at)
    }

    /// Return rows for `user`, fetching only when the cache cannot answer.
    ///
    /// Resolution order: fresh in-memory entry, fresh durable envelope, then
    /// exactly one network fetch. A fetch failure leaves the previous entry
    /// untouched, records the message in [`last_error`](Self::last_error) and
    /// returns empty rows.
    pub async fn get(&self, user: &UserId, force_refresh: bool) -> Vec<DetailRow> {
        if !force_refresh {
            if let Some(rows) = self.fresh_rows(user) {
                debug!(view = %self.view, %user, "Detail cache hit");
                return rows;
            }
            if let Some(rows) = self.adopt_envelope(user) {
                info!(view = %self.view, %user, "Detail entry adopted from durable storage");
                return rows;
            }
        }

        // Single-flight: whoever holds the lock fetches; everyone queued
        // behind re-checks and adopts the winner's entry.
        let _guard = self.inflight.lock().await;
        if !force_refresh {
            if let Some(rows) = self.fresh_rows(user) {
                debug!(view = %self.view, %user, "Adopted concurrent fetch result");
                return rows;
            }
        }

        match self.fetcher.fetch_view(self.view, user).await {
            Ok(rows) => {
                let entry = DetailCacheEntry {
                    payload: rows.clone(),
                    captured_at: self.clock.now(),
                    owner: *user,
                };
                self.persist(&entry);
                info!(view = %self.view, %user, rows = rows.len(), "Detail view refreshed");
                *self.entry.write() = Some(entry);
                *self.last_error.write() = None;
                rows
            }
            Err(e) => {
                warn!(view = %self.view, %user, error = %e, "Detail fetch failed");
                *self.last_error.write() = Some(e.to_string());
                Vec::new()
            }
        }
    }

    /// Drop the entry without fetching; the next `get` performs a real fetch.
    pub fn invalidate(&self, user: &UserId) {
        debug!(view = %self.view, %user, "Detail cache invalidated");
        *self.entry.write() = None;
        self.store.remove(&self.storage_key(user));
    }

    /// Drop the entry only when owned by `user`.
    ///
    /// Used after an account switch to discard a response that finished for
    /// a user who is no longer current.
    pub fn discard_if_owner(&self, user: &UserId) {
        let mut entry = self.entry.write();
        if entry.as_ref().is_some_and(|e| e.owner == *user) {
            *entry = None;
            self.store.remove(&self.storage_key(user));
        }
    }

    fn storage_key(&self, user: &UserId) -> String {
        format!("{}_{user}", self.view.storage_prefix())
    }

    fn is_fresh(&self, entry: &DetailCacheEntry, user: &UserId) -> bool {
        entry.owner == *user && self.clock.now() - entry.captured_at <= self.ttl
    }

    fn fresh_rows(&self, user: &UserId) -> Option<Vec<DetailRow>> {
        let entry = self.entry.read();
        entry
            .as_ref()
            .filter(|e| self.is_fresh(e, user))
            .map(|e| e.payload.clone())
    }

    fn adopt_envelope(&self, user: &UserId) -> Option<Vec<DetailRow>> {
        let key = self.storage_key(user);
        let raw = self.store.get(&key)?;

        let envelope = match StoredEnvelope::<DetailSnapshot>::from_json(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(view = %self.view, %user, error = %e, "Corrupt detail envelope, discarding");
                self.store.remove(&key);
                return None;
            }
        };

        let entry = DetailCacheEntry {
            payload: envelope.data.rows,
            captured_at: envelope.timestamp,
            owner: envelope.data.owner,
        };
        if !self.is_fresh(&entry, user) {
            return None;
        }

        let rows = entry.payload.clone();
        *self.entry.write() = Some(entry);
        Some(rows)
    }

    fn persist(&self, entry: &DetailCacheEntry) {
        let snapshot = DetailSnapshot {
            owner: entry.owner,
            rows: entry.payload.clone(),
        };
        let envelope = StoredEnvelope::new(snapshot, entry.captured_at);
        match envelope.to_json() {
            Ok(json) => self.store.set(&self.storage_key(&entry.owner), json),
            Err(e) => warn!(view = %self.view, error = %e, "Failed to persist detail entry"),
        }
    }
}
