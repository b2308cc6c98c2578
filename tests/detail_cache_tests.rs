//! Integration tests for the detail cache: strict TTL, single-flight
//! deduplication, owner checks, and atomic replacement.

use std::sync::Arc;

use chrono::Duration;

use carteira_core::adapter::MemoryStore;
use carteira_core::domain::UserId;
use carteira_core::port::DetailView;
use carteira_core::service::DetailCache;
use carteira_core::testkit::{ManualClock, StubDetailFetcher};

const TTL_SECS: i64 = 300;

struct Harness {
    cache: Arc<DetailCache>,
    fetcher: Arc<StubDetailFetcher>,
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    user: UserId,
}

fn harness(view: DetailView) -> Harness {
    let fetcher = Arc::new(StubDetailFetcher::new());
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(DetailCache::new(
        view,
        fetcher.clone(),
        store.clone(),
        clock.clone(),
        Duration::seconds(TTL_SECS),
    ));
    Harness {
        cache,
        fetcher,
        clock,
        store,
        user: UserId::random(),
    }
}

#[tokio::test]
async fn cached_payload_served_within_ttl() {
    let h = harness(DetailView::Watchlist);
    h.fetcher.set_tickers(DetailView::Watchlist, &["PETR4", "VALE3"]);

    let first = h.cache.get(&h.user, false).await;
    assert_eq!(first.len(), 2);
    assert_eq!(h.fetcher.calls(DetailView::Watchlist), 1);

    // t0 + 299s: still fresh, zero network calls.
    h.clock.advance_secs(TTL_SECS - 1);
    let cached = h.cache.get(&h.user, false).await;
    assert_eq!(cached, first);
    assert_eq!(h.fetcher.calls(DetailView::Watchlist), 1);
}

#[tokio::test]
async fn expired_entry_triggers_exactly_one_fetch() {
    let h = harness(DetailView::Watchlist);
    h.fetcher.set_tickers(DetailView::Watchlist, &["PETR4"]);

    h.cache.get(&h.user, false).await;

    // t0 + 301s: past TTL, treated as absent.
    h.clock.advance_secs(TTL_SECS + 1);
    h.cache.get(&h.user, false).await;
    assert_eq!(h.fetcher.calls(DetailView::Watchlist), 2);
}

#[tokio::test]
async fn force_refresh_always_fetches() {
    let h = harness(DetailView::Portfolio);
    h.cache.get(&h.user, false).await;
    h.cache.get(&h.user, true).await;
    assert_eq!(h.fetcher.calls(DetailView::Portfolio), 2);
}

#[tokio::test]
async fn invalidate_drops_entry_and_durable_envelope() {
    let h = harness(DetailView::Portfolio);
    h.fetcher.set_tickers(DetailView::Portfolio, &["PETR4"]);
    h.cache.get(&h.user, false).await;
    assert!(!h.store.is_empty());

    h.cache.invalidate(&h.user);
    assert!(h.store.is_empty());

    h.cache.get(&h.user, false).await;
    assert_eq!(h.fetcher.calls(DetailView::Portfolio), 2);
}

#[tokio::test]
async fn entry_of_other_user_is_invisible() {
    let h = harness(DetailView::Portfolio);
    h.fetcher.set_tickers(DetailView::Portfolio, &["PETR4"]);
    h.cache.get(&h.user, false).await;

    let other = UserId::random();
    h.cache.get(&other, false).await;
    assert_eq!(h.fetcher.calls(DetailView::Portfolio), 2);
}

#[tokio::test]
async fn durable_envelope_adopted_by_new_instance() {
    let h = harness(DetailView::Watchlist);
    h.fetcher.set_tickers(DetailView::Watchlist, &["ITUB4"]);
    h.cache.get(&h.user, false).await;

    let reloaded = DetailCache::new(
        DetailView::Watchlist,
        h.fetcher.clone(),
        h.store.clone(),
        h.clock.clone(),
        Duration::seconds(TTL_SECS),
    );
    h.clock.advance_secs(10);
    let rows = reloaded.get(&h.user, false).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(h.fetcher.calls(DetailView::Watchlist), 1);
}

#[tokio::test]
async fn stale_envelope_never_served_as_fallback() {
    let h = harness(DetailView::Watchlist);
    h.fetcher.set_tickers(DetailView::Watchlist, &["ITUB4"]);
    h.cache.get(&h.user, false).await;

    let reloaded = DetailCache::new(
        DetailView::Watchlist,
        h.fetcher.clone(),
        h.store.clone(),
        h.clock.clone(),
        Duration::seconds(TTL_SECS),
    );
    h.clock.advance_secs(TTL_SECS + 1);
    reloaded.get(&h.user, false).await;
    assert_eq!(h.fetcher.calls(DetailView::Watchlist), 2);
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
    let h = harness(DetailView::Portfolio);
    h.fetcher.set_tickers(DetailView::Portfolio, &["PETR4"]);
    let gate = h.fetcher.install_gate();

    let a = tokio::spawn({
        let cache = h.cache.clone();
        let user = h.user;
        async move { cache.get(&user, false).await }
    });
    let b = tokio::spawn({
        let cache = h.cache.clone();
        let user = h.user;
        async move { cache.get(&user, false).await }
    });

    // Enough permits for two fetches; only one should be consumed.
    gate.add_permits(2);
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert_eq!(a, b);
    assert_eq!(h.fetcher.calls(DetailView::Portfolio), 1);
}

#[tokio::test]
async fn fetch_failure_leaves_cache_usable() {
    let h = harness(DetailView::Portfolio);
    h.fetcher.fail(true);

    let rows = h.cache.get(&h.user, false).await;
    assert!(rows.is_empty());
    assert!(h.cache.last_error().is_some());

    h.fetcher.fail(false);
    h.fetcher.set_tickers(DetailView::Portfolio, &["PETR4"]);
    let rows = h.cache.get(&h.user, false).await;
    assert_eq!(rows.len(), 1);
    assert!(h.cache.last_error().is_none());
}

#[tokio::test]
async fn fetch_failure_does_not_clobber_durable_entry() {
    let h = harness(DetailView::Portfolio);
    h.fetcher.set_tickers(DetailView::Portfolio, &["PETR4"]);
    h.cache.get(&h.user, false).await;

    h.fetcher.fail(true);
    h.cache.get(&h.user, true).await;

    // The previous envelope is still adoptable by a fresh instance.
    let reloaded = DetailCache::new(
        DetailView::Portfolio,
        h.fetcher.clone(),
        h.store.clone(),
        h.clock.clone(),
        Duration::seconds(TTL_SECS),
    );
    h.fetcher.fail(false);
    let rows = reloaded.get(&h.user, false).await;
    assert_eq!(rows.len(), 1);
}
