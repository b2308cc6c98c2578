//! Integration tests for the membership cache: optimistic mutations,
//! TTL-bound loading, durable snapshot adoption, and rollback.

use std::sync::Arc;

use chrono::Duration;

use carteira_core::adapter::MemoryStore;
use carteira_core::domain::{MembershipKind, MutationOp, MutationState, Ticker, UserId};
use carteira_core::service::MembershipCache;
use carteira_core::testkit::{ManualClock, StubMembershipFetcher};

const TTL_SECS: i64 = 300;

struct Harness {
    cache: MembershipCache,
    fetcher: Arc<StubMembershipFetcher>,
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    user: UserId,
}

fn harness() -> Harness {
    let fetcher = Arc::new(StubMembershipFetcher::new());
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(MemoryStore::new());
    let cache = MembershipCache::new(
        fetcher.clone(),
        store.clone(),
        clock.clone(),
        Duration::seconds(TTL_SECS),
    );
    Harness {
        cache,
        fetcher,
        clock,
        store,
        user: UserId::random(),
    }
}

#[tokio::test]
async fn optimistic_sequence_reflects_latest_call() {
    let h = harness();
    let petr4 = Ticker::new("PETR4");

    // No network response has arrived; every lookup must still reflect the
    // latest applied call.
    h.cache
        .mutate_optimistic(&h.user, MembershipKind::Portfolio, petr4.clone(), MutationOp::Add);
    assert!(h.cache.is_member(MembershipKind::Portfolio, &petr4));

    h.clock.advance_secs(1);
    h.cache.mutate_optimistic(
        &h.user,
        MembershipKind::Portfolio,
        petr4.clone(),
        MutationOp::Remove,
    );
    assert!(!h.cache.is_member(MembershipKind::Portfolio, &petr4));

    h.clock.advance_secs(1);
    h.cache
        .mutate_optimistic(&h.user, MembershipKind::Portfolio, petr4.clone(), MutationOp::Add);
    assert!(h.cache.is_member(MembershipKind::Portfolio, &petr4));

    assert_eq!(h.fetcher.mutation_calls(), 0);
}

#[tokio::test]
async fn load_fetches_both_summaries_and_persists() {
    let h = harness();
    h.fetcher.set_portfolio(&["PETR4", "VALE3"]);
    h.fetcher.set_watchlist(&["ITUB4"]);

    h.cache.load(&h.user, false).await;

    assert!(h.cache.is_member(MembershipKind::Portfolio, &Ticker::new("PETR4")));
    assert!(h.cache.is_member(MembershipKind::Watchlist, &Ticker::new("ITUB4")));
    assert!(!h.cache.is_member(MembershipKind::Portfolio, &Ticker::new("ITUB4")));
    assert_eq!(h.fetcher.summary_calls(), 2);
    assert!(!h.store.is_empty());
}

#[tokio::test]
async fn fresh_set_skips_network() {
    let h = harness();
    h.cache.load(&h.user, false).await;
    assert_eq!(h.fetcher.summary_calls(), 2);

    h.clock.advance_secs(TTL_SECS - 1);
    h.cache.load(&h.user, false).await;
    assert_eq!(h.fetcher.summary_calls(), 2);
}

#[tokio::test]
async fn expired_set_refetches() {
    let h = harness();
    h.cache.load(&h.user, false).await;

    h.clock.advance_secs(TTL_SECS + 1);
    h.cache.load(&h.user, false).await;
    assert_eq!(h.fetcher.summary_calls(), 4);
}

#[tokio::test]
async fn force_refresh_bypasses_fresh_set() {
    let h = harness();
    h.cache.load(&h.user, false).await;
    h.cache.load(&h.user, true).await;
    assert_eq!(h.fetcher.summary_calls(), 4);
}

#[tokio::test]
async fn durable_snapshot_adopted_without_network() {
    let h = harness();
    h.fetcher.set_portfolio(&["WEGE3"]);
    h.cache.load(&h.user, false).await;
    assert_eq!(h.fetcher.summary_calls(), 2);

    // Fresh cache instance, same store: a page reload within the TTL.
    let reloaded = MembershipCache::new(
        h.fetcher.clone(),
        h.store.clone(),
        h.clock.clone(),
        Duration::seconds(TTL_SECS),
    );
    h.clock.advance_secs(10);
    reloaded.load(&h.user, false).await;

    assert!(reloaded.is_member(MembershipKind::Portfolio, &Ticker::new("WEGE3")));
    assert_eq!(h.fetcher.summary_calls(), 2);
}

#[tokio::test]
async fn snapshot_of_other_user_not_adopted() {
    let h = harness();
    h.fetcher.set_portfolio(&["WEGE3"]);
    h.cache.load(&h.user, false).await;

    let other = UserId::random();
    let reloaded = MembershipCache::new(
        h.fetcher.clone(),
        h.store.clone(),
        h.clock.clone(),
        Duration::seconds(TTL_SECS),
    );
    reloaded.load(&other, false).await;

    // The other user's load had to hit the network.
    assert_eq!(h.fetcher.summary_calls(), 4);
}

#[tokio::test]
async fn load_failure_keeps_previous_state() {
    let h = harness();
    h.fetcher.set_portfolio(&["PETR4"]);
    h.cache.load(&h.user, false).await;

    h.fetcher.fail_summaries(true);
    h.cache.load(&h.user, true).await;

    assert!(h.cache.is_member(MembershipKind::Portfolio, &Ticker::new("PETR4")));
    assert!(h.cache.last_error().is_some());

    // A later successful load clears the error.
    h.fetcher.fail_summaries(false);
    h.cache.load(&h.user, true).await;
    assert!(h.cache.last_error().is_none());
}

#[tokio::test]
async fn rollback_restores_set_and_advances_last_mutated() {
    let h = harness();
    let ticker = Ticker::new("BBAS3");

    let id = h.cache.mutate_optimistic(
        &h.user,
        MembershipKind::Watchlist,
        ticker.clone(),
        MutationOp::Add,
    );
    let after_add = h.cache.last_mutated().unwrap();
    assert!(h.cache.is_member(MembershipKind::Watchlist, &ticker));

    h.clock.advance_secs(1);
    h.cache.roll_back(&h.user, id);

    assert!(!h.cache.is_member(MembershipKind::Watchlist, &ticker));
    assert!(h.cache.last_mutated().unwrap() > after_add);
    assert_eq!(h.cache.mutation_state(id), Some(MutationState::RolledBack));
}

#[tokio::test]
async fn commit_settles_pending_mutation() {
    let h = harness();
    let id = h.cache.mutate_optimistic(
        &h.user,
        MembershipKind::Portfolio,
        Ticker::new("PETR4"),
        MutationOp::Add,
    );
    assert_eq!(h.cache.mutation_state(id), Some(MutationState::Pending));

    h.cache.commit(id);
    assert_eq!(h.cache.mutation_state(id), Some(MutationState::Committed));

    // A committed mutation cannot be rolled back afterwards.
    h.cache.roll_back(&h.user, id);
    assert_eq!(h.cache.mutation_state(id), Some(MutationState::Committed));
    assert!(h.cache.is_member(MembershipKind::Portfolio, &Ticker::new("PETR4")));
}

#[tokio::test]
async fn badges_answered_from_cache_only() {
    let h = harness();
    h.fetcher.set_portfolio(&["PETR4"]);
    h.fetcher.set_watchlist(&["PETR4", "VALE3"]);
    h.cache.load(&h.user, false).await;
    let calls_after_load = h.fetcher.summary_calls();

    let badges = h.cache.badges(&[Ticker::new("PETR4"), Ticker::new("VALE3"), Ticker::new("XXXX9")]);

    assert_eq!(badges.len(), 3);
    assert!(badges[0].in_portfolio && badges[0].in_watchlist);
    assert!(!badges[1].in_portfolio && badges[1].in_watchlist);
    assert!(!badges[2].in_portfolio && !badges[2].in_watchlist);
    assert_eq!(h.fetcher.summary_calls(), calls_after_load);
}

#[tokio::test]
async fn committed_mutation_survives_snapshot_adoption() {
    let h = harness();
    h.fetcher.set_portfolio(&["PETR4"]);
    h.cache.load(&h.user, false).await;

    let itub4 = Ticker::new("ITUB4");
    h.clock.advance_secs(1);
    let id = h.cache.mutate_optimistic(
        &h.user,
        MembershipKind::Portfolio,
        itub4.clone(),
        MutationOp::Add,
    );
    h.cache.commit(id);

    // Page reload within the TTL: the adopted snapshot must include the
    // committed add, not the pre-mutation membership.
    let reloaded = MembershipCache::new(
        h.fetcher.clone(),
        h.store.clone(),
        h.clock.clone(),
        Duration::seconds(TTL_SECS),
    );
    h.clock.advance_secs(10);
    reloaded.load(&h.user, false).await;

    assert!(reloaded.is_member(MembershipKind::Portfolio, &itub4));
    assert!(reloaded.is_member(MembershipKind::Portfolio, &Ticker::new("PETR4")));
    assert_eq!(h.fetcher.summary_calls(), 2);
}

#[tokio::test]
async fn rolled_back_mutation_absent_from_durable_snapshot() {
    let h = harness();
    h.cache.load(&h.user, false).await;

    let vale3 = Ticker::new("VALE3");
    h.clock.advance_secs(1);
    let id = h.cache.mutate_optimistic(
        &h.user,
        MembershipKind::Watchlist,
        vale3.clone(),
        MutationOp::Add,
    );
    h.clock.advance_secs(1);
    h.cache.roll_back(&h.user, id);

    let reloaded = MembershipCache::new(
        h.fetcher.clone(),
        h.store.clone(),
        h.clock.clone(),
        Duration::seconds(TTL_SECS),
    );
    h.clock.advance_secs(5);
    reloaded.load(&h.user, false).await;

    assert!(!reloaded.is_member(MembershipKind::Watchlist, &vale3));
    assert_eq!(h.fetcher.summary_calls(), 2);
}

#[tokio::test]
async fn clear_drops_memory_and_storage() {
    let h = harness();
    h.fetcher.set_portfolio(&["PETR4"]);
    h.cache.load(&h.user, false).await;
    assert!(!h.store.is_empty());

    h.cache.clear(&h.user);
    assert!(!h.cache.is_member(MembershipKind::Portfolio, &Ticker::new("PETR4")));
    assert!(h.store.is_empty());
}
