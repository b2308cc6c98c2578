//! Session: the explicitly owned cache service instance.
//!
//! One `Session` exists per logged-in user and owns every cache and bridge.
//! Nothing here is a module-level singleton; views receive the session
//! through whatever scoped provider the host application uses.

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{MembershipKind, MutationOp, MutationState, RangeToken, Ticker, UserId};
use crate::port::{
    Clock, CompanyDirectory, DetailFetcher, DetailView, IdentityProvider, KeyValueStore,
    MembershipFetcher, QuoteFetcher,
};
use crate::service::bridge::{InvalidationBridge, RefreshEvent};
use crate::service::detail::DetailCache;
use crate::service::membership::MembershipCache;
use crate::service::stock_view::StockView;

/// Collaborators a session is wired from.
#[derive(Clone)]
pub struct SessionDeps {
    pub membership_fetcher: Arc<dyn MembershipFetcher>,
    pub detail_fetcher: Arc<dyn DetailFetcher>,
    pub quotes: Arc<dyn QuoteFetcher>,
    pub directory: Arc<dyn CompanyDirectory>,
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

/// Per-login cache service: membership cache, one detail cache per view,
/// and an invalidation bridge wiring each detail cache to membership
/// mutations.
pub struct Session {
    user: UserId,
    membership: Arc<MembershipCache>,
    portfolio_detail: Arc<DetailCache>,
    watchlist_detail: Arc<DetailCache>,
    bridges: Vec<InvalidationBridge>,
    render_tx: broadcast::Sender<RefreshEvent>,
    deps: SessionDeps,
    default_range: RangeToken,
}

impl Session {
    #[must_use]
    pub fn new(user: UserId, deps: SessionDeps, config: &Config) -> Self {
        let ttl = config.ttl();
        Self::with_ttl(user, deps, ttl, config.cache.default_range)
    }

    #[must_use]
    pub fn with_ttl(
        user: UserId,
        deps: SessionDeps,
        ttl: Duration,
        default_range: RangeToken,
    ) -> Self {
        let membership = Arc::new(MembershipCache::new(
            deps.membership_fetcher.clone(),
            deps.store.clone(),
            deps.clock.clone(),
            ttl,
        ));

        let portfolio_detail = Arc::new(DetailCache::new(
            DetailView::Portfolio,
            deps.detail_fetcher.clone(),
            deps.store.clone(),
            deps.clock.clone(),
            ttl,
        ));
        let watchlist_detail = Arc::new(DetailCache::new(
            DetailView::Watchlist,
            deps.detail_fetcher.clone(),
            deps.store.clone(),
            deps.clock.clone(),
            ttl,
        ));

        let (render_tx, _) = broadcast::channel(32);
        let bridges = vec![
            InvalidationBridge::spawn(
                &membership,
                portfolio_detail.clone(),
                deps.identity.clone(),
                render_tx.clone(),
            ),
            InvalidationBridge::spawn(
                &membership,
                watchlist_detail.clone(),
                deps.identity.clone(),
                render_tx.clone(),
            ),
        ];

        info!(%user, "Session caches wired");
        Self {
            user,
            membership,
            portfolio_detail,
            watchlist_detail,
            bridges,
            render_tx,
            deps,
            default_range,
        }
    }

    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn membership(&self) -> &Arc<MembershipCache> {
        &self.membership
    }

    #[must_use]
    pub fn detail(&self, view: DetailView) -> &Arc<DetailCache> {
        match view {
            DetailView::Portfolio => &self.portfolio_detail,
            DetailView::Watchlist => &self.watchlist_detail,
        }
    }

    /// Subscribe to bridge-driven re-render triggers.
    #[must_use]
    pub fn subscribe_refresh(&self) -> broadcast::Receiver<RefreshEvent> {
        self.render_tx.subscribe()
    }

    /// Build a stock detail view instance bound to this session's caches.
    #[must_use]
    pub fn stock_view(&self) -> StockView {
        StockView::new(
            self.deps.quotes.clone(),
            self.deps.directory.clone(),
            self.membership.clone(),
            self.portfolio_detail.clone(),
            self.deps.identity.clone(),
            self.default_range,
        )
    }

    /// Add or remove a ticker: optimistic local mutation, then the server
    /// write, then settlement.
    ///
    /// The local set updates synchronously before the request goes out; a
    /// rejected or failed write rolls it back, which itself advances
    /// `last_mutated` so the detail views refresh back to server truth.
    pub async fn mutate_membership(
        &self,
        kind: MembershipKind,
        ticker: Ticker,
        op: MutationOp,
    ) -> MutationState {
        let id = self
            .membership
            .mutate_optimistic(&self.user, kind, ticker.clone(), op);

        let view = match kind {
            MembershipKind::Portfolio => DetailView::Portfolio,
            MembershipKind::Watchlist => DetailView::Watchlist,
        };
        let add = op == MutationOp::Add;

        match self
            .deps
            .membership_fetcher
            .mutate(&self.user, view, &ticker, add)
            .await
        {
            Ok(outcome) if outcome.success => {
                self.membership.commit(id);
                MutationState::Committed
            }
            Ok(outcome) => {
                warn!(%ticker, message = %outcome.message, "Server rejected mutation");
                self.membership.roll_back(&self.user, id);
                MutationState::RolledBack
            }
            Err(e) => {
                warn!(%ticker, error = %e, "Mutation request failed");
                self.membership.roll_back(&self.user, id);
                MutationState::RolledBack
            }
        }
    }

    /// Stop the bridges without touching cached data.
    pub fn shutdown(&self) {
        for bridge in &self.bridges {
            bridge.abort();
        }
    }

    /// Logout: stop bridges and discard every cache and durable entry for
    /// this session's user.
    pub fn logout(&self) {
        self.shutdown();
        self.membership.clear(&self.user);
        self.portfolio_detail.invalidate(&self.user);
        self.watchlist_detail.invalidate(&self.user);
        info!(user = %self.user, "Session caches cleared");
    }
}
