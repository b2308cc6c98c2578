//! Stock detail view state machine.
//!
//! Coordinates the two independently-triggerable fetches behind a single
//! ticker page: identity-level data (company name plus default-range series)
//! keyed by ticker, and range-level series keyed by ticker+range. Range
//! switches never re-fetch identity data; ticker switches always reset the
//! range; stale completions are discarded by generation number.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{CombinedQuote, MembershipKind, RangeToken, Ticker};
use crate::port::{CompanyDirectory, IdentityProvider, QuoteFetcher};
use crate::service::detail::DetailCache;
use crate::service::membership::MembershipCache;

/// Where the view currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Idle,
    IdentityLoading,
    RangeLoading,
    Ready,
    Error(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Identity fetch failed; nothing to render for this navigation.
    Identity,
    /// Ticker does not exist; terminal for this navigation.
    NotFound,
    /// Range fetch failed; the last good series is still displayed.
    Range,
}

/// Renderable snapshot of the view state.
#[derive(Debug, Clone)]
pub struct StockViewSnapshot {
    pub phase: ViewPhase,
    pub ticker: Option<Ticker>,
    pub range: RangeToken,
    pub company_name: Option<String>,
    pub series: CombinedQuote,
    pub identity_loading: bool,
    pub range_loading: bool,
    pub refreshing: bool,
    pub error_message: Option<String>,
}

#[derive(Debug)]
struct State {
    phase: ViewPhase,
    ticker: Option<Ticker>,
    range: RangeToken,
    company_name: Option<String>,
    series: CombinedQuote,
    identity_loading: bool,
    range_loading: bool,
    refreshing: bool,
    error_message: Option<String>,
}

/// One stock detail page instance.
///
/// All state mutation is synchronous under the lock; suspension happens only
/// at fetch boundaries, and every async transition re-checks its generation
/// after each await so a completion for an abandoned navigation is dropped
/// wholesale.
pub struct StockView {
    quotes: Arc<dyn QuoteFetcher>,
    directory: Arc<dyn CompanyDirectory>,
    membership: Arc<MembershipCache>,
    portfolio_detail: Arc<DetailCache>,
    identity: Arc<dyn IdentityProvider>,
    default_range: RangeToken,
    state: RwLock<State>,
    generation: AtomicU64,
}

impl StockView {
    #[must_use]
    pub fn new(
        quotes: Arc<dyn QuoteFetcher>,
        directory: Arc<dyn CompanyDirectory>,
        membership: Arc<MembershipCache>,
        portfolio_detail: Arc<DetailCache>,
        identity: Arc<dyn IdentityProvider>,
        default_range: RangeToken,
    ) -> Self {
        Self {
            quotes,
            directory,
            membership,
            portfolio_detail,
            identity,
            default_range,
            state: RwLock::new(State {
                phase: ViewPhase::Idle,
                ticker: None,
                range: default_range,
                company_name: None,
                series: CombinedQuote::empty(Ticker::new("")),
                identity_loading: false,
                range_loading: false,
                refreshing: false,
                error_message: None,
            }),
            generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StockViewSnapshot {
        let s = self.state.read();
        StockViewSnapshot {
            phase: s.phase,
            ticker: s.ticker.clone(),
            range: s.range,
            company_name: s.company_name.clone(),
            series: s.series.clone(),
            identity_loading: s.identity_loading,
            range_loading: s.range_loading,
            refreshing: s.refreshing,
            error_message: s.error_message.clone(),
        }
    }

    /// Navigate to a ticker.
    ///
    /// Re-navigating to the ticker already shown fires zero fetches, unless
    /// the previous identity load failed transiently, in which case the
    /// navigation retries it. Otherwise the range resets to the default and
    /// the company name and default-range series are fetched together.
    pub async fn navigate(&self, ticker: Ticker) {
        {
            let s = self.state.read();
            let retryable = s.phase == ViewPhase::Error(ErrorKind::Identity);
            if s.ticker.as_ref() == Some(&ticker) && !retryable {
                debug!(%ticker, "Already on this ticker, no fetches");
                return;
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut s = self.state.write();
            s.phase = ViewPhase::IdentityLoading;
            s.ticker = Some(ticker.clone());
            s.range = self.default_range;
            s.company_name = None;
            s.series = CombinedQuote::empty(ticker.clone());
            s.identity_loading = true;
            s.range_loading = false;
            s.refreshing = false;
            s.error_message = None;
        }

        info!(%ticker, "Navigating to ticker");
        let (name_result, quote_result) = tokio::join!(
            self.directory.company_name(&ticker),
            self.quotes.fetch_combined(&ticker, self.default_range, false)
        );

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(%ticker, "Stale identity load discarded");
            return;
        }

        let mut s = self.state.write();
        // Clears even on failure so a broken load never sticks as "loading".
        s.identity_loading = false;

        match (name_result, quote_result) {
            (Ok(name), Ok(quote)) => {
                s.company_name = Some(name);
                s.series = quote;
                s.phase = ViewPhase::Ready;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(%ticker, error = %e, "Identity load failed");
                let kind = if e.is_not_found() {
                    ErrorKind::NotFound
                } else {
                    ErrorKind::Identity
                };
                s.phase = ViewPhase::Error(kind);
                s.error_message = Some(e.to_string());
            }
        }
    }

    /// Switch the series range for the current ticker.
    ///
    /// Dropped while an identity load is in flight: the identity load's own
    /// default-range result is authoritative, and two concurrent fetches
    /// must not race to overwrite each other.
    pub async fn change_range(&self, range: RangeToken) {
        let (generation, ticker) = {
            let s = self.state.read();
            if s.identity_loading {
                debug!(%range, "Range change dropped during identity load");
                return;
            }
            if s.range == range {
                return;
            }
            let ready = matches!(s.phase, ViewPhase::Ready | ViewPhase::Error(ErrorKind::Range));
            let Some(ticker) = s.ticker.clone().filter(|_| ready) else {
                return;
            };
            (self.generation.load(Ordering::SeqCst), ticker)
        };

        {
            let mut s = self.state.write();
            s.phase = ViewPhase::RangeLoading;
            s.range = range;
            s.range_loading = true;
            s.error_message = None;
        }

        debug!(%ticker, %range, "Changing range");
        // Served from the backend's own cache; no forced price refresh.
        let result = self.quotes.fetch_combined(&ticker, range, false).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(%ticker, %range, "Stale range change discarded");
            return;
        }

        let mut s = self.state.write();
        s.range_loading = false;

        match result {
            Ok(quote) => {
                s.series = quote;
                s.phase = ViewPhase::Ready;
            }
            Err(e) => {
                // Keep the last good series: a transient range-switch failure
                // must not blank a working chart.
                warn!(%ticker, %range, error = %e, "Range fetch failed, keeping last series");
                s.phase = ViewPhase::Error(ErrorKind::Range);
                s.error_message = Some(e.to_string());
            }
        }
    }

    /// Force a server-side price refresh and reconcile the displayed series.
    ///
    /// Runs under its own `refreshing` flag, independent of the loading
    /// states. On success the combined view is re-fetched so the chart shows
    /// authoritative persisted values, and the portfolio detail cache is
    /// invalidated when the ticker is a portfolio member.
    pub async fn manual_refresh(&self) {
        let (generation, ticker, range) = {
            let mut s = self.state.write();
            if s.phase != ViewPhase::Ready || s.refreshing {
                return;
            }
            let Some(ticker) = s.ticker.clone() else {
                return;
            };
            s.refreshing = true;
            (self.generation.load(Ordering::SeqCst), ticker, s.range)
        };

        info!(%ticker, "Manual refresh requested");
        let refreshed = self.quotes.force_refresh(&ticker).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }

        match refreshed {
            Ok(snapshot) => {
                debug!(%ticker, price = %snapshot.current_price, "Server prices refreshed");

                // Reconcile with persisted values rather than trusting the
                // snapshot: the combined view is authoritative for the chart.
                let reconciled = self.quotes.fetch_combined(&ticker, range, false).await;

                if self.generation.load(Ordering::SeqCst) != generation {
                    return;
                }

                let mut s = self.state.write();
                s.refreshing = false;
                match reconciled {
                    Ok(quote) => {
                        s.series = quote;
                        s.error_message = None;
                    }
                    Err(e) => {
                        warn!(%ticker, error = %e, "Reconciliation fetch failed");
                        s.error_message = Some(e.to_string());
                    }
                }
                drop(s);

                if self.membership.is_member(MembershipKind::Portfolio, &ticker) {
                    if let Some(user) = self.identity.current_user() {
                        self.portfolio_detail.invalidate(&user);
                    }
                }
            }
            Err(e) => {
                warn!(%ticker, error = %e, "Manual refresh failed");
                let mut s = self.state.write();
                s.refreshing = false;
                s.error_message = Some(e.to_string());
            }
        }
    }

    /// Reset to `Idle`, e.g. when the route unmounts.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut s = self.state.write();
        s.phase = ViewPhase::Idle;
        s.ticker = None;
        s.range = self.default_range;
        s.company_name = None;
        s.series = CombinedQuote::empty(Ticker::new(""));
        s.identity_loading = false;
        s.range_loading = false;
        s.refreshing = false;
        s.error_message = None;
    }
}

impl std::fmt::Debug for StockView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockView")
            .field("state", &*self.state.read())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
