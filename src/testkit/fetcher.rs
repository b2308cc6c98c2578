//! Scripted fetch port implementations with call counting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal_macros::dec;
use tokio::sync::Semaphore;

use crate::domain::{
    CombinedQuote, DetailRow, PricePoint, QuoteSnapshot, RangeToken, SummaryRecord, Ticker, UserId,
};
use crate::error::FetchError;
use crate::port::{
    CompanyDirectory, DetailFetcher, DetailView, MembershipFetcher, MutationOutcome, QuoteFetcher,
};

fn network_err() -> FetchError {
    FetchError::Network("scripted failure".into())
}

/// Membership fetcher answering from scripted ticker lists.
#[derive(Default)]
pub struct StubMembershipFetcher {
    portfolio: RwLock<Vec<Ticker>>,
    watchlist: RwLock<Vec<Ticker>>,
    fail: RwLock<bool>,
    reject_mutations: RwLock<bool>,
    summary_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
}

impl StubMembershipFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_portfolio(&self, tickers: &[&str]) {
        *self.portfolio.write() = tickers.iter().map(Ticker::new).collect();
    }

    pub fn set_watchlist(&self, tickers: &[&str]) {
        *self.watchlist.write() = tickers.iter().map(Ticker::new).collect();
    }

    /// Make summary fetches fail until called with `false`.
    pub fn fail_summaries(&self, fail: bool) {
        *self.fail.write() = fail;
    }

    /// Make the server reject mutation writes.
    pub fn reject_mutations(&self, reject: bool) {
        *self.reject_mutations.write() = reject;
    }

    /// Summary fetch calls (portfolio + watchlist each count one).
    #[must_use]
    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    fn summaries(&self, tickers: &RwLock<Vec<Ticker>>) -> Result<Vec<SummaryRecord>, FetchError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.read() {
            return Err(network_err());
        }
        Ok(tickers
            .read()
            .iter()
            .cloned()
            .map(|ticker| SummaryRecord { ticker })
            .collect())
    }
}

#[async_trait]
impl MembershipFetcher for StubMembershipFetcher {
    async fn fetch_portfolio(&self, _user: &UserId) -> Result<Vec<SummaryRecord>, FetchError> {
        self.summaries(&self.portfolio)
    }

    async fn fetch_watchlist(&self, _user: &UserId) -> Result<Vec<SummaryRecord>, FetchError> {
        self.summaries(&self.watchlist)
    }

    async fn mutate(
        &self,
        _user: &UserId,
        _view: DetailView,
        ticker: &Ticker,
        _add: bool,
    ) -> Result<MutationOutcome, FetchError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        if *self.reject_mutations.read() {
            return Ok(MutationOutcome {
                success: false,
                message: format!("{ticker} rejected"),
            });
        }
        Ok(MutationOutcome {
            success: true,
            message: "ok".into(),
        })
    }
}

/// Detail fetcher answering scripted rows per view.
#[derive(Default)]
pub struct StubDetailFetcher {
    rows: RwLock<HashMap<DetailView, Vec<DetailRow>>>,
    fail: RwLock<bool>,
    gate: RwLock<Option<Arc<Semaphore>>>,
    portfolio_calls: AtomicUsize,
    watchlist_calls: AtomicUsize,
}

impl StubDetailFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rows(&self, view: DetailView, rows: Vec<DetailRow>) {
        self.rows.write().insert(view, rows);
    }

    /// Shorthand: price-only rows for the given tickers.
    pub fn set_tickers(&self, view: DetailView, tickers: &[&str]) {
        let rows = tickers
            .iter()
            .map(|t| DetailRow::quote_only(Ticker::new(t), dec!(10.00)))
            .collect();
        self.set_rows(view, rows);
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.write() = fail;
    }

    /// Install a gate: every fetch blocks until a permit is added.
    pub fn install_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.write() = Some(gate.clone());
        gate
    }

    #[must_use]
    pub fn calls(&self, view: DetailView) -> usize {
        match view {
            DetailView::Portfolio => self.portfolio_calls.load(Ordering::SeqCst),
            DetailView::Watchlist => self.watchlist_calls.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl DetailFetcher for StubDetailFetcher {
    async fn fetch_view(
        &self,
        view: DetailView,
        _user: &UserId,
    ) -> Result<Vec<DetailRow>, FetchError> {
        match view {
            DetailView::Portfolio => self.portfolio_calls.fetch_add(1, Ordering::SeqCst),
            DetailView::Watchlist => self.watchlist_calls.fetch_add(1, Ordering::SeqCst),
        };
        let gate = self.gate.read().clone();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.map_err(|_| network_err())?;
            permit.forget();
        }
        if *self.fail.read() {
            return Err(network_err());
        }
        Ok(self.rows.read().get(&view).cloned().unwrap_or_default())
    }
}

/// Quote fetcher with optional gating so tests can hold a fetch in flight.
#[derive(Default)]
pub struct StubQuoteFetcher {
    fail: RwLock<bool>,
    unknown: RwLock<Vec<Ticker>>,
    gate: RwLock<Option<Arc<Semaphore>>>,
    combined_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl StubQuoteFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.write() = fail;
    }

    /// Mark a ticker as unknown to the server.
    pub fn mark_unknown(&self, ticker: &str) {
        self.unknown.write().push(Ticker::new(ticker));
    }

    /// Install a gate: every combined fetch blocks until a permit is added.
    pub fn install_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.write() = Some(gate.clone());
        gate
    }

    #[must_use]
    pub fn combined_calls(&self) -> usize {
        self.combined_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn check(&self, ticker: &Ticker) -> Result<(), FetchError> {
        if self.unknown.read().contains(ticker) {
            return Err(FetchError::NotFound {
                ticker: ticker.to_string(),
            });
        }
        if *self.fail.read() {
            return Err(network_err());
        }
        Ok(())
    }
}

/// A deterministic one-point series whose price encodes the range, so tests
/// can tell which fetch produced the displayed series.
#[must_use]
pub fn series_for(ticker: &Ticker, range: RangeToken) -> CombinedQuote {
    let price = match range {
        RangeToken::OneMonth => dec!(1.00),
        RangeToken::ThreeMonths => dec!(3.00),
        RangeToken::SixMonths => dec!(6.00),
        RangeToken::OneYear => dec!(12.00),
        RangeToken::Max => dec!(99.00),
    };
    CombinedQuote {
        ticker: ticker.clone(),
        prices: vec![PricePoint {
            date: chrono::NaiveDate::from_ymd_opt(2024, 10, 17).unwrap(),
            price,
        }],
        dividends: Vec::new(),
        prices_updated: false,
        dividends_updated: false,
    }
}

#[async_trait]
impl QuoteFetcher for StubQuoteFetcher {
    async fn fetch_combined(
        &self,
        ticker: &Ticker,
        range: RangeToken,
        _force_update: bool,
    ) -> Result<CombinedQuote, FetchError> {
        self.combined_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.read().clone();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.map_err(|_| network_err())?;
            permit.forget();
        }
        self.check(ticker)?;
        Ok(series_for(ticker, range))
    }

    async fn force_refresh(&self, ticker: &Ticker) -> Result<QuoteSnapshot, FetchError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.check(ticker)?;
        Ok(QuoteSnapshot {
            ticker: ticker.clone(),
            current_price: dec!(30.50),
            dividends: Vec::new(),
            timestamp: Utc::now(),
        })
    }
}

/// Company directory answering from a scripted name map.
#[derive(Default)]
pub struct StubDirectory {
    names: RwLock<HashMap<Ticker, String>>,
    calls: AtomicUsize,
}

impl StubDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ticker: &str, name: &str) {
        self.names.write().insert(Ticker::new(ticker), name.into());
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompanyDirectory for StubDirectory {
    async fn company_name(&self, ticker: &Ticker) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.names
            .read()
            .get(ticker)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                ticker: ticker.to_string(),
            })
    }
}
