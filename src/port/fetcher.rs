//! Fetch ports consumed by the caches and the stock detail view.
//!
//! These traits are the behavioral contract with the backend; wire syntax
//! (URLs, JSON envelopes) lives in the adapters that implement them.

use async_trait::async_trait;

use crate::domain::{
    CombinedQuote, DetailRow, QuoteSnapshot, RangeToken, SummaryRecord, Ticker, UserId,
};
use crate::error::FetchError;

/// Which joined view a detail fetch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailView {
    Portfolio,
    Watchlist,
}

impl DetailView {
    /// Prefix of the durable storage key for this view.
    #[must_use]
    pub fn storage_prefix(&self) -> &'static str {
        match self {
            Self::Portfolio => "portfolio_detail",
            Self::Watchlist => "watchlist_detail",
        }
    }
}

impl std::fmt::Display for DetailView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_prefix())
    }
}

/// Outcome of a membership add/remove request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub success: bool,
    pub message: String,
}

/// Fetches lightweight membership summaries.
#[async_trait]
pub trait MembershipFetcher: Send + Sync {
    /// Fetch the portfolio summary for a user.
    async fn fetch_portfolio(&self, user: &UserId) -> Result<Vec<SummaryRecord>, FetchError>;

    /// Fetch the watchlist summary for a user.
    async fn fetch_watchlist(&self, user: &UserId) -> Result<Vec<SummaryRecord>, FetchError>;

    /// Ask the server to add or remove a ticker from a collection.
    ///
    /// Callers apply the optimistic local mutation first and settle it from
    /// this outcome.
    async fn mutate(
        &self,
        user: &UserId,
        view: DetailView,
        ticker: &Ticker,
        add: bool,
    ) -> Result<MutationOutcome, FetchError>;
}

/// Fetches the authoritative joined rows for one view.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch_view(&self, view: DetailView, user: &UserId)
        -> Result<Vec<DetailRow>, FetchError>;
}

/// Fetches price and dividend series for the stock detail view.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    /// Combined price+dividend history for a ticker at a range.
    ///
    /// `force_update` asks the server to refresh its persisted data instead
    /// of serving filtered cached values.
    async fn fetch_combined(
        &self,
        ticker: &Ticker,
        range: RangeToken,
        force_update: bool,
    ) -> Result<CombinedQuote, FetchError>;

    /// Dedicated force-refresh of the current price and dividends.
    async fn force_refresh(&self, ticker: &Ticker) -> Result<QuoteSnapshot, FetchError>;
}

/// Resolves a ticker to its company name.
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// Returns `FetchError::NotFound` for unknown tickers.
    async fn company_name(&self, ticker: &Ticker) -> Result<String, FetchError>;
}
