//! Price and dividend series for the stock detail view.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::Ticker;
use super::money::Price;

/// One closing price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: Price,
}

/// One dividend payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendPayment {
    pub date: NaiveDate,
    pub amount: Price,
}

/// Combined price and dividend history for one ticker at one range.
///
/// `prices_updated`/`dividends_updated` report whether the server refreshed
/// its own persisted data while answering, not whether this payload differs
/// from anything the client holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedQuote {
    pub ticker: Ticker,
    pub prices: Vec<PricePoint>,
    pub dividends: Vec<DividendPayment>,
    #[serde(default)]
    pub prices_updated: bool,
    #[serde(default)]
    pub dividends_updated: bool,
}

impl CombinedQuote {
    /// Empty series for a ticker, used as the pre-fetch placeholder.
    #[must_use]
    pub fn empty(ticker: Ticker) -> Self {
        Self {
            ticker,
            prices: Vec::new(),
            dividends: Vec::new(),
            prices_updated: false,
            dividends_updated: false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.dividends.is_empty()
    }
}

/// Result of a forced price refresh for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub ticker: Ticker,
    pub current_price: Price,
    pub dividends: Vec<DividendPayment>,
    pub timestamp: DateTime<Utc>,
}
