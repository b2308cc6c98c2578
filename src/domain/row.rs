//! Joined display rows served by the detail views.

use serde::{Deserialize, Serialize};

use super::ids::Ticker;
use super::money::{Price, Quantity};

/// One row of a fully joined detail view.
///
/// The portfolio view populates `quantity` and `total_value`; the watchlist
/// view leaves them absent. Row order is the server's and is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub ticker: Ticker,
    pub current_price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_value: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_dividend: Option<Price>,
}

impl DetailRow {
    /// A watchlist-shaped row: price only.
    #[must_use]
    pub fn quote_only(ticker: Ticker, current_price: Price) -> Self {
        Self {
            ticker,
            current_price,
            quantity: None,
            total_value: None,
            last_dividend: None,
        }
    }
}

/// Lightweight membership summary record, one per held/watched ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub ticker: Ticker,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn optional_fields_skipped_in_json() {
        let row = DetailRow::quote_only(Ticker::new("WEGE3"), dec!(38.12));
        let json = serde_json::to_string(&row).unwrap();
        assert!(!json.contains("quantity"));
        assert!(json.contains("WEGE3"));
    }
}
