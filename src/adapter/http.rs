//! REST API client implementing the fetch ports.
//!
//! Wire format: every endpoint answers a `{status, message?, data?}` envelope;
//! `status != "success"` maps to `FetchError::Server`, HTTP 404 and
//! "not found" payloads to `FetchError::NotFound`, transport failures to
//! `FetchError::Network`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{
    CombinedQuote, DetailRow, DividendPayment, PricePoint, QuoteSnapshot, RangeToken,
    SummaryRecord, Ticker, UserId,
};
use crate::error::FetchError;
use crate::port::{
    CompanyDirectory, DetailFetcher, DetailView, MembershipFetcher, MutationOutcome, QuoteFetcher,
};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default = "none")]
    data: Option<T>,
}

fn none<T>() -> Option<T> {
    None
}

/// Map status codes that carry meaning on their own, before reading the body.
///
/// 401/403 mean the session's user is no longer valid on the server.
fn classify_status(status: StatusCode, ticker: Option<&Ticker>) -> Option<FetchError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Some(FetchError::StaleAuth);
    }
    if status == StatusCode::NOT_FOUND {
        return Some(FetchError::NotFound {
            ticker: ticker.map(ToString::to_string).unwrap_or_default(),
        });
    }
    None
}

#[derive(Debug, Deserialize)]
struct CombinedPayload {
    ticker: Ticker,
    #[serde(default)]
    prices: Vec<PricePoint>,
    #[serde(default)]
    dividends: Vec<DividendPayment>,
    #[serde(default)]
    prices_updated: bool,
    #[serde(default)]
    dividends_updated: bool,
}

#[derive(Debug, Deserialize)]
struct SnapshotPayload {
    current_price: crate::domain::Price,
    #[serde(default)]
    dividends: Vec<DividendPayment>,
    timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct CompanyPayload {
    company_name: String,
}

impl ApiClient {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and unwrap the `{status, data}` envelope.
    async fn expect_data<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        ticker_for_404: Option<&Ticker>,
    ) -> Result<T, FetchError> {
        let response = request.send().await?;

        if let Some(err) = classify_status(response.status(), ticker_for_404) {
            return Err(err);
        }

        let envelope: ApiEnvelope<T> = response.json().await?;

        if envelope.status != "success" {
            let message = envelope.message.unwrap_or_else(|| "unknown error".into());
            if let Some(ticker) = ticker_for_404 {
                // The backend reports unknown tickers as a 400 with a
                // "não encontrada" message rather than a 404.
                if message.to_lowercase().contains("encontrad")
                    || message.to_lowercase().contains("not found")
                {
                    return Err(FetchError::NotFound {
                        ticker: ticker.to_string(),
                    });
                }
            }
            return Err(FetchError::Server { message });
        }

        envelope.data.ok_or(FetchError::Server {
            message: "missing data in success envelope".into(),
        })
    }

    async fn fetch_summary(
        &self,
        path: &str,
        user: &UserId,
    ) -> Result<Vec<SummaryRecord>, FetchError> {
        let url = self.url(path);
        debug!(url = %url, user = %user, "Fetching membership summary");
        self.expect_data(
            self.client.get(&url).query(&[("user_id", user.to_string())]),
            None,
        )
        .await
    }
}

#[async_trait]
impl MembershipFetcher for ApiClient {
    async fn fetch_portfolio(&self, user: &UserId) -> Result<Vec<SummaryRecord>, FetchError> {
        self.fetch_summary("api/portfolio", user).await
    }

    async fn fetch_watchlist(&self, user: &UserId) -> Result<Vec<SummaryRecord>, FetchError> {
        self.fetch_summary("api/watchlist", user).await
    }

    async fn mutate(
        &self,
        user: &UserId,
        view: DetailView,
        ticker: &Ticker,
        add: bool,
    ) -> Result<MutationOutcome, FetchError> {
        let collection = match view {
            DetailView::Portfolio => "portfolio",
            DetailView::Watchlist => "watchlist",
        };

        let response = if add {
            let url = self.url(&format!("api/{collection}/add"));
            self.client
                .post(&url)
                .json(&serde_json::json!({
                    "user_id": user.to_string(),
                    "ticker": ticker.as_str(),
                }))
                .send()
                .await?
        } else {
            let url = self.url(&format!("api/{collection}/remove/{ticker}"));
            self.client
                .delete(&url)
                .query(&[("user_id", user.to_string())])
                .send()
                .await?
        };

        let envelope: ApiEnvelope<serde_json::Value> = response.json().await?;
        Ok(MutationOutcome {
            success: envelope.status == "success",
            message: envelope.message.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl DetailFetcher for ApiClient {
    async fn fetch_view(
        &self,
        view: DetailView,
        user: &UserId,
    ) -> Result<Vec<DetailRow>, FetchError> {
        let path = match view {
            DetailView::Portfolio => "api/portfolio/full",
            DetailView::Watchlist => "api/watchlist/full",
        };
        let url = self.url(path);
        debug!(url = %url, user = %user, "Fetching joined view");
        self.expect_data(
            self.client.get(&url).query(&[("user_id", user.to_string())]),
            None,
        )
        .await
    }
}

#[async_trait]
impl QuoteFetcher for ApiClient {
    async fn fetch_combined(
        &self,
        ticker: &Ticker,
        range: RangeToken,
        force_update: bool,
    ) -> Result<CombinedQuote, FetchError> {
        let url = self.url(&format!("api/stocks/{ticker}/view"));
        debug!(url = %url, range = %range, force_update, "Fetching combined quote");

        let payload: CombinedPayload = self
            .expect_data(
                self.client.post(&url).query(&[
                    ("range", range.as_str().to_string()),
                    ("force_update", force_update.to_string()),
                ]),
                Some(ticker),
            )
            .await?;

        Ok(CombinedQuote {
            ticker: payload.ticker,
            prices: payload.prices,
            dividends: payload.dividends,
            prices_updated: payload.prices_updated,
            dividends_updated: payload.dividends_updated,
        })
    }

    async fn force_refresh(&self, ticker: &Ticker) -> Result<QuoteSnapshot, FetchError> {
        let url = self.url(&format!("api/stocks/{ticker}/refresh"));
        debug!(url = %url, "Forcing price refresh");

        let payload: SnapshotPayload = self
            .expect_data(self.client.post(&url), Some(ticker))
            .await?;

        Ok(QuoteSnapshot {
            ticker: ticker.clone(),
            current_price: payload.current_price,
            dividends: payload.dividends,
            timestamp: payload.timestamp,
        })
    }
}

#[async_trait]
impl CompanyDirectory for ApiClient {
    async fn company_name(&self, ticker: &Ticker) -> Result<String, FetchError> {
        let url = self.url(&format!("api/stocks/{ticker}"));
        let payload: CompanyPayload = self
            .expect_data(self.client.get(&url), Some(ticker))
            .await?;
        Ok(payload.company_name)
    }
}
