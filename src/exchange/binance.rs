//! Binance USDⓈ-M futures client.
//!
//! Two public endpoints per snapshot: the 24h ticker for price/volume and
//! the open-interest endpoint. Binance reports open interest in base-asset
//! contracts, so the USD notional is `contracts * price`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::exchange::{ExchangeClient, ExchangeError, SnapshotRequest};
use crate::market::types::{MarketSnapshot, SnapshotKey};
use crate::time::now;

pub const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: String,
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterest {
    open_interest: String,
}

pub struct BinanceClient {
    url: String,
    request_timeout: Duration,
    http: RwLock<Option<Client>>,
}

impl BinanceClient {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout,
            http: RwLock::new(None),
        }
    }

    fn build_http(&self) -> Result<Client, ExchangeError> {
        let http = Client::builder()
            .timeout(self.request_timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(http)
    }

    async fn http(&self) -> Result<Client, ExchangeError> {
        self.http
            .read()
            .await
            .clone()
            .ok_or(ExchangeError::NotInitialized)
    }
}

/// `BTC/USDT` -> `BTCUSDT`
fn rest_symbol(symbol: &str) -> String {
    symbol.replace('/', "")
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn initialize(&self) -> Result<(), ExchangeError> {
        let http = self.build_http()?;

        http.get(format!("{}/fapi/v1/ping", self.url))
            .send()
            .await?
            .error_for_status()?;

        *self.http.write().await = Some(http);
        debug!("binance client initialized");
        Ok(())
    }

    #[instrument(skip(self), fields(symbol = %request.symbol), level = "debug")]
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> Result<MarketSnapshot, ExchangeError> {
        let http = self.http().await?;
        let rest = rest_symbol(&request.symbol);

        let ticker: Ticker24h = http
            .get(format!("{}/fapi/v1/ticker/24hr", self.url))
            .query(&[("symbol", rest.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let oi: OpenInterest = http
            .get(format!("{}/fapi/v1/openInterest", self.url))
            .query(&[("symbol", rest.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let price: f64 = ticker.last_price.parse()?;
        let volume_24h: f64 = ticker.quote_volume.parse()?;
        let contracts: f64 = oi.open_interest.parse()?;
        let open_interest_usd = contracts * price;

        debug!(price, open_interest_usd, "binance snapshot fetched");

        Ok(MarketSnapshot {
            key: SnapshotKey::new(self.name(), &request.symbol, request.variant),
            price,
            open_interest_usd,
            volume_24h,
            captured_at: now(),
        })
    }

    async fn close(&self) {
        self.http.write().await.take();
        debug!("binance client closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_symbol_strips_separator() {
        assert_eq!(rest_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(rest_symbol("SOLUSDT"), "SOLUSDT");
    }

    #[tokio::test]
    async fn fetch_before_initialize_is_rejected() {
        let client = BinanceClient::new("http://localhost:9", Duration::from_secs(1));
        let req = SnapshotRequest::new("BTC/USDT", None);

        let err = client.fetch_snapshot(&req).await.unwrap_err();
        assert!(matches!(err, ExchangeError::NotInitialized));
    }
}
