//! Bybit v5 client, linear and inverse futures.
//!
//! For a configured `BASE/USDT` symbol Bybit serves two markets: the
//! USDT-settled linear contract and, converted to `BASE/USD`, the
//! coin-settled inverse contract. Linear tickers report `openInterestValue`
//! directly in USD; inverse open interest is converted from contracts via
//! the last price, falling back to `openInterestValue` when either factor
//! is missing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::exchange::{ExchangeClient, ExchangeError, SnapshotRequest};
use crate::market::types::{MarketSnapshot, MarketVariant, SnapshotKey};
use crate::time::now;

pub const BYBIT_URL: &str = "https://api.bybit.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V5Envelope<T> {
    ret_code: i64,
    ret_msg: String,
    result: T,
}

#[derive(Debug, Deserialize)]
struct TickerList {
    list: Vec<TickerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerEntry {
    last_price: String,
    turnover24h: String,
    open_interest: String,
    open_interest_value: String,
}

pub struct BybitClient {
    url: String,
    request_timeout: Duration,
    http: RwLock<Option<Client>>,
}

impl BybitClient {
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

fn rest_symbol(symbol: &str) -> String {
    symbol.replace('/', "")
}

fn category(variant: Option<MarketVariant>) -> &'static str {
    match variant {
        Some(MarketVariant::Inverse) => "inverse",
        _ => "linear",
    }
}

/// OI in USD per the contract type's reporting convention.
fn open_interest_usd(
    variant: Option<MarketVariant>,
    price: f64,
    contracts: f64,
    value: f64,
) -> f64 {
    match variant {
        Some(MarketVariant::Inverse) if contracts > 0.0 && price > 0.0 => contracts * price,
        _ => value,
    }
}

#[async_trait]
impl ExchangeClient for BybitClient {
    fn name(&self) -> &'static str {
        "bybit"
    }

    fn plan_requests(&self, symbol: &str) -> Vec<SnapshotRequest> {
        let mut requests = vec![SnapshotRequest::new(symbol, Some(MarketVariant::Linear))];

        // USDT pairs also trade as coin-settled BASE/USD inverse contracts.
        if let Some(base) = symbol.strip_suffix("/USDT") {
            requests.push(SnapshotRequest::new(
                format!("{base}/USD"),
                Some(MarketVariant::Inverse),
            ));
        }

        requests
    }

    async fn initialize(&self) -> Result<(), ExchangeError> {
        let http = self.build_http()?;

        http.get(format!("{}/v5/market/time", self.url))
            .send()
            .await?
            .error_for_status()?;

        *self.http.write().await = Some(http);
        debug!("bybit client initialized");
        Ok(())
    }

    #[instrument(
        skip(self),
        fields(symbol = %request.symbol, category = category(request.variant)),
        level = "debug"
    )]
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> Result<MarketSnapshot, ExchangeError> {
        let http = self.http().await?;
        let rest = rest_symbol(&request.symbol);

        let envelope: V5Envelope<TickerList> = http
            .get(format!("{}/v5/market/tickers", self.url))
            .query(&[
                ("category", category(request.variant)),
                ("symbol", rest.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if envelope.ret_code != 0 {
            return Err(ExchangeError::Api {
                code: envelope.ret_code,
                message: envelope.ret_msg,
            });
        }

        let entry = envelope
            .result
            .list
            .into_iter()
            .next()
            .ok_or(ExchangeError::InvalidResponse("empty ticker list"))?;

        let price: f64 = entry.last_price.parse()?;
        let volume_24h: f64 = entry.turnover24h.parse()?;
        let contracts: f64 = entry.open_interest.parse()?;
        let value: f64 = entry.open_interest_value.parse()?;

        let open_interest_usd = open_interest_usd(request.variant, price, contracts, value);

        debug!(price, open_interest_usd, "bybit snapshot fetched");

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
        debug!("bybit client closed");
    }
}
