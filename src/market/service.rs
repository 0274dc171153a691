//! Market data acquisition and change detection.
//!
//! Responsibilities:
//! - Expand the configured symbol list into one request per
//!   (exchange, symbol, variant) tuple.
//! - Fan out all requests concurrently under one outer timeout, keeping
//!   whatever subset succeeded.
//! - Diff each fresh snapshot against the previous generation in the store,
//!   then overwrite the store entry (compare first, replace second).

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::ScanError;
use crate::exchange::{ExchangeClient, SnapshotRequest};
use crate::market::calc::compare_snapshots;
use crate::market::store::SnapshotStore;
use crate::market::types::{MarketSnapshot, PriceOiChange};

pub struct MarketDataService {
    exchanges: Vec<Arc<dyn ExchangeClient>>,
    symbols: Vec<String>,
    fetch_timeout: Duration,
    store: SnapshotStore,
}

impl MarketDataService {
    pub fn new(
        exchanges: Vec<Arc<dyn ExchangeClient>>,
        symbols: Vec<String>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            exchanges,
            symbols,
            fetch_timeout,
            store: SnapshotStore::new(),
        }
    }

    /// Establish every exchange session. Fails fast on the first venue that
    /// cannot be reached; the caller decides on retry policy.
    pub async fn initialize(&self) -> Result<(), crate::exchange::ExchangeError> {
        for exchange in &self.exchanges {
            exchange.initialize().await?;
            info!(exchange = exchange.name(), "exchange session established");
        }
        Ok(())
    }

    /// Close every exchange session.
    pub async fn close(&self) {
        for exchange in &self.exchanges {
            exchange.close().await;
        }
    }

    /// The fixed universe: one (client, request) tuple per tracked market.
    fn universe(&self) -> Vec<(Arc<dyn ExchangeClient>, SnapshotRequest)> {
        let mut targets = Vec::new();
        for exchange in &self.exchanges {
            for symbol in &self.symbols {
                for request in exchange.plan_requests(symbol) {
                    targets.push((Arc::clone(exchange), request));
                }
            }
        }
        targets
    }

    /// Fan out one fetch per tuple and collect the subset that succeeded.
    ///
    /// Per-tuple failures are logged and excluded; they never block the
    /// other requests. If the whole batch misses its outer budget, the
    /// partial result is discarded (comparing a stale mixture is worse than
    /// skipping a cycle) and a single batch-timeout error is returned.
    pub async fn fetch_all_snapshots(&self) -> Result<Vec<MarketSnapshot>, ScanError> {
        let targets = self.universe();
        let requested = targets.len();

        let fetches = targets.into_iter().map(|(client, request)| async move {
            match client.fetch_snapshot(&request).await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(
                        exchange = client.name(),
                        symbol = %request.symbol,
                        error = %e,
                        "snapshot fetch failed, excluding from batch"
                    );
                    None
                }
            }
        });

        let results = timeout(self.fetch_timeout, join_all(fetches))
            .await
            .map_err(|_| ScanError::BatchTimeout(self.fetch_timeout))?;

        let snapshots: Vec<MarketSnapshot> = results.into_iter().flatten().collect();
        info!(fetched = snapshots.len(), requested, "market snapshots fetched");

        Ok(snapshots)
    }

    /// One change-detection pass: fetch the current generation and diff it
    /// against the previous one, replacing store entries as we go.
    ///
    /// Keys seen for the first time produce no change, only a store write.
    /// Keys missing from this batch keep their previous store entry
    /// untouched.
    pub async fn get_changes(&mut self) -> Result<Vec<PriceOiChange>, ScanError> {
        let current_snapshots = self.fetch_all_snapshots().await?;
        let mut changes = Vec::new();

        for current in current_snapshots {
            if let Some(previous) = self.store.get(&current.key) {
                if let Some(change) = compare_snapshots(previous, &current) {
                    changes.push(change);
                }
            }
            self.store.put(current);
        }

        Ok(changes)
    }

    /// Seed the store with a snapshot generation without comparing.
    ///
    /// Used by the cold-start pass so the first regular cycle already has a
    /// previous generation to diff against.
    pub fn store_snapshots(&mut self, snapshots: Vec<MarketSnapshot>) -> usize {
        let stored = snapshots.len();

        for snapshot in snapshots {
            self.store.put(snapshot);
        }

        info!(stored, "initial snapshots stored");
        stored
    }

    /// Distinct keys currently tracked.
    pub fn snapshot_count(&self) -> usize {
        self.store.len()
    }
}
