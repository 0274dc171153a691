//! Change detection and alerting pipeline.
//!
//! One scan: acquire the current snapshot generation, diff against the
//! previous one, classify qualifying moves into alerts, dispatch them
//! sequentially. The alert condition is the OR of the two thresholds: a
//! single significant axis is enough to notify.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::ScanError;
use crate::exchange::ExchangeError;
use crate::market::calc::meets_either_threshold;
use crate::market::service::MarketDataService;
use crate::market::types::{Alert, MarketBias, MarketSnapshot, PriceOiChange};
use crate::notifier::Notifier;
use crate::time::now;

/// Outcome of one completed scan cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanReport {
    /// Markets that had a previous generation to compare against.
    pub changes_analyzed: usize,
    /// Moves that met the alert condition.
    pub alerts_generated: usize,
    /// Alerts actually delivered by the notifier.
    pub alerts_delivered: usize,
}

/// Process-lifetime counters.
#[derive(Debug, Clone, Copy)]
pub struct Statistics {
    pub total_alerts_sent: u64,
    pub tracked_snapshots: usize,
}

pub struct MonitoringEngine {
    market: MarketDataService,
    notifier: Arc<dyn Notifier>,
    price_threshold: f64,
    oi_threshold: f64,
    alert_dispatch_delay: Duration,
    alerts_sent: u64,
}

impl MonitoringEngine {
    pub fn new(
        market: MarketDataService,
        notifier: Arc<dyn Notifier>,
        price_threshold: f64,
        oi_threshold: f64,
        alert_dispatch_delay: Duration,
    ) -> Self {
        Self {
            market,
            notifier,
            price_threshold,
            oi_threshold,
            alert_dispatch_delay,
            alerts_sent: 0,
        }
    }

    /// Establish all exchange sessions.
    pub async fn initialize_markets(&self) -> Result<(), ExchangeError> {
        self.market.initialize().await
    }

    /// Close all exchange sessions.
    pub async fn close_markets(&self) {
        self.market.close().await;
    }

    /// Fetch one snapshot generation without touching the store.
    pub async fn fetch_snapshots(&self) -> Result<Vec<MarketSnapshot>, ScanError> {
        self.market.fetch_all_snapshots().await
    }

    /// Cold-start write: seed the store so the first regular cycle has a
    /// previous generation to diff against. Produces no alerts.
    pub fn store_initial(&mut self, snapshots: Vec<MarketSnapshot>) -> usize {
        self.market.store_snapshots(snapshots)
    }

    /// Run one full scan cycle: fetch, compare, classify, dispatch.
    ///
    /// The shutdown receiver only shortens the inter-alert delay; a scan
    /// that reached the dispatch stage always finishes its alert list.
    pub async fn run_scan(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ScanReport, ScanError> {
        let changes = self.market.get_changes().await?;
        let changes_analyzed = changes.len();

        let alerts = self.analyze_changes(changes);
        let alerts_generated = alerts.len();

        if alerts_generated > 0 {
            info!(alerts = alerts_generated, "significant movements detected");
        }

        let alerts_delivered = self.dispatch_alerts(&alerts, shutdown).await;

        Ok(ScanReport {
            changes_analyzed,
            alerts_generated,
            alerts_delivered,
        })
    }

    /// Classify every qualifying change into an alert.
    pub fn analyze_changes(&self, changes: Vec<PriceOiChange>) -> Vec<Alert> {
        changes
            .into_iter()
            .filter(|c| meets_either_threshold(c, self.price_threshold, self.oi_threshold))
            .map(|change| {
                let bias = MarketBias::classify(change.price_change_pct, change.oi_change_pct);
                info!(
                    key = %change.key,
                    bias = ?bias,
                    price_pct = change.price_change_pct,
                    oi_pct = change.oi_change_pct,
                    "alert generated"
                );
                Alert {
                    key: change.key.clone(),
                    bias,
                    change,
                    generated_at: now(),
                }
            })
            .collect()
    }

    /// Dispatch alerts one at a time with a small delay between sends to
    /// respect the transport's rate limits. A failed delivery is logged and
    /// never blocks the alerts behind it.
    async fn dispatch_alerts(
        &mut self,
        alerts: &[Alert],
        shutdown: &mut watch::Receiver<bool>,
    ) -> usize {
        let mut delivered = 0;

        for (i, alert) in alerts.iter().enumerate() {
            match self.notifier.send_message(&alert.to_telegram_markdown()).await {
                Ok(()) => {
                    self.alerts_sent += 1;
                    delivered += 1;
                    info!(key = %alert.key, total = self.alerts_sent, "alert dispatched");
                }
                Err(e) => {
                    warn!(key = %alert.key, error = %e, "alert dispatch failed");
                }
            }

            let is_last = i + 1 == alerts.len();
            if !is_last && !*shutdown.borrow() {
                tokio::select! {
                    _ = tokio::time::sleep(self.alert_dispatch_delay) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        delivered
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            total_alerts_sent: self.alerts_sent,
            tracked_snapshots: self.market.snapshot_count(),
        }
    }
}
