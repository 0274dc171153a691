//! The outer scan control loop.
//!
//! Responsibilities:
//! - Initialize collaborators (notifier reachability, exchange sessions)
//!   and run the cold-start snapshot pass before the first regular cycle.
//! - Run one scan per interval under a per-scan timeout; cycles never
//!   overlap.
//! - Count consecutive scan failures and force a reconnect of every
//!   exchange session once the budget is exhausted.
//! - Shut down deterministically on the external signal: the interval wait
//!   is interruptible, an in-flight scan finishes, sessions are closed, and
//!   final statistics are reported.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::engine::pipeline::MonitoringEngine;
use crate::error::ScanError;
use crate::notifier::{Notifier, error_message, startup_message};
use crate::retry::retry_with_backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Initializing,
    Running,
    Recovering,
    ShuttingDown,
    Stopped,
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub scan_interval: Duration,
    pub scan_timeout: Duration,
    pub max_consecutive_errors: u32,
    pub init_retry_attempts: u32,
    pub init_retry_backoff: Duration,
    pub recovery_pause: Duration,

    /// Echoed in the startup notification.
    pub symbol_count: usize,
    pub price_threshold_pct: f64,
    pub oi_threshold_pct: f64,
}

impl From<&AppConfig> for SchedulerConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            scan_interval: cfg.scan_interval,
            scan_timeout: cfg.scan_timeout,
            max_consecutive_errors: cfg.max_consecutive_errors,
            init_retry_attempts: cfg.init_retry_attempts,
            init_retry_backoff: cfg.init_retry_backoff,
            recovery_pause: cfg.recovery_pause,
            symbol_count: cfg.symbols.len(),
            price_threshold_pct: cfg.price_threshold_pct,
            oi_threshold_pct: cfg.oi_threshold_pct,
        }
    }
}

pub struct ScanScheduler {
    engine: MonitoringEngine,
    notifier: Arc<dyn Notifier>,
    cfg: SchedulerConfig,
    shutdown: watch::Receiver<bool>,
    state: SchedulerState,
    consecutive_errors: u32,
}

impl ScanScheduler {
    pub fn new(
        engine: MonitoringEngine,
        notifier: Arc<dyn Notifier>,
        cfg: SchedulerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            notifier,
            cfg,
            shutdown,
            state: SchedulerState::Initializing,
            consecutive_errors: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Bring up all collaborators and seed the snapshot store.
    ///
    /// Every step runs under the shared bounded-backoff retry; exhausting a
    /// budget here is fatal and bubbles up so the process exits non-zero.
    pub async fn initialize(&mut self) -> Result<()> {
        self.state = SchedulerState::Initializing;
        info!("initializing scan scheduler");

        // Retries select on their own receiver so the run loop's copy keeps
        // its unseen-change state for the interval wait.
        let mut shutdown = self.shutdown.clone();

        retry_with_backoff(
            "notifier connection test",
            self.cfg.init_retry_attempts,
            self.cfg.init_retry_backoff,
            &mut shutdown,
            || self.notifier.test_connection(),
        )
        .await
        .context("notifier unreachable")?;

        retry_with_backoff(
            "exchange initialization",
            self.cfg.init_retry_attempts,
            self.cfg.init_retry_backoff,
            &mut shutdown,
            || self.engine.initialize_markets(),
        )
        .await
        .context("exchange initialization failed")?;

        let snapshots = retry_with_backoff(
            "cold-start snapshot pass",
            self.cfg.init_retry_attempts,
            self.cfg.init_retry_backoff,
            &mut shutdown,
            || self.engine.fetch_snapshots(),
        )
        .await
        .context("cold-start snapshot pass failed")?;
        self.engine.store_initial(snapshots);

        let announcement = startup_message(
            self.cfg.symbol_count,
            self.cfg.price_threshold_pct,
            self.cfg.oi_threshold_pct,
            self.cfg.scan_interval,
        );
        if let Err(e) = self.notifier.send_message(&announcement).await {
            warn!(error = %e, "startup notification failed");
        }

        info!(
            tracked = self.engine.statistics().tracked_snapshots,
            interval_s = self.cfg.scan_interval.as_secs(),
            "scheduler initialized"
        );
        Ok(())
    }

    /// Initialize, then scan on the fixed interval until shutdown.
    pub async fn run(&mut self) -> Result<()> {
        self.initialize().await?;
        self.state = SchedulerState::Running;

        let mut ticker = interval(self.cfg.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a fresh interval completes immediately; the
        // cold-start pass just ran, so wait a full interval instead.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.changed() => break,
            }
            if *self.shutdown.borrow() {
                break;
            }

            let outcome = self.run_one_scan().await;
            self.record_scan_outcome(outcome).await;
        }

        self.shutdown_sequence().await;
        Ok(())
    }

    /// One scan cycle under the per-scan budget.
    async fn run_one_scan(&mut self) -> Result<crate::engine::ScanReport, ScanError> {
        info!("scan cycle starting");

        let mut scan_shutdown = self.shutdown.clone();
        match timeout(
            self.cfg.scan_timeout,
            self.engine.run_scan(&mut scan_shutdown),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ScanError::ScanTimeout(self.cfg.scan_timeout)),
        }
    }

    /// Apply one scan outcome to the error budget.
    ///
    /// Success resets the consecutive-error counter; a failure increments
    /// it, pushes a best-effort warning notification, and forces a
    /// reconnection cycle once the budget is exhausted.
    pub async fn record_scan_outcome(&mut self, outcome: Result<crate::engine::ScanReport, ScanError>) {
        match outcome {
            Ok(report) => {
                self.consecutive_errors = 0;
                let stats = self.engine.statistics();
                info!(
                    analyzed = report.changes_analyzed,
                    alerts = report.alerts_generated,
                    delivered = report.alerts_delivered,
                    total_alerts = stats.total_alerts_sent,
                    tracked = stats.tracked_snapshots,
                    "scan cycle complete"
                );
            }
            Err(e) => {
                self.consecutive_errors += 1;
                warn!(
                    error = %e,
                    consecutive = self.consecutive_errors,
                    budget = self.cfg.max_consecutive_errors,
                    "scan cycle failed"
                );

                let body = error_message(&format!("Market scan failed: {e}"));
                if let Err(ne) = self.notifier.send_message(&body).await {
                    warn!(error = %ne, "warning notification failed");
                }

                if self.consecutive_errors >= self.cfg.max_consecutive_errors {
                    self.recover().await;
                }
            }
        }
    }

    /// Close and reopen every exchange session.
    ///
    /// The counter resets whether or not reopening succeeded: a failed
    /// recovery leaves the scheduler in Running and earns another full
    /// budget of scans before the next attempt.
    async fn recover(&mut self) {
        self.state = SchedulerState::Recovering;
        info!(
            after_failures = self.consecutive_errors,
            "error budget exhausted, reconnecting exchange sessions"
        );

        self.engine.close_markets().await;

        // Waits here select on a cloned receiver: consuming the change on
        // the run loop's own copy would leave its interval wait blind to
        // the signal until the next tick.
        let mut shutdown = self.shutdown.clone();
        if !*shutdown.borrow() {
            tokio::select! {
                _ = tokio::time::sleep(self.cfg.recovery_pause) => {}
                _ = shutdown.changed() => {}
            }
        }

        match retry_with_backoff(
            "exchange reconnection",
            self.cfg.init_retry_attempts,
            self.cfg.init_retry_backoff,
            &mut shutdown,
            || self.engine.initialize_markets(),
        )
        .await
        {
            Ok(()) => info!("exchange sessions reconnected"),
            Err(e) => error!(error = %e, "recovery failed, will retry at next budget breach"),
        }

        self.consecutive_errors = 0;
        self.state = SchedulerState::Running;
    }

    async fn shutdown_sequence(&mut self) {
        self.state = SchedulerState::ShuttingDown;
        info!("shutting down scan scheduler");

        self.engine.close_markets().await;

        let stats = self.engine.statistics();
        info!(
            total_alerts = stats.total_alerts_sent,
            tracked = stats.tracked_snapshots,
            "final statistics"
        );

        self.state = SchedulerState::Stopped;
    }
}
