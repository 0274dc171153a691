//! Notification transport.
//!
//! The rest of the system only ever needs two operations: push a text
//! message and verify reachability at startup. Message bodies are composed
//! here so alerting call-sites stay free of formatting concerns.

pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use telegram::TelegramNotifier;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api rejected message: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Push one text message. Not retried; the caller decides whether a
    /// failure matters.
    async fn send_message(&self, text: &str) -> Result<(), NotifierError>;

    /// Startup reachability check.
    async fn test_connection(&self) -> Result<(), NotifierError>;
}

/// Startup announcement pushed once after initialization succeeds.
pub fn startup_message(
    symbol_count: usize,
    price_threshold: f64,
    oi_threshold: f64,
    scan_interval: Duration,
) -> String {
    format!(
        "🤖 *Futures Monitor Started*\n\
         \n\
         ✅ Monitoring active\n\
         📊 Tracking {symbol_count} symbols across Binance and Bybit\n\
         🚨 Alerting on price ≥ {price_threshold}% or OI ≥ {oi_threshold}%\n\
         ⏱ Scanning every {}s\n\
         \n\
         The bot is now watching the markets!",
        scan_interval.as_secs(),
    )
}

/// Non-fatal warning body, used for scan failures and recovery notices.
pub fn error_message(detail: &str) -> String {
    format!(
        "⚠️ *Monitor Warning*\n\
         \n\
         {detail}\n\
         \n\
         Monitoring continues; check the logs for details."
    )
}
