//! Exchange data sources.
//!
//! One capability trait covers every venue: `initialize`, `fetch_snapshot`,
//! `close`. The orchestrator depends only on this trait, never on concrete
//! clients. Each client also declares which market requests it serves for a
//! configured symbol, so venue-specific contract variants stay inside the
//! venue's own module.

pub mod binance;
pub mod bybit;
pub mod error;

use async_trait::async_trait;

use crate::market::types::{MarketSnapshot, MarketVariant};
pub use error::ExchangeError;

/// One acquisition target: a symbol plus an optional contract variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotRequest {
    pub symbol: String,
    pub variant: Option<MarketVariant>,
}

impl SnapshotRequest {
    pub fn new(symbol: impl Into<String>, variant: Option<MarketVariant>) -> Self {
        Self {
            symbol: symbol.into(),
            variant,
        }
    }
}

/// Capability interface for one exchange venue.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Stable lowercase venue name used in snapshot keys.
    fn name(&self) -> &'static str;

    /// Expand one configured symbol into the requests this venue serves.
    ///
    /// The default is a single request with no variant; venues listing the
    /// same symbol under multiple contract types override this.
    fn plan_requests(&self, symbol: &str) -> Vec<SnapshotRequest> {
        vec![SnapshotRequest::new(symbol, None)]
    }

    /// Establish the venue session and verify reachability.
    async fn initialize(&self) -> Result<(), ExchangeError>;

    /// Fetch one snapshot. Carries its own per-call timeout; failures are
    /// the caller's to tolerate, not to retry here.
    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> Result<MarketSnapshot, ExchangeError>;

    /// Tear down the venue session. Idempotent.
    async fn close(&self);
}
