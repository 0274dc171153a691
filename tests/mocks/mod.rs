//! Mock collaborators for pipeline and scheduler tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use oi_monitor::exchange::{ExchangeClient, ExchangeError, SnapshotRequest};
use oi_monitor::market::types::{MarketSnapshot, SnapshotKey};
use oi_monitor::notifier::{Notifier, NotifierError};

/// Scripted outcome for one fetch call.
#[derive(Debug, Clone, Copy)]
pub enum FetchOutcome {
    /// Return a snapshot with these readings.
    Ok { price: f64, oi: f64, volume: f64 },
    /// Fail immediately (transport error stand-in).
    Fail,
    /// Never settle; drives outer batch timeouts.
    Hang,
}

/// Exchange double with a per-symbol queue of scripted outcomes.
///
/// Each fetch pops the next outcome for its symbol; running past the end of
/// a script is a test bug and panics.
pub struct MockExchange {
    name: &'static str,
    scripts: Mutex<HashMap<String, VecDeque<FetchOutcome>>>,
    pub init_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl MockExchange {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            scripts: Mutex::new(HashMap::new()),
            init_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn script(self, symbol: &str, outcomes: &[FetchOutcome]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(symbol.to_string(), outcomes.iter().copied().collect());
        self
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<(), ExchangeError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_snapshot(&self, request: &SnapshotRequest) -> Result<MarketSnapshot, ExchangeError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let outcome = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.symbol)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("no scripted outcome left for {}", request.symbol));

        match outcome {
            FetchOutcome::Ok { price, oi, volume } => Ok(MarketSnapshot {
                key: SnapshotKey::new(self.name, &request.symbol, request.variant),
                price,
                open_interest_usd: oi,
                volume_24h: volume,
                captured_at: Utc::now(),
            }),
            FetchOutcome::Fail => Err(ExchangeError::InvalidResponse("scripted failure")),
            FetchOutcome::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Notifier double recording every delivered message.
pub struct MockNotifier {
    pub messages: Mutex<Vec<String>>,
    /// Number of upcoming sends to reject before succeeding again.
    pub fail_next: AtomicUsize,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
        }
    }

    pub fn delivered(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_message(&self, text: &str) -> Result<(), NotifierError> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(NotifierError::Rejected("scripted rejection".into()));
        }

        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), NotifierError> {
        Ok(())
    }
}
