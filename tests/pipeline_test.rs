mod mocks;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use mocks::{FetchOutcome, MockExchange, MockNotifier};
use oi_monitor::engine::MonitoringEngine;
use oi_monitor::error::ScanError;
use oi_monitor::exchange::ExchangeClient;
use oi_monitor::market::service::MarketDataService;
use oi_monitor::market::types::SnapshotKey;

const FETCH_TIMEOUT: Duration = Duration::from_secs(240);

fn service_with(exchange: &Arc<MockExchange>, symbols: &[&str]) -> MarketDataService {
    MarketDataService::new(
        vec![Arc::clone(exchange) as Arc<dyn ExchangeClient>],
        symbols.iter().map(|s| s.to_string()).collect(),
        FETCH_TIMEOUT,
    )
}

fn engine_with(
    service: MarketDataService,
    notifier: &Arc<MockNotifier>,
    price_threshold: f64,
    oi_threshold: f64,
) -> MonitoringEngine {
    MonitoringEngine::new(
        service,
        Arc::clone(notifier) as Arc<dyn oi_monitor::notifier::Notifier>,
        price_threshold,
        oi_threshold,
        Duration::ZERO,
    )
}

fn ok(price: f64, oi: f64) -> FetchOutcome {
    FetchOutcome::Ok {
        price,
        oi,
        volume: 1.0e8,
    }
}

#[tokio::test]
async fn cold_start_seeds_store_without_alerts() {
    let exchange = Arc::new(
        MockExchange::new("binance")
            .script("BTC/USDT", &[ok(45_000.0, 1.2e9), ok(45_000.0, 1.2e9)])
            .script("ETH/USDT", &[ok(2_500.0, 4.0e8), ok(2_500.0, 4.0e8)]),
    );
    let notifier = Arc::new(MockNotifier::new());
    let mut engine = engine_with(
        service_with(&exchange, &["BTC/USDT", "ETH/USDT"]),
        &notifier,
        3.0,
        5.0,
    );
    let (_tx, mut shutdown) = watch::channel(false);

    // Cold start: one store write per key, no comparisons possible.
    let snapshots = engine.fetch_snapshots().await.unwrap();
    assert_eq!(engine.store_initial(snapshots), 2);
    assert_eq!(engine.statistics().tracked_snapshots, 2);

    // First regular cycle: identical readings, so changes but no alerts.
    let report = engine.run_scan(&mut shutdown).await.unwrap();
    assert_eq!(report.changes_analyzed, 2);
    assert_eq!(report.alerts_generated, 0);
    assert!(notifier.delivered().is_empty());
}

#[tokio::test]
async fn partial_failure_keeps_other_keys_flowing() {
    let exchange = Arc::new(
        MockExchange::new("binance")
            .script(
                "BTC/USDT",
                &[ok(100.0, 1.0e9), ok(110.0, 1.0e9), ok(110.0, 1.0e9)],
            )
            .script(
                "ETH/USDT",
                &[ok(50.0, 1.0e8), FetchOutcome::Fail, ok(55.0, 1.0e8)],
            ),
    );
    let mut service = service_with(&exchange, &["BTC/USDT", "ETH/USDT"]);

    let seed = service.fetch_all_snapshots().await.unwrap();
    assert_eq!(service.store_snapshots(seed), 2);

    // ETH fetch fails: the scan still compares BTC, and the stored ETH
    // generation stays untouched.
    let changes = service.get_changes().await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].key, SnapshotKey::new("binance", "BTC/USDT", None));
    assert!((changes[0].price_change_pct - 10.0).abs() < 1e-9);
    assert_eq!(service.snapshot_count(), 2);

    // Next scan diffs ETH against the pre-failure generation (50 -> 55).
    let changes = service.get_changes().await.unwrap();
    let eth = changes
        .iter()
        .find(|c| c.key.symbol == "ETH/USDT")
        .expect("eth change present");
    assert!((eth.price_change_pct - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn single_axis_over_threshold_is_enough_to_alert() {
    // Price +3.5% crosses its 3% threshold, OI +4.0% stays under its 5%;
    // the OR condition still fires.
    let exchange = Arc::new(
        MockExchange::new("binance").script("BTC/USDT", &[ok(100.0, 100.0), ok(103.5, 104.0)]),
    );
    let notifier = Arc::new(MockNotifier::new());
    let mut engine = engine_with(service_with(&exchange, &["BTC/USDT"]), &notifier, 3.0, 5.0);
    let (_tx, mut shutdown) = watch::channel(false);

    let snapshots = engine.fetch_snapshots().await.unwrap();
    engine.store_initial(snapshots);

    let report = engine.run_scan(&mut shutdown).await.unwrap();
    assert_eq!(report.alerts_generated, 1);
    assert_eq!(report.alerts_delivered, 1);
    assert_eq!(engine.statistics().total_alerts_sent, 1);
}

#[tokio::test]
async fn rising_price_and_oi_reads_as_long_inflow() {
    let exchange = Arc::new(
        MockExchange::new("binance").script("BTC/USDT", &[ok(45_000.0, 1.2e9), ok(46_575.0, 1.266e9)]),
    );
    let notifier = Arc::new(MockNotifier::new());
    let mut engine = engine_with(service_with(&exchange, &["BTC/USDT"]), &notifier, 3.0, 5.0);
    let (_tx, mut shutdown) = watch::channel(false);

    let snapshots = engine.fetch_snapshots().await.unwrap();
    engine.store_initial(snapshots);
    engine.run_scan(&mut shutdown).await.unwrap();

    let messages = notifier.delivered();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("ALERT: BTC/USDT"));
    assert!(messages[0].contains("Long Inflow"));
}

#[tokio::test]
async fn falling_price_and_oi_reads_as_long_liquidation() {
    let exchange = Arc::new(
        MockExchange::new("binance").script("SOL/USDT", &[ok(400.0, 2.0e8), ok(380.0, 1.86e8)]),
    );
    let notifier = Arc::new(MockNotifier::new());
    let mut engine = engine_with(service_with(&exchange, &["SOL/USDT"]), &notifier, 3.0, 5.0);
    let (_tx, mut shutdown) = watch::channel(false);

    let snapshots = engine.fetch_snapshots().await.unwrap();
    engine.store_initial(snapshots);
    let report = engine.run_scan(&mut shutdown).await.unwrap();

    // -5.0% price, -7.0% OI.
    assert_eq!(report.alerts_generated, 1);
    let messages = notifier.delivered();
    assert!(messages[0].contains("Long Liquidation"));
}

#[tokio::test]
async fn failed_delivery_does_not_block_later_alerts() {
    let exchange = Arc::new(
        MockExchange::new("binance")
            .script("BTC/USDT", &[ok(100.0, 1.0e9), ok(110.0, 1.2e9)])
            .script("ETH/USDT", &[ok(50.0, 1.0e8), ok(55.0, 1.2e8)]),
    );
    let notifier = Arc::new(MockNotifier::new());
    notifier.fail_next.store(1, std::sync::atomic::Ordering::SeqCst);

    let mut engine = engine_with(
        service_with(&exchange, &["BTC/USDT", "ETH/USDT"]),
        &notifier,
        3.0,
        5.0,
    );
    let (_tx, mut shutdown) = watch::channel(false);

    let snapshots = engine.fetch_snapshots().await.unwrap();
    engine.store_initial(snapshots);
    let report = engine.run_scan(&mut shutdown).await.unwrap();

    assert_eq!(report.alerts_generated, 2);
    assert_eq!(report.alerts_delivered, 1);
    assert_eq!(notifier.delivered().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_batch_times_out_and_touches_nothing() {
    let exchange = Arc::new(MockExchange::new("binance").script("BTC/USDT", &[FetchOutcome::Hang]));
    let mut service = service_with(&exchange, &["BTC/USDT"]);

    let err = service.get_changes().await.unwrap_err();
    assert!(matches!(err, ScanError::BatchTimeout(_)));
    assert_eq!(service.snapshot_count(), 0);
}
