use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use oi_monitor::{
    config::AppConfig,
    engine::{MonitoringEngine, ScanScheduler, SchedulerConfig},
    exchange::{
        ExchangeClient,
        binance::{BINANCE_FUTURES_URL, BinanceClient},
        bybit::{BYBIT_URL, BybitClient},
    },
    logger::init_tracing,
    market::service::MarketDataService,
    notifier::{Notifier, TelegramNotifier, telegram::TELEGRAM_API_URL},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("starting futures price/OI monitor");

    let cfg = AppConfig::from_env().context("configuration validation failed")?;

    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(
        TELEGRAM_API_URL,
        &cfg.telegram_token,
        &cfg.telegram_chat_id,
        cfg.request_timeout,
    )?);

    let exchanges: Vec<Arc<dyn ExchangeClient>> = vec![
        Arc::new(BinanceClient::new(BINANCE_FUTURES_URL, cfg.request_timeout)),
        Arc::new(BybitClient::new(BYBIT_URL, cfg.request_timeout)),
    ];

    let market = MarketDataService::new(exchanges, cfg.symbols.clone(), cfg.fetch_timeout);

    let engine = MonitoringEngine::new(
        market,
        Arc::clone(&notifier),
        cfg.price_threshold_pct,
        cfg.oi_threshold_pct,
        cfg.alert_dispatch_delay,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut scheduler = ScanScheduler::new(
        engine,
        notifier,
        SchedulerConfig::from(&cfg),
        shutdown_rx,
    );

    scheduler.run().await
}
