use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Runtime configuration, resolved once from environment variables at
/// process start. Not reloaded while running.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // =========================
    // Notifier configuration
    // =========================
    /// Telegram bot token used for the Bot API.
    pub telegram_token: String,

    /// Chat the bot pushes alerts into.
    pub telegram_chat_id: String,

    // =========================
    // Universe configuration
    // =========================
    /// Symbols to monitor, in `BASE/QUOTE` form (e.g. `BTC/USDT`).
    ///
    /// Each exchange client expands a symbol into its own set of market
    /// requests (Bybit adds an inverse `BASE/USD` leg for USDT pairs).
    pub symbols: Vec<String>,

    // =========================
    // Alerting thresholds
    // =========================
    /// Absolute price change (percent) that qualifies a move for alerting.
    pub price_threshold_pct: f64,

    /// Absolute open-interest change (percent) that qualifies a move.
    pub oi_threshold_pct: f64,

    // =========================
    // Scheduling configuration
    // =========================
    /// Wall-clock spacing between scan cycles.
    pub scan_interval: Duration,

    /// Budget for one whole scan cycle (fetch + compare + dispatch).
    /// A scan exceeding this counts against the consecutive-error budget.
    pub scan_timeout: Duration,

    /// Budget for the concurrent fetch batch inside a scan. If the batch
    /// does not settle in time the scan is treated as empty and the
    /// condition is surfaced as a single error.
    pub fetch_timeout: Duration,

    /// Per-request HTTP timeout applied inside each exchange client.
    pub request_timeout: Duration,

    /// Consecutive failed scans tolerated before forcing a reconnect of
    /// every exchange client.
    pub max_consecutive_errors: u32,

    /// Attempts allowed when initializing or re-initializing a collaborator.
    pub init_retry_attempts: u32,

    /// First backoff delay for initialization retries; doubles per attempt.
    pub init_retry_backoff: Duration,

    /// Pause between closing and reopening exchange clients in recovery.
    pub recovery_pause: Duration,

    /// Spacing between consecutive alert pushes, to stay under the
    /// notification transport's rate limits.
    pub alert_dispatch_delay: Duration,
}

impl AppConfig {
    /// Resolve and validate configuration from the environment.
    ///
    /// A missing credential, empty symbol list, or unparsable numeric value
    /// is a fatal configuration error: the caller exits non-zero.
    pub fn from_env() -> Result<Self> {
        let telegram_token = std::env::var("TELEGRAM_TOKEN").unwrap_or_default();
        let telegram_chat_id = std::env::var("CHAT_ID").unwrap_or_default();

        let symbols_raw = std::env::var("SYMBOLS")
            .unwrap_or_else(|_| "BTC/USDT,ETH/USDT,SOL/USDT,BNB/USDT".to_string());
        let symbols: Vec<String> = symbols_raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let cfg = Self {
            telegram_token,
            telegram_chat_id,
            symbols,

            price_threshold_pct: env_parse("PRICE_THRESHOLD", 3.0)?,
            oi_threshold_pct: env_parse("OI_THRESHOLD", 5.0)?,

            scan_interval: Duration::from_secs(env_parse("SCAN_INTERVAL", 300u64)?),
            scan_timeout: Duration::from_secs(env_parse("SCAN_TIMEOUT", 270u64)?),
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT", 240u64)?),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT", 10u64)?),

            max_consecutive_errors: env_parse("MAX_CONSECUTIVE_ERRORS", 5u32)?,
            init_retry_attempts: env_parse("INIT_RETRY_ATTEMPTS", 5u32)?,
            init_retry_backoff: Duration::from_secs(env_parse("INIT_RETRY_BACKOFF", 2u64)?),
            recovery_pause: Duration::from_secs(env_parse("RECOVERY_PAUSE", 5u64)?),

            alert_dispatch_delay: Duration::from_millis(env_parse("ALERT_DISPATCH_DELAY_MS", 500u64)?),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram_token.is_empty() {
            bail!("TELEGRAM_TOKEN is not set");
        }
        if self.telegram_chat_id.is_empty() {
            bail!("CHAT_ID is not set");
        }
        if self.symbols.is_empty() {
            bail!("SYMBOLS resolved to an empty list");
        }
        if self.price_threshold_pct <= 0.0 || self.oi_threshold_pct <= 0.0 {
            bail!("thresholds must be positive percentages");
        }
        if self.scan_interval.is_zero() {
            bail!("SCAN_INTERVAL must be at least one second");
        }
        if self.max_consecutive_errors == 0 || self.init_retry_attempts == 0 {
            bail!("error and retry budgets must be at least 1");
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
