use std::fmt;

use chrono::{DateTime, Utc};

use crate::market::calc::{format_large_number, format_price};

/// Contract settlement flavor for exchanges that list the same symbol under
/// more than one contract type (e.g. Bybit USDT-margined vs coin-margined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketVariant {
    /// USDT-settled contracts.
    Linear,
    /// Coin-settled contracts.
    Inverse,
}

impl MarketVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketVariant::Linear => "linear",
            MarketVariant::Inverse => "inverse",
        }
    }
}

/// Identity of one tracked market: (exchange, symbol, variant).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub exchange: String,
    pub symbol: String,
    pub variant: Option<MarketVariant>,
}

impl SnapshotKey {
    pub fn new(exchange: &str, symbol: &str, variant: Option<MarketVariant>) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            variant,
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Some(v) => write!(f, "{}:{}:{}", self.exchange, self.symbol, v.as_str()),
            None => write!(f, "{}:{}", self.exchange, self.symbol),
        }
    }
}

/// Point-in-time reading for one market. Immutable once created.
///
/// All magnitudes are non-negative; a zero price is valid and simply yields
/// zero percentage change downstream.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub key: SnapshotKey,

    /// Last traded price.
    pub price: f64,

    /// Open interest, notional USD.
    pub open_interest_usd: f64,

    /// 24h traded volume in quote currency.
    pub volume_24h: f64,

    pub captured_at: DateTime<Utc>,
}

/// Derived delta between two snapshots of the same key. Never stored.
#[derive(Debug, Clone)]
pub struct PriceOiChange {
    pub key: SnapshotKey,

    pub price_change_pct: f64,
    pub oi_change_pct: f64,
    pub volume_change_pct: f64,

    pub current: MarketSnapshot,
    pub previous: MarketSnapshot,
}

/// Directional interpretation of a joint price/OI move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketBias {
    /// Price up, OI up: new longs opening.
    LongInflow,
    /// Price down, OI up: new shorts opening.
    ShortInflow,
    /// Price up, OI down: shorts covering/liquidating.
    ShortSqueeze,
    /// Price down, OI down: longs selling/liquidating.
    LongLiquidation,
}

impl MarketBias {
    /// Classify a move from the signs of the two deltas.
    ///
    /// A delta of exactly `0` counts as "down" on its axis; only a strictly
    /// positive delta counts as "up".
    pub fn classify(price_change_pct: f64, oi_change_pct: f64) -> Self {
        let price_up = price_change_pct > 0.0;
        let oi_up = oi_change_pct > 0.0;

        match (price_up, oi_up) {
            (true, true) => MarketBias::LongInflow,
            (false, true) => MarketBias::ShortInflow,
            (true, false) => MarketBias::ShortSqueeze,
            (false, false) => MarketBias::LongLiquidation,
        }
    }

    /// Emoji-tagged label used in notification bodies.
    pub fn indicator(&self) -> &'static str {
        match self {
            MarketBias::LongInflow => "🔥 Long Inflow",
            MarketBias::ShortInflow => "📉 Short Inflow",
            MarketBias::ShortSqueeze => "⚡ Short Squeeze",
            MarketBias::LongLiquidation => "🌊 Long Liquidation",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MarketBias::LongInflow => "New longs are opening",
            MarketBias::ShortInflow => "New shorts are opening",
            MarketBias::ShortSqueeze => "Shorts are covering/liquidating",
            MarketBias::LongLiquidation => "Longs are selling/liquidating",
        }
    }
}

/// A qualifying move, ready for dispatch. Created by the pipeline, consumed
/// immediately by the scheduler, never retained.
#[derive(Debug, Clone)]
pub struct Alert {
    pub key: SnapshotKey,
    pub bias: MarketBias,
    pub change: PriceOiChange,
    pub generated_at: DateTime<Utc>,
}

impl Alert {
    /// Render the alert as a Telegram Markdown message.
    pub fn to_telegram_markdown(&self) -> String {
        let c = &self.change;

        let mut venue = capitalize(&self.key.exchange);
        if let Some(v) = self.key.variant {
            venue.push(' ');
            venue.push_str(&capitalize(v.as_str()));
        }

        format!(
            "{emoji} *ALERT: {symbol}* | {venue}\n\
             \n\
             *Market Bias: {indicator}*\n\
             _{description}_\n\
             \n\
             *Price:* ${price} | {price_pct:+.2}%\n\
             *OI:* ${oi} USD | {oi_pct:+.2}%\n\
             *Volume (24h):* ${vol} | {vol_pct:+.2}%\n\
             \n\
             ⏰ {ts} UTC",
            emoji = bias_emoji(self.bias),
            symbol = self.key.symbol,
            venue = venue,
            indicator = self.bias.indicator(),
            description = self.bias.description(),
            price = format_price(c.current.price),
            price_pct = c.price_change_pct,
            oi = format_large_number(c.current.open_interest_usd, 2),
            oi_pct = c.oi_change_pct,
            vol = format_large_number(c.current.volume_24h, 2),
            vol_pct = c.volume_change_pct,
            ts = self.generated_at.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

fn bias_emoji(bias: MarketBias) -> &'static str {
    match bias {
        MarketBias::LongInflow => "🔥",
        MarketBias::ShortInflow => "📉",
        MarketBias::ShortSqueeze => "⚡",
        MarketBias::LongLiquidation => "🌊",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
