//! Pure change calculations over market snapshots.
//!
//! Everything in this module is deterministic and side-effect free; the
//! pipeline owns all state and sequencing.

use crate::market::types::{MarketSnapshot, PriceOiChange};

/// Percentage change of `new` relative to `old`.
///
/// Defined as `0` when `old == 0` to avoid division by zero; a market that
/// appears from nothing is treated as unchanged rather than infinite.
pub fn percentage_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        return 0.0;
    }
    ((new - old) / old) * 100.0
}

/// Compare two snapshots of the same key.
///
/// Returns `None` when the keys differ; keys are matched by construction in
/// the pipeline, so this is a defensive guard.
pub fn compare_snapshots(previous: &MarketSnapshot, current: &MarketSnapshot) -> Option<PriceOiChange> {
    if previous.key != current.key {
        return None;
    }

    Some(PriceOiChange {
        key: current.key.clone(),
        price_change_pct: percentage_change(previous.price, current.price),
        oi_change_pct: percentage_change(previous.open_interest_usd, current.open_interest_usd),
        volume_change_pct: percentage_change(previous.volume_24h, current.volume_24h),
        current: current.clone(),
        previous: previous.clone(),
    })
}

/// The pipeline's alert condition: a single significant axis is sufficient.
pub fn meets_either_threshold(
    change: &PriceOiChange,
    price_threshold: f64,
    oi_threshold: f64,
) -> bool {
    change.price_change_pct.abs() >= price_threshold
        || change.oi_change_pct.abs() >= oi_threshold
}

/// Stricter variant requiring both axes to qualify.
///
/// Kept as an auxiliary predicate for callers that want high-conviction
/// moves only; the alerting pipeline deliberately uses
/// [`meets_either_threshold`] instead.
pub fn meets_both_thresholds(
    change: &PriceOiChange,
    price_threshold: f64,
    oi_threshold: f64,
) -> bool {
    change.price_change_pct.abs() >= price_threshold
        && change.oi_change_pct.abs() >= oi_threshold
}

/// Format a magnitude with K/M/B suffixes for notification bodies.
pub fn format_large_number(value: f64, decimals: usize) -> String {
    if value >= 1_000_000_000.0 {
        format!("{:.*}B", decimals, value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("{:.*}M", decimals, value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.*}K", decimals, value / 1_000.0)
    } else {
        format!("{:.*}", decimals, value)
    }
}

/// Format a price with comma-grouped integer digits and two decimals.
pub fn format_price(value: f64) -> String {
    let raw = format!("{:.2}", value.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    for (i, d) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*d);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}
