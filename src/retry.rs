//! Retry with exponential backoff.
//!
//! One utility shared by startup initialization and runtime recovery, so the
//! two paths cannot drift apart in behavior.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

/// Run `op` up to `attempts` times, sleeping between failures with a doubling
/// delay starting at `initial_delay`. Returns the first success, or the last
/// error once the attempt budget is exhausted.
///
/// The backoff wait is a suspension point: when `shutdown` flips during (or
/// before) the sleep, the remaining attempts are abandoned and the last
/// error is returned immediately.
pub async fn retry_with_backoff<T, E, F, Fut>(
    label: &'static str,
    attempts: u32,
    initial_delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = initial_delay;

    for attempt in 1..=attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt == attempts => {
                warn!(label, attempt, error = %e, "giving up after final attempt");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    label,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, backing off"
                );

                if !*shutdown.borrow() {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                if *shutdown.borrow() {
                    warn!(label, attempt, "shutdown requested, abandoning retries");
                    return Err(e);
                }

                delay *= 2;
            }
        }
    }

    unreachable!("attempts is validated to be >= 1 by AppConfig")
}
