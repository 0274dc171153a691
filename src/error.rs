use std::time::Duration;

use thiserror::Error;

/// Errors a single scan cycle can surface to the scheduler.
///
/// Individual per-tuple fetch failures never appear here; the orchestrator
/// swallows them and carries on with the tuples that succeeded. Only
/// whole-scan conditions count against the scheduler's error budget.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("fetch batch did not settle within {0:?}")]
    BatchTimeout(Duration),

    #[error("scan cycle did not complete within {0:?}")]
    ScanTimeout(Duration),
}
