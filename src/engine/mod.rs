pub mod pipeline;
pub mod scheduler;

pub use pipeline::{MonitoringEngine, ScanReport, Statistics};
pub use scheduler::{ScanScheduler, SchedulerConfig, SchedulerState};
