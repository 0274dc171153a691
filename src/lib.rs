pub mod config;
pub mod engine;
pub mod exchange;
pub mod market;
pub mod notifier;

pub mod error;
pub mod logger;
pub mod retry;
pub mod time;
