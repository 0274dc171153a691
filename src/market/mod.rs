pub mod calc;
pub mod service;
pub mod store;
pub mod types;
