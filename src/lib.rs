pub mod amount;
pub mod campaign;
pub mod chain;
pub mod config;
pub mod error;
pub mod metrics; // Settlement counters, no exporter
pub mod rewards; // Settlement arithmetic
pub mod types;
pub mod utils;
pub mod wizard; // Campaign creation draft
