// Async transport infrastructure connecting simulated chains

pub mod config;
pub mod relayer;

pub use config::RelayerConfig;
pub use relayer::{FailedDelivery, RelayOutcome, RelayStats, Relayer};
