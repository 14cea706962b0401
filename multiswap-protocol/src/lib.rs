pub mod bridge;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod events;
pub mod onchain;
pub mod pool;
pub mod referral;
pub mod registry;
pub mod router;
pub mod simulation;

pub mod test_utils; // shared fixtures for unit and integration tests

pub use error::{MultiswapError, Result};
