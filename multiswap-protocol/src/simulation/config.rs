use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MultiswapError, Result};

/// How the simulated transport infrastructure behaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayerConfig {
    #[serde(with = "humantime_serde")]
    pub min_delivery_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delivery_delay: Duration,
    /// Probability in [0, 1] that a picked-up packet is never delivered.
    pub drop_rate: f64,
    /// Polling interval of the background loop.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        RelayerConfig {
            min_delivery_delay: Duration::from_millis(5),
            max_delivery_delay: Duration::from_millis(20),
            drop_rate: 0.0,
            tick_interval: Duration::from_millis(5),
        }
    }
}

impl RelayerConfig {
    /// Zero delay, no drops. Deterministic delivery for tests.
    pub fn instant() -> Self {
        RelayerConfig {
            min_delivery_delay: Duration::ZERO,
            max_delivery_delay: Duration::ZERO,
            drop_rate: 0.0,
            tick_interval: Duration::from_millis(1),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: RelayerConfig = serde_json::from_str(json).map_err(|e| MultiswapError::Codec(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.drop_rate) {
            return Err(MultiswapError::Codec(format!("drop rate {} outside [0, 1]", self.drop_rate)));
        }
        if self.min_delivery_delay > self.max_delivery_delay {
            return Err(MultiswapError::Codec("minimum delivery delay exceeds maximum".into()));
        }
        Ok(())
    }
}
