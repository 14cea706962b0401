use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, info, warn};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Duration, Instant};

use crate::bridge::OutboundPacket;
use crate::data_structures::ChainId;
use crate::error::{MultiswapError, Result};
use crate::onchain::interface::ChainInterface;
use crate::router::Settlement;
use crate::simulation::config::RelayerConfig;

#[derive(Debug)]
struct QueuedPacket {
    packet: OutboundPacket,
    picked_up: Instant,
    deliver_at: Instant,
}

/// A packet the destination refused. Parked, never retried automatically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedDelivery {
    pub packet: OutboundPacket,
    pub error: MultiswapError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered(Settlement),
    Failed(FailedDelivery),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    pub picked_up: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Sum over delivered packets of pickup-to-settlement time.
    #[serde(with = "humantime_serde")]
    pub total_latency: Duration,
}

impl RelayStats {
    pub fn average_latency(&self) -> Option<Duration> {
        if self.delivered == 0 {
            return None;
        }
        let nanos = self.total_latency.as_nanos() / u128::from(self.delivered);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

/// Off-chain transport infrastructure shared by all backends: picks packets
/// out of source outboxes and plays them on their destination after a
/// random delay. Drops are silent and nothing is refunded.
pub struct Relayer {
    config: RelayerConfig,
    chains: HashMap<ChainId, Arc<dyn ChainInterface>>,
    queue: Mutex<VecDeque<QueuedPacket>>,
    failed: Mutex<Vec<FailedDelivery>>,
    stats: Mutex<RelayStats>,
}

impl Relayer {
    pub fn new(config: RelayerConfig) -> Self {
        Relayer {
            config,
            chains: HashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            failed: Mutex::new(Vec::new()),
            stats: Mutex::new(RelayStats::default()),
        }
    }

    pub fn with_chain(mut self, chain: Arc<dyn ChainInterface>) -> Self {
        self.chains.insert(chain.chain_id(), chain);
        self
    }

    // Drop decision and delay, decided before any await
    fn schedule(&self) -> Option<Duration> {
        let mut rng = thread_rng();
        if self.config.drop_rate > 0.0 && rng.gen::<f64>() < self.config.drop_rate {
            return None;
        }
        let (min, max) = (self.config.min_delivery_delay, self.config.max_delivery_delay);
        if min >= max {
            return Some(min);
        }
        Some(rng.gen_range(min..=max))
    }

    /// Drains every chain's outbox into the delivery queue.
    pub async fn collect(&self) -> usize {
        let mut picked = Vec::new();
        for chain in self.chains.values() {
            picked.extend(chain.take_outbound().await);
        }
        let count = picked.len();
        if count == 0 {
            return 0;
        }

        let now = Instant::now();
        let mut dropped = 0u64;
        let mut queue = self.queue.lock().await;
        for packet in picked {
            match self.schedule() {
                None => {
                    warn!("[Relayer] dropped message 0x{} ({})", hex::encode(packet.message_id), packet.backend);
                    dropped += 1;
                }
                Some(delay) => {
                    debug!("[Relayer] message 0x{} in flight for {:?}", hex::encode(packet.message_id), delay);
                    let deliver_at = now + delay;
                    // Keep the queue ordered by delivery time
                    let pos = queue.iter().position(|q| q.deliver_at > deliver_at).unwrap_or(queue.len());
                    queue.insert(pos, QueuedPacket { packet, picked_up: now, deliver_at });
                }
            }
        }
        drop(queue);

        let mut stats = self.stats.lock().await;
        stats.picked_up += count as u64;
        stats.dropped += dropped;
        count
    }

    /// Delivers every queued packet whose delay has elapsed.
    pub async fn deliver_ready(&self) -> Vec<RelayOutcome> {
        let now = Instant::now();
        let ready: Vec<QueuedPacket> = {
            let mut queue = self.queue.lock().await;
            let split = queue.iter().position(|q| q.deliver_at > now).unwrap_or(queue.len());
            queue.drain(..split).collect()
        };

        let mut outcomes = Vec::with_capacity(ready.len());
        for queued in ready {
            let outcome = match self.deliver_packet(&queued.packet).await {
                Ok(settlement) => {
                    let mut stats = self.stats.lock().await;
                    stats.delivered += 1;
                    stats.total_latency += queued.picked_up.elapsed();
                    RelayOutcome::Delivered(settlement)
                }
                Err(error) => {
                    warn!("[Relayer] message 0x{} rejected: {}", hex::encode(queued.packet.message_id), error);
                    let failure = FailedDelivery { packet: queued.packet, error };
                    self.failed.lock().await.push(failure.clone());
                    self.stats.lock().await.failed += 1;
                    RelayOutcome::Failed(failure)
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn deliver_packet(&self, packet: &OutboundPacket) -> Result<Settlement> {
        let chain = self
            .chains
            .get(&packet.dst_chain_id)
            .ok_or(MultiswapError::UnknownChain(packet.dst_chain_id))?;
        chain.deliver(packet).await
    }

    pub async fn relay_once(&self) -> Vec<RelayOutcome> {
        self.collect().await;
        self.deliver_ready().await
    }

    /// Collects, then waits out every pending delay until the queue is empty.
    pub async fn flush(&self) -> Vec<RelayOutcome> {
        self.collect().await;
        let mut outcomes = Vec::new();
        loop {
            outcomes.extend(self.deliver_ready().await);
            let next = self.queue.lock().await.front().map(|q| q.deliver_at);
            match next {
                Some(deadline) => sleep_until(deadline).await,
                None => break,
            }
        }
        outcomes
    }

    /// Operator-initiated re-delivery of a packet, e.g. one parked as failed.
    pub async fn redeliver(&self, packet: &OutboundPacket) -> Result<Settlement> {
        info!("[Relayer] manual re-delivery of 0x{}", hex::encode(packet.message_id));
        self.deliver_packet(packet).await
    }

    pub async fn in_flight(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn failed_deliveries(&self) -> Vec<FailedDelivery> {
        self.failed.lock().await.clone()
    }

    pub async fn stats(&self) -> RelayStats {
        self.stats.lock().await.clone()
    }

    /// Runs `relay_once` every tick until the handle is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("[Relayer] background loop started");
            loop {
                self.relay_once().await;
                sleep(self.config.tick_interval).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::{Chain, ChainHandle};
    use ethers::types::Address;

    #[test]
    fn average_latency_needs_deliveries() {
        let mut stats = RelayStats::default();
        assert_eq!(stats.average_latency(), None);
        stats.delivered = 2;
        stats.total_latency = Duration::from_millis(30);
        assert_eq!(stats.average_latency(), Some(Duration::from_millis(15)));
    }

    #[test]
    fn average_latency_survives_huge_delivery_counts() {
        let stats = RelayStats {
            delivered: 1 << 32,
            total_latency: Duration::from_secs(1 << 32),
            ..RelayStats::default()
        };
        assert_eq!(stats.average_latency(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn full_drop_rate_drops_everything() {
        let config = RelayerConfig { drop_rate: 1.0, ..RelayerConfig::instant() };
        let relayer = Relayer::new(config);
        assert!((0..20).all(|_| relayer.schedule().is_none()));
    }

    #[test]
    fn delays_stay_in_range() {
        let config = RelayerConfig {
            min_delivery_delay: Duration::from_millis(10),
            max_delivery_delay: Duration::from_millis(20),
            ..RelayerConfig::default()
        };
        let relayer = Relayer::new(config);
        for _ in 0..50 {
            let delay = relayer.schedule().unwrap();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        }
    }

    #[tokio::test]
    async fn idle_network_relays_nothing() {
        let chain = Arc::new(ChainHandle::new(Chain::new(1, Address::repeat_byte(1))));
        let relayer = Relayer::new(RelayerConfig::instant()).with_chain(chain);
        assert!(relayer.flush().await.is_empty());
        assert_eq!(relayer.stats().await, RelayStats::default());
    }
}
