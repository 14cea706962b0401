// Transport backends a router can dispatch through

pub mod ccip;
pub mod message;
pub mod quantum_portal;
pub mod stargate;

use std::convert::TryFrom;
use std::fmt;

use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::data_structures::{ChainId, MessageId};
use crate::error::MultiswapError;

pub use ccip::CcipRouter;
pub use message::{BridgeMessage, ComposeMessage, DestinationSwap};
pub use quantum_portal::QuantumPortal;
pub use stargate::{MessagingFee, StargateEndpoint, TaxiQuote};

/// Per-call backend selector. The discriminant is the `u8` callers pass in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    /// Async remote call, fee paid in the portal's fee token.
    QuantumPortal = 0,
    /// Generic message, fee paid in native currency.
    Ccip = 1,
    /// Liquidity-carrying transfer with a compose instruction, quoted native fee.
    Stargate = 2,
}

impl Backend {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Backend {
    type Error = MultiswapError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Backend::QuantumPortal),
            1 => Ok(Backend::Ccip),
            2 => Ok(Backend::Stargate),
            other => Err(MultiswapError::UnsupportedBackend(other)),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::QuantumPortal => "quantum-portal",
            Backend::Ccip => "ccip",
            Backend::Stargate => "stargate",
        };
        f.write_str(name)
    }
}

/// A message sitting in a source chain's outbox, waiting for the transport's
/// off-chain infrastructure to carry it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundPacket {
    pub message_id: MessageId,
    pub backend: Backend,
    pub src_chain_id: ChainId,
    pub dst_chain_id: ChainId,
    /// Transport-specific source reference: chain id (portal), chain selector
    /// (CCIP) or endpoint id (Stargate).
    pub source_ref: u64,
    pub sender: Address,
    pub receiver: Address,
    pub payload: Bytes,
    /// Value carried by a liquidity-moving backend.
    pub amount: U256,
}

/// The transport contracts deployed on one chain plus their shared outbox.
#[derive(Clone, Debug)]
pub struct BridgeEndpoints {
    pub portal: QuantumPortal,
    pub ccip: CcipRouter,
    pub stargate: StargateEndpoint,
    /// LayerZero endpoint that invokes compose callbacks.
    pub lz_endpoint: Address,
    outbox: Vec<OutboundPacket>,
}

impl BridgeEndpoints {
    pub fn new(portal: QuantumPortal, ccip: CcipRouter, stargate: StargateEndpoint, lz_endpoint: Address) -> Self {
        BridgeEndpoints { portal, ccip, stargate, lz_endpoint, outbox: Vec::new() }
    }

    pub fn enqueue(&mut self, packet: OutboundPacket) {
        log::debug!(
            "[{}] queued message 0x{} {} -> {}",
            packet.backend,
            hex::encode(packet.message_id),
            packet.src_chain_id,
            packet.dst_chain_id
        );
        self.outbox.push(packet);
    }

    pub fn pending(&self) -> &[OutboundPacket] {
        &self.outbox
    }

    pub fn drain_outbox(&mut self) -> Vec<OutboundPacket> {
        std::mem::take(&mut self.outbox)
    }

    /// Address that calls into the router when a packet of `backend` lands here.
    pub fn delivering_caller(&self, backend: Backend) -> Address {
        match backend {
            Backend::QuantumPortal => self.portal.address,
            Backend::Ccip => self.ccip.address,
            Backend::Stargate => self.lz_endpoint,
        }
    }
}
