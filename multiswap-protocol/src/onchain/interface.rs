use std::fmt::Debug;

use async_trait::async_trait;
use ethers::types::{Address, Bytes};

use crate::bridge::OutboundPacket;
use crate::data_structures::ChainId;
use crate::error::Result;
use crate::onchain::token_ledger::TokenLedger;
use crate::router::Settlement;

/// What a third-party contract sees while it runs: the token ledger, who
/// called it and its own address.
pub struct CallEnv<'a> {
    pub ledger: &'a mut TokenLedger,
    pub caller: Address,
    pub this: Address,
    pub timestamp: u64,
}

/// Code deployed at an address on a simulated chain, typically a DEX
/// aggregator the router forwards opaque calldata to.
///
/// Returning an error is a revert. Ledger changes the call made before
/// failing are undone by whoever isolates the call.
pub trait ContractCode: Send + Sync + Debug {
    fn call(&self, env: &mut CallEnv<'_>, calldata: &[u8]) -> Result<Bytes>;
}

/// Trait the relayer uses to reach a chain. Lets the relayer drive either
/// an in-process chain or something backed by a real node.
#[async_trait]
pub trait ChainInterface: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// Removes and returns every packet dispatched since the last call.
    async fn take_outbound(&self) -> Vec<OutboundPacket>;

    /// Hands an inbound packet to this chain's router as the transport would.
    async fn deliver(&self, packet: &OutboundPacket) -> Result<Settlement>;
}
