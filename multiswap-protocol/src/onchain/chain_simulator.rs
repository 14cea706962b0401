use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::keccak256;
use log::{debug, warn};
use tokio::sync::{Mutex, MutexGuard};

use crate::bridge::{
    Backend, BridgeEndpoints, CcipRouter, DestinationSwap, OutboundPacket, QuantumPortal, StargateEndpoint,
};
use crate::config::RouterConfig;
use crate::data_structures::{ChainId, NATIVE_TOKEN};
use crate::error::{MultiswapError, Result};
use crate::events::Event;
use crate::onchain::interface::{CallEnv, ChainInterface, ContractCode};
use crate::onchain::token_ledger::TokenLedger;
use crate::pool::Pool;
use crate::router::{BridgeLeg, DispatchReceipt, FiberRouter, Settlement, SourceSwap};

/// Deterministic per-chain address for a named deployment.
pub fn contract_address(chain_id: ChainId, label: &str) -> Address {
    let hash = keccak256(abi::encode(&[Token::Uint(U256::from(chain_id)), Token::String(label.to_string())]));
    Address::from_slice(&hash[12..])
}

/// Sender and attached native value of one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxContext {
    pub sender: Address,
    pub value: U256,
}

impl TxContext {
    pub fn call(sender: Address) -> Self {
        TxContext { sender, value: U256::zero() }
    }

    pub fn with_value(sender: Address, value: U256) -> Self {
        TxContext { sender, value }
    }
}

/// A mined transaction and the events it emitted.
#[derive(Clone, Debug)]
pub struct Block {
    pub block_number: u64,
    pub timestamp: u64,
    pub sender: Address,
    pub events: Vec<Event>,
}

// Everything a failed transaction must leave untouched
#[derive(Clone, Debug)]
struct ChainState {
    ledger: TokenLedger,
    pool: Pool,
    router: FiberRouter,
    endpoints: BridgeEndpoints,
}

/// What a router call can reach while it executes.
pub struct Env<'a> {
    pub chain_id: ChainId,
    pub timestamp: u64,
    pub tx: TxContext,
    pub ledger: &'a mut TokenLedger,
    pub pool: &'a mut Pool,
    pub endpoints: &'a mut BridgeEndpoints,
    events: &'a mut Vec<Event>,
    code: &'a HashMap<Address, Arc<dyn ContractCode>>,
}

impl<'a> Env<'a> {
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn call_contract(&mut self, caller: Address, target: Address, calldata: &[u8]) -> Result<Bytes> {
        let code = self.code.get(&target).ok_or(MultiswapError::UnknownContract(target))?;
        let mut call_env = CallEnv { ledger: &mut *self.ledger, caller, this: target, timestamp: self.timestamp };
        code.call(&mut call_env, calldata)
    }
}

/// One simulated chain: token ledger, Pool, FiberRouter and the transport
/// endpoints deployed next to them.
#[derive(Debug)]
pub struct Chain {
    pub chain_id: ChainId,
    timestamp: u64,
    block_number: u64,
    state: ChainState,
    code: HashMap<Address, Arc<dyn ContractCode>>,
    blocks: Vec<Block>,
}

impl Chain {
    /// Deploys the full contract set owned by `owner` and binds the pool to
    /// the router.
    pub fn new(chain_id: ChainId, owner: Address) -> Self {
        let portal = QuantumPortal::new(
            contract_address(chain_id, "quantum-portal"),
            contract_address(chain_id, "quantum-portal-fee-target"),
        );
        let selector_hash = keccak256(contract_address(chain_id, "ccip-selector").as_bytes());
        let mut selector_bytes = [0u8; 8];
        selector_bytes.copy_from_slice(&selector_hash[..8]);
        let ccip = CcipRouter::new(
            contract_address(chain_id, "ccip-router"),
            u64::from_be_bytes(selector_bytes),
            contract_address(chain_id, "ccip-fee-collector"),
        );
        let stargate = StargateEndpoint::new(
            contract_address(chain_id, "stargate-pool"),
            30_000 + (chain_id % 10_000) as u32,
            contract_address(chain_id, "stargate-fee-collector"),
        );
        let endpoints = BridgeEndpoints::new(portal, ccip, stargate, contract_address(chain_id, "lz-endpoint"));

        let router = FiberRouter::new(
            contract_address(chain_id, "fiber-router"),
            owner,
            endpoints.portal.address,
            endpoints.ccip.address,
            RouterConfig::new(owner, owner),
        );
        let mut pool = Pool::new(contract_address(chain_id, "pool"), owner);
        let mut events = Vec::new();
        // Fresh pool, caller is its owner: cannot fail
        if let Err(e) = pool.set_fiber_router(owner, router.address, &mut events) {
            warn!("chain {}: pool binding failed: {}", chain_id, e);
        }

        let timestamp = chrono::Utc::now().timestamp().max(0) as u64;
        Chain {
            chain_id,
            timestamp,
            block_number: 0,
            state: ChainState { ledger: TokenLedger::new(), pool, router, endpoints },
            code: HashMap::new(),
            blocks: vec![Block { block_number: 0, timestamp, sender: owner, events }],
        }
    }

    pub fn router(&self) -> &FiberRouter {
        &self.state.router
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }

    pub fn endpoints(&self) -> &BridgeEndpoints {
        &self.state.endpoints
    }

    /// Direct access to the third-party transport contracts, for configuring
    /// fee tokens, fee levels and liquidity outside any transaction.
    pub fn endpoints_mut(&mut self) -> &mut BridgeEndpoints {
        &mut self.state.endpoints
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.state.ledger
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.state.ledger.balance_of(token, holder)
    }

    pub fn native_balance(&self, holder: Address) -> U256 {
        self.balance_of(NATIVE_TOKEN, holder)
    }

    pub fn pool_balance(&self, token: Address) -> U256 {
        self.state.pool.balance(&self.state.ledger, token)
    }

    /// Faucet: credits `amount` of `token` (or native) out of thin air.
    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<()> {
        self.state.ledger.mint(token, to, amount)
    }

    pub fn approve(&mut self, owner: Address, token: Address, spender: Address, amount: U256) {
        self.state.ledger.approve(token, owner, spender, amount);
    }

    pub fn deploy_code(&mut self, address: Address, code: Arc<dyn ContractCode>) {
        self.code.insert(address, code);
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.timestamp += seconds;
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.blocks.iter().flat_map(|b| b.events.iter())
    }

    /// Events emitted by the most recent successful transaction.
    pub fn last_events(&self) -> &[Event] {
        self.blocks.last().map(|b| b.events.as_slice()).unwrap_or(&[])
    }

    /// Runs `f` against the router as a single transaction. Attached value
    /// is credited to the router first. On error every change is discarded.
    pub fn transact<T>(
        &mut self,
        tx: TxContext,
        f: impl FnOnce(&mut FiberRouter, &mut Env<'_>) -> Result<T>,
    ) -> Result<T> {
        let snapshot = self.state.clone();
        let mut events = Vec::new();

        let ChainState { ledger, pool, router, endpoints } = &mut self.state;
        let mut env = Env {
            chain_id: self.chain_id,
            timestamp: self.timestamp,
            tx,
            ledger,
            pool,
            endpoints,
            events: &mut events,
            code: &self.code,
        };
        let result = env
            .ledger
            .transfer(NATIVE_TOKEN, tx.sender, router.address, tx.value)
            .and_then(|_| f(router, &mut env));

        match result {
            Ok(value) => {
                self.block_number += 1;
                self.blocks.push(Block {
                    block_number: self.block_number,
                    timestamp: self.timestamp,
                    sender: tx.sender,
                    events,
                });
                Ok(value)
            }
            Err(e) => {
                debug!("chain {}: tx from {:?} reverted: {}", self.chain_id, tx.sender, e);
                self.state = snapshot;
                Err(e)
            }
        }
    }

    pub fn take_outbound(&mut self) -> Vec<OutboundPacket> {
        self.state.endpoints.drain_outbox()
    }

    /// Plays the transport's delivery transaction for `packet` on this chain.
    pub fn deliver(&mut self, packet: &OutboundPacket) -> Result<Settlement> {
        if packet.dst_chain_id != self.chain_id {
            return Err(MultiswapError::WrongDestination { expected: self.chain_id, got: packet.dst_chain_id });
        }
        if packet.receiver != self.state.router.address {
            return Err(MultiswapError::UnknownContract(packet.receiver));
        }
        let caller = self.state.endpoints.delivering_caller(packet.backend);
        self.transact(TxContext::call(caller), |router, env| match packet.backend {
            Backend::QuantumPortal | Backend::Ccip => {
                router.handle_inbound(env, packet.backend, packet.source_ref, packet.sender, &packet.payload)
            }
            Backend::Stargate => {
                let src_eid = u32::try_from(packet.source_ref)
                    .map_err(|_| MultiswapError::Codec(format!("endpoint id {} out of range", packet.source_ref)))?;
                let stargate = env.endpoints.stargate.clone();
                let compose = stargate.receive(
                    env.ledger,
                    src_eid,
                    packet.sender,
                    packet.receiver,
                    packet.amount,
                    packet.payload.clone(),
                )?;
                router.lz_compose(env, stargate.address, &compose.encode())
            }
        })
    }

    // ---- user-facing wrappers ----

    pub fn add_liquidity(&mut self, provider: Address, token: Address, amount: U256) -> Result<()> {
        self.transact(TxContext::call(provider), |_, env| {
            env.pool.add_liquidity(env.ledger, provider, token, amount, env.events)
        })
    }

    pub fn remove_liquidity(&mut self, caller: Address, token: Address, amount: U256, to: Address) -> Result<()> {
        self.transact(TxContext::call(caller), |_, env| {
            env.pool.remove_liquidity(env.ledger, caller, token, amount, to, env.events)
        })
    }

    pub fn set_fiber_router(&mut self, caller: Address, router: Address) -> Result<()> {
        self.transact(TxContext::call(caller), |_, env| env.pool.set_fiber_router(caller, router, env.events))
    }

    pub fn cross(&mut self, tx: TxContext, token: Address, amount: U256, leg: &BridgeLeg) -> Result<DispatchReceipt> {
        self.transact(tx, |router, env| router.cross(env, token, amount, leg))
    }

    pub fn swap_and_cross(&mut self, tx: TxContext, swap: &SourceSwap, leg: &BridgeLeg) -> Result<DispatchReceipt> {
        self.transact(tx, |router, env| router.swap_and_cross(env, swap, leg))
    }

    pub fn cross_and_swap(
        &mut self,
        tx: TxContext,
        token: Address,
        amount: U256,
        leg: &BridgeLeg,
        destination_swap: &DestinationSwap,
    ) -> Result<DispatchReceipt> {
        self.transact(tx, |router, env| router.cross_and_swap(env, token, amount, leg, destination_swap))
    }

    pub fn swap_and_cross_and_swap(
        &mut self,
        tx: TxContext,
        swap: &SourceSwap,
        leg: &BridgeLeg,
        destination_swap: &DestinationSwap,
    ) -> Result<DispatchReceipt> {
        self.transact(tx, |router, env| router.swap_and_cross_and_swap(env, swap, leg, destination_swap))
    }

    pub fn quote_native_fee(
        &self,
        backend: Backend,
        dst_chain_id: ChainId,
        amount: U256,
        destination_swap: Option<&DestinationSwap>,
    ) -> Result<U256> {
        self.state
            .router
            .quote_native_fee(&self.state.endpoints, backend, dst_chain_id, amount, destination_swap)
    }
}

/// Shared handle the relayer uses to reach a chain from async tasks.
#[derive(Clone, Debug)]
pub struct ChainHandle {
    chain_id: ChainId,
    inner: Arc<Mutex<Chain>>,
}

impl ChainHandle {
    pub fn new(chain: Chain) -> Self {
        ChainHandle { chain_id: chain.chain_id, inner: Arc::new(Mutex::new(chain)) }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Chain> {
        self.inner.lock().await
    }
}

#[async_trait]
impl ChainInterface for ChainHandle {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn take_outbound(&self) -> Vec<OutboundPacket> {
        self.inner.lock().await.take_outbound()
    }

    async fn deliver(&self, packet: &OutboundPacket) -> Result<Settlement> {
        self.inner.lock().await.deliver(packet)
    }
}
