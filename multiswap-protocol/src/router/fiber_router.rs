use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;

use ethers::types::{Address, Bytes, U256};
use log::{debug, info};

use super::swap::{execute_swap, SwapCall};
use crate::bridge::{
    Backend, BridgeEndpoints, BridgeMessage, DestinationSwap, OutboundPacket, TaxiQuote,
};
use crate::config::RouterConfig;
use crate::data_structures::{ChainId, MessageId, Selector, NATIVE_TOKEN};
use crate::error::{MultiswapError, Result};
use crate::events::Event;
use crate::onchain::chain_simulator::Env;
use crate::referral::{FeeSplit, ReferralEngine};
use crate::registry::{ensure_same_len, RouterWhitelist, TokenPathRegistry, TrustedRemoteRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StargateSettings {
    pub endpoint: Address,
    pub token: Address,
    pub lz_endpoint: Address,
}

/// Where Stargate deliveries for a chain go, and how that chain is named
/// on the LayerZero side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StargateTarget {
    pub eid: u32,
    pub router: Address,
}

/// The bridging half of an entry point call.
#[derive(Clone, Debug, Default)]
pub struct BridgeLeg {
    /// Fee-token amount paid to the portal. Native-fee backends are paid
    /// from the value attached to the transaction instead.
    pub bridge_fee: U256,
    pub recipient: Address,
    pub dst_chain_id: ChainId,
    pub backend: u8,
    pub referral_sig_data: Bytes,
}

/// A swap performed on the source chain before bridging.
#[derive(Clone, Debug)]
pub struct SourceSwap {
    pub from_token: Address,
    pub to_token: Address,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub router: Address,
    pub calldata: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub message_id: MessageId,
    pub backend: Backend,
    pub token: Address,
    pub remote_token: Address,
    pub bridge_amount: U256,
    pub fee: FeeSplit,
    /// What the transport charged, in its own fee currency.
    pub transport_fee: U256,
    pub dst_chain_id: ChainId,
}

/// Per-chain orchestrator. Users enter through `cross` and its swap
/// variants; transports enter through `handle_inbound` and `lz_compose`.
#[derive(Clone, Debug)]
pub struct FiberRouter {
    pub address: Address,
    owner: Address,
    portal: Address,
    ccip_router: Address,
    pub(super) config: RouterConfig,
    token_paths: TokenPathRegistry,
    pub(super) trusted_remotes: TrustedRemoteRegistry,
    pub(super) whitelist: RouterWhitelist,
    referrals: ReferralEngine,
    ccip_selectors: HashMap<ChainId, u64>,
    pub(super) stargate: Option<StargateSettings>,
    stg_targets: HashMap<ChainId, StargateTarget>,
    nonce: u64,
    pub(super) processed: HashSet<MessageId>,
}

impl FiberRouter {
    pub fn new(address: Address, owner: Address, portal: Address, ccip_router: Address, config: RouterConfig) -> Self {
        FiberRouter {
            address,
            owner,
            portal,
            ccip_router,
            config,
            token_paths: TokenPathRegistry::new(),
            trusted_remotes: TrustedRemoteRegistry::new(),
            whitelist: RouterWhitelist::new(),
            referrals: ReferralEngine::new(),
            ccip_selectors: HashMap::new(),
            stargate: None,
            stg_targets: HashMap::new(),
            nonce: 0,
            processed: HashSet::new(),
        }
    }

    // ---- read-only views ----

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn portal(&self) -> Address {
        self.portal
    }

    pub fn ccip_router(&self) -> Address {
        self.ccip_router
    }

    pub fn token_paths(&self) -> &TokenPathRegistry {
        &self.token_paths
    }

    pub fn trusted_remotes(&self) -> &TrustedRemoteRegistry {
        &self.trusted_remotes
    }

    pub fn whitelist(&self) -> &RouterWhitelist {
        &self.whitelist
    }

    pub fn referrals(&self) -> &ReferralEngine {
        &self.referrals
    }

    pub fn stargate_settings(&self) -> Option<StargateSettings> {
        self.stargate
    }

    pub fn stargate_target(&self, chain_id: ChainId) -> Option<StargateTarget> {
        self.stg_targets.get(&chain_id).copied()
    }

    pub fn ccip_selector(&self, chain_id: ChainId) -> Option<u64> {
        self.ccip_selectors.get(&chain_id).copied()
    }

    pub fn is_processed(&self, message_id: MessageId) -> bool {
        self.processed.contains(&message_id)
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub(super) fn chain_for_ccip_selector(&self, selector: u64) -> Result<ChainId> {
        self.ccip_selectors
            .iter()
            .find(|(_, s)| **s == selector)
            .map(|(chain_id, _)| *chain_id)
            .ok_or(MultiswapError::UnknownChainSelector(selector))
    }

    pub(super) fn chain_for_eid(&self, eid: u32) -> Result<ChainId> {
        self.stg_targets
            .iter()
            .find(|(_, target)| target.eid == eid)
            .map(|(chain_id, _)| *chain_id)
            .ok_or(MultiswapError::UnknownStargateEid(eid))
    }

    // ---- admin ----

    fn only_owner(&self, env: &Env<'_>, action: &'static str) -> Result<()> {
        if env.tx.sender != self.owner {
            return Err(MultiswapError::Unauthorized { caller: env.tx.sender, action });
        }
        Ok(())
    }

    fn config_updated(&self, env: &mut Env<'_>) {
        info!("router {:?} config v{}", self.address, self.config.version);
        env.emit(Event::RouterConfigUpdated {
            version: self.config.version,
            platform_fee: self.config.platform_fee,
            fee_wallet: self.config.fee_wallet,
            gas_wallet: self.config.gas_wallet,
        });
    }

    pub fn transfer_ownership(&mut self, env: &mut Env<'_>, new_owner: Address) -> Result<()> {
        self.only_owner(env, "transfer ownership")?;
        let previous = self.owner;
        self.owner = new_owner;
        env.emit(Event::OwnershipTransferred { previous, new_owner });
        Ok(())
    }

    pub fn set_platform_fee(&mut self, env: &mut Env<'_>, fee: U256) -> Result<()> {
        self.only_owner(env, "set the platform fee")?;
        self.config.set_platform_fee(fee);
        self.config_updated(env);
        Ok(())
    }

    pub fn set_fee_wallet(&mut self, env: &mut Env<'_>, wallet: Address) -> Result<()> {
        self.only_owner(env, "set the fee wallet")?;
        self.config.set_fee_wallet(wallet);
        self.config_updated(env);
        Ok(())
    }

    pub fn set_gas_wallet(&mut self, env: &mut Env<'_>, wallet: Address) -> Result<()> {
        self.only_owner(env, "set the gas wallet")?;
        self.config.set_gas_wallet(wallet);
        self.config_updated(env);
        Ok(())
    }

    pub fn add_referral(
        &mut self,
        env: &mut Env<'_>,
        recipient: Address,
        share: u64,
        discount: u64,
        code_identity: Address,
    ) -> Result<()> {
        self.only_owner(env, "add referrals")?;
        let record = self.referrals.add_referral(recipient, share, discount, code_identity)?;
        info!("referral {:?}: {}% share, {}% discount", code_identity, record.share, record.discount);
        env.emit(Event::ReferralAdded {
            code_identity,
            recipient,
            share: record.share,
            discount: record.discount,
        });
        Ok(())
    }

    pub fn add_token_paths(
        &mut self,
        env: &mut Env<'_>,
        local_tokens: &[Address],
        chain_ids: &[ChainId],
        remote_tokens: &[Address],
    ) -> Result<()> {
        self.only_owner(env, "add token paths")?;
        for path in self.token_paths.add_token_paths(local_tokens, chain_ids, remote_tokens)? {
            env.emit(Event::TokenPathAdded {
                local_token: path.local_token,
                chain_id: path.chain_id,
                remote_token: path.remote_token,
            });
        }
        Ok(())
    }

    pub fn add_trusted_remotes(&mut self, env: &mut Env<'_>, chain_ids: &[ChainId], routers: &[Address]) -> Result<()> {
        self.only_owner(env, "add trusted remotes")?;
        for remote in self.trusted_remotes.add_trusted_remotes(chain_ids, routers)? {
            info!("trusted remote for chain {}: {:?}", remote.chain_id, remote.router);
            env.emit(Event::TrustedRemoteAdded { chain_id: remote.chain_id, router: remote.router });
        }
        Ok(())
    }

    pub fn add_router_and_selectors(&mut self, env: &mut Env<'_>, router: Address, selectors: &[Selector]) -> Result<()> {
        self.only_owner(env, "whitelist swap routers")?;
        self.whitelist.add_router_and_selectors(router, selectors);
        env.emit(Event::RouterSelectorsAdded { router, selectors: selectors.to_vec() });
        Ok(())
    }

    pub fn remove_router_and_selectors(
        &mut self,
        env: &mut Env<'_>,
        router: Address,
        selectors: &[Selector],
    ) -> Result<()> {
        self.only_owner(env, "remove swap routers")?;
        self.whitelist.remove_router_and_selectors(router, selectors);
        env.emit(Event::RouterSelectorsRemoved { router, selectors: selectors.to_vec() });
        Ok(())
    }

    pub fn set_chain_id_and_ccip_chain_selector_pairs(
        &mut self,
        env: &mut Env<'_>,
        chain_ids: &[ChainId],
        selectors: &[u64],
    ) -> Result<()> {
        self.only_owner(env, "map CCIP chain selectors")?;
        ensure_same_len(&[chain_ids.len(), selectors.len()])?;
        for (&chain_id, &selector) in chain_ids.iter().zip(selectors) {
            // One chain per selector
            if let Ok(mapped) = self.chain_for_ccip_selector(selector) {
                if mapped != chain_id {
                    return Err(MultiswapError::DuplicateChainSelector { selector, chain_id: mapped });
                }
            }
            self.ccip_selectors.insert(chain_id, selector);
            env.emit(Event::CcipChainSelectorSet { chain_id, selector });
        }
        Ok(())
    }

    pub fn set_stg_target_network(
        &mut self,
        env: &mut Env<'_>,
        chain_id: ChainId,
        eid: u32,
        target_router: Address,
    ) -> Result<()> {
        self.only_owner(env, "set stargate targets")?;
        if let Ok(mapped) = self.chain_for_eid(eid) {
            if mapped != chain_id {
                return Err(MultiswapError::DuplicateStargateEid { eid, chain_id: mapped });
            }
        }
        self.stg_targets.insert(chain_id, StargateTarget { eid, router: target_router });
        env.emit(Event::StargateTargetSet { chain_id, eid, target_router });
        Ok(())
    }

    pub fn init_config(
        &mut self,
        env: &mut Env<'_>,
        stargate_endpoint: Address,
        stargate_token: Address,
        lz_endpoint: Address,
    ) -> Result<()> {
        self.only_owner(env, "configure stargate")?;
        self.stargate = Some(StargateSettings { endpoint: stargate_endpoint, token: stargate_token, lz_endpoint });
        info!("router {:?}: stargate endpoint {:?} for {:?}", self.address, stargate_endpoint, stargate_token);
        env.emit(Event::StargateConfigured { endpoint: stargate_endpoint, token: stargate_token, lz_endpoint });
        Ok(())
    }

    // ---- quotes ----

    /// Stargate taxi quote. Callers pay the live native fee; adding
    /// `apply_fee_buffer` on top absorbs drift between quote and send.
    pub fn prepare_take_taxi(
        &self,
        endpoints: &BridgeEndpoints,
        dst_eid: u32,
        amount: U256,
        composer: Address,
        compose_msg: &[u8],
    ) -> Result<TaxiQuote> {
        let settings = self.stargate.ok_or(MultiswapError::BackendNotConfigured("stargate"))?;
        if endpoints.stargate.address != settings.endpoint {
            return Err(MultiswapError::BackendNotConfigured("stargate endpoint"));
        }
        endpoints.stargate.quote_send(dst_eid, amount, composer, compose_msg)
    }

    /// Native value a cross through `backend` needs right now. Zero for the
    /// portal, which charges its fee token.
    pub fn quote_native_fee(
        &self,
        endpoints: &BridgeEndpoints,
        backend: Backend,
        dst_chain_id: ChainId,
        amount: U256,
        destination_swap: Option<&DestinationSwap>,
    ) -> Result<U256> {
        // Encoded size does not depend on the field values
        let sample = BridgeMessage {
            src_chain_id: 0,
            dst_chain_id,
            nonce: 0,
            token: Address::zero(),
            amount,
            recipient: Address::zero(),
            destination_swap: destination_swap.cloned(),
        }
        .encode();
        match backend {
            Backend::QuantumPortal => Ok(U256::zero()),
            Backend::Ccip => endpoints.ccip.get_fee(sample.len()),
            Backend::Stargate => {
                let target = self
                    .stg_targets
                    .get(&dst_chain_id)
                    .ok_or(MultiswapError::StargateTargetNotSet(dst_chain_id))?;
                let quote = self.prepare_take_taxi(endpoints, target.eid, amount, target.router, &sample)?;
                Ok(quote.messaging_fee.native_fee)
            }
        }
    }

    // ---- entry points ----

    pub fn cross(&mut self, env: &mut Env<'_>, token: Address, amount: U256, leg: &BridgeLeg) -> Result<DispatchReceipt> {
        let backend = Backend::try_from(leg.backend)?;
        self.pull(env, token, amount)?;
        self.dispatch(env, backend, token, amount, leg, None)
    }

    pub fn swap_and_cross(&mut self, env: &mut Env<'_>, swap: &SourceSwap, leg: &BridgeLeg) -> Result<DispatchReceipt> {
        let backend = Backend::try_from(leg.backend)?;
        let amount_out = self.source_swap(env, swap)?;
        self.dispatch(env, backend, swap.to_token, amount_out, leg, None)
    }

    pub fn cross_and_swap(
        &mut self,
        env: &mut Env<'_>,
        token: Address,
        amount: U256,
        leg: &BridgeLeg,
        destination_swap: &DestinationSwap,
    ) -> Result<DispatchReceipt> {
        let backend = Backend::try_from(leg.backend)?;
        self.pull(env, token, amount)?;
        self.dispatch(env, backend, token, amount, leg, Some(destination_swap))
    }

    pub fn swap_and_cross_and_swap(
        &mut self,
        env: &mut Env<'_>,
        swap: &SourceSwap,
        leg: &BridgeLeg,
        destination_swap: &DestinationSwap,
    ) -> Result<DispatchReceipt> {
        let backend = Backend::try_from(leg.backend)?;
        let amount_out = self.source_swap(env, swap)?;
        self.dispatch(env, backend, swap.to_token, amount_out, leg, Some(destination_swap))
    }

    fn pull(&self, env: &mut Env<'_>, token: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Err(MultiswapError::ZeroAmount);
        }
        env.ledger.transfer_from(token, self.address, env.tx.sender, self.address, amount)
    }

    fn source_swap(&self, env: &mut Env<'_>, swap: &SourceSwap) -> Result<U256> {
        self.pull(env, swap.from_token, swap.amount_in)?;
        let call = SwapCall {
            from_token: swap.from_token,
            to_token: swap.to_token,
            amount_in: swap.amount_in,
            min_amount_out: swap.min_amount_out,
            router: swap.router,
            calldata: &swap.calldata,
            refund_to: env.tx.sender,
        };
        let amount_out = execute_swap(env, &self.whitelist, self.address, &call)?;
        env.emit(Event::LocalSwap {
            router: swap.router,
            from_token: swap.from_token,
            to_token: swap.to_token,
            amount_in: swap.amount_in,
            amount_out,
        });
        Ok(amount_out)
    }

    fn dispatch(
        &mut self,
        env: &mut Env<'_>,
        backend: Backend,
        token: Address,
        amount: U256,
        leg: &BridgeLeg,
        destination_swap: Option<&DestinationSwap>,
    ) -> Result<DispatchReceipt> {
        let dst_chain_id = leg.dst_chain_id;
        let remote_token = self.token_paths.resolve(token, dst_chain_id)?;
        let peer = self.trusted_remotes.peer_for(dst_chain_id)?;

        let split = self.referrals.quote(
            self.config.platform_fee,
            &leg.referral_sig_data,
            env.chain_id,
            self.address,
            env.timestamp,
        )?;
        if amount <= split.fee {
            return Err(MultiswapError::AmountBelowFee { amount, fee: split.fee });
        }
        self.distribute_fee(env, token, &split)?;
        let bridge_amount = amount - split.fee;

        self.nonce += 1;
        let message = BridgeMessage {
            src_chain_id: env.chain_id,
            dst_chain_id,
            nonce: self.nonce,
            token: remote_token,
            amount: bridge_amount,
            recipient: leg.recipient,
            destination_swap: destination_swap.cloned(),
        };
        let message_id = message.id(self.address);
        let mut packet = OutboundPacket {
            message_id,
            backend,
            src_chain_id: env.chain_id,
            dst_chain_id,
            source_ref: 0,
            sender: self.address,
            receiver: peer,
            payload: message.encode(),
            amount: U256::zero(),
        };

        let transport_fee = match backend {
            Backend::QuantumPortal => {
                env.pool.credit(env.ledger, self.address, token, bridge_amount)?;
                env.endpoints.portal.collect_fee(env.ledger, self.address, env.tx.sender, leg.bridge_fee)?;
                // Attached native funds remote execution gas
                env.ledger.transfer(NATIVE_TOKEN, self.address, self.config.gas_wallet, env.tx.value)?;
                packet.source_ref = env.chain_id;
                leg.bridge_fee
            }
            Backend::Ccip => {
                let selector = self
                    .ccip_selectors
                    .get(&dst_chain_id)
                    .copied()
                    .ok_or(MultiswapError::UnknownCcipChain(dst_chain_id))?;
                env.pool.credit(env.ledger, self.address, token, bridge_amount)?;
                let fee = env.endpoints.ccip.charge(env.ledger, self.address, env.tx.value, packet.payload.len())?;
                self.refund_excess(env, fee)?;
                debug!("ccip dispatch to selector {}", selector);
                packet.source_ref = env.endpoints.ccip.local_selector;
                fee
            }
            Backend::Stargate => {
                let settings = self.stargate.ok_or(MultiswapError::BackendNotConfigured("stargate"))?;
                if token != settings.token {
                    return Err(MultiswapError::UnsupportedStargateToken(token));
                }
                if env.endpoints.stargate.address != settings.endpoint {
                    return Err(MultiswapError::BackendNotConfigured("stargate endpoint"));
                }
                let target = self
                    .stg_targets
                    .get(&dst_chain_id)
                    .copied()
                    .ok_or(MultiswapError::StargateTargetNotSet(dst_chain_id))?;
                let fee = env.endpoints.stargate.send(
                    env.ledger,
                    self.address,
                    env.tx.value,
                    target.eid,
                    bridge_amount,
                    target.router,
                    &packet.payload,
                )?;
                self.refund_excess(env, fee)?;
                packet.source_ref = u64::from(env.endpoints.stargate.eid);
                packet.receiver = target.router;
                packet.amount = bridge_amount;
                fee
            }
        };

        info!(
            "router {:?}: {} of {:?} -> chain {} via {} (fee {}, msg 0x{})",
            self.address,
            bridge_amount,
            token,
            dst_chain_id,
            backend,
            split.fee,
            hex::encode(message_id)
        );
        env.endpoints.enqueue(packet);
        env.emit(Event::CrossInitiated {
            message_id,
            backend,
            token,
            amount: bridge_amount,
            recipient: leg.recipient,
            dst_chain_id,
            with_destination_swap: destination_swap.is_some(),
        });

        Ok(DispatchReceipt {
            message_id,
            backend,
            token,
            remote_token,
            bridge_amount,
            fee: split,
            transport_fee,
            dst_chain_id,
        })
    }

    fn distribute_fee(&mut self, env: &mut Env<'_>, token: Address, split: &FeeSplit) -> Result<()> {
        env.ledger.transfer(token, self.address, self.config.fee_wallet, split.platform_cut)?;
        if let Some(recipient) = split.referral_recipient {
            env.ledger.transfer(token, self.address, recipient, split.referral_cut)?;
        }
        self.referrals.consume(split);
        env.emit(Event::FeesDistributed {
            token,
            platform_cut: split.platform_cut,
            referral_cut: split.referral_cut,
            referral_recipient: split.referral_recipient,
        });
        Ok(())
    }

    /// Returns attached native value the transport did not take.
    fn refund_excess(&self, env: &mut Env<'_>, fee: U256) -> Result<()> {
        let excess = env.tx.value.saturating_sub(fee);
        env.ledger.transfer(NATIVE_TOKEN, self.address, env.tx.sender, excess)
    }
}
