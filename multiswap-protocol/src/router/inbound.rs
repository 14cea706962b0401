use ethers::types::{Address, U256};
use log::{info, warn};

use super::fiber_router::FiberRouter;
use super::swap::{execute_swap, SwapCall};
use crate::bridge::{Backend, BridgeMessage, ComposeMessage};
use crate::data_structures::{ChainId, MessageId};
use crate::error::{MultiswapError, Result};
use crate::events::Event;
use crate::onchain::chain_simulator::Env;

/// Outcome of settling one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub message_id: MessageId,
    pub recipient: Address,
    pub token: Address,
    pub amount: U256,
    /// False when no swap was asked for, or when it failed and the bridged
    /// token was paid out instead.
    pub swapped: bool,
}

// Where the bridged tokens sit when settlement starts
#[derive(Clone, Copy, Debug)]
enum Funds {
    Pool,
    Router,
}

impl FiberRouter {
    /// Entry for the portal and CCIP backends. `source_ref` is the source
    /// chain id for the portal and the source chain selector for CCIP.
    pub fn handle_inbound(
        &mut self,
        env: &mut Env<'_>,
        backend: Backend,
        source_ref: u64,
        sender: Address,
        payload: &[u8],
    ) -> Result<Settlement> {
        let caller = env.tx.sender;
        let src_chain_id = match backend {
            Backend::QuantumPortal if caller == self.portal() => source_ref,
            Backend::Ccip if caller == self.ccip_router() => self.chain_for_ccip_selector(source_ref)?,
            _ => return Err(MultiswapError::Unauthorized { caller, action: "deliver bridge messages" }),
        };
        self.trusted_remotes.authenticate(src_chain_id, sender)?;

        let message = BridgeMessage::decode(payload)?;
        let message_id = self.admit(env, src_chain_id, sender, &message)?;
        self.settle(env, message_id, message, Funds::Pool)
    }

    /// Compose callback for Stargate deliveries. The tokens already arrived
    /// at this router; the pool is not involved.
    pub fn lz_compose(&mut self, env: &mut Env<'_>, from: Address, compose_message: &[u8]) -> Result<Settlement> {
        let settings = self.stargate.ok_or(MultiswapError::BackendNotConfigured("stargate"))?;
        if env.tx.sender != settings.lz_endpoint {
            return Err(MultiswapError::Unauthorized { caller: env.tx.sender, action: "invoke compose" });
        }
        if from != settings.endpoint {
            return Err(MultiswapError::Unauthorized { caller: from, action: "compose into the router" });
        }

        let compose = ComposeMessage::decode(compose_message)?;
        let src_chain_id = self.chain_for_eid(compose.src_eid)?;
        self.trusted_remotes.authenticate(src_chain_id, compose.compose_from)?;

        let mut message = BridgeMessage::decode(&compose.inner)?;
        let message_id = self.admit(env, src_chain_id, compose.compose_from, &message)?;
        // Pay out what actually arrived
        message.token = settings.token;
        message.amount = compose.amount_ld;
        self.settle(env, message_id, message, Funds::Router)
    }

    fn admit(
        &mut self,
        env: &Env<'_>,
        src_chain_id: ChainId,
        sender: Address,
        message: &BridgeMessage,
    ) -> Result<MessageId> {
        if message.src_chain_id != src_chain_id {
            return Err(MultiswapError::UntrustedRemote { chain_id: message.src_chain_id, sender });
        }
        if message.dst_chain_id != env.chain_id {
            return Err(MultiswapError::WrongDestination { expected: env.chain_id, got: message.dst_chain_id });
        }
        let message_id = message.id(sender);
        if !self.processed.insert(message_id) {
            return Err(MultiswapError::DuplicateMessage(message_id));
        }
        Ok(message_id)
    }

    fn settle(&mut self, env: &mut Env<'_>, message_id: MessageId, message: BridgeMessage, funds: Funds) -> Result<Settlement> {
        let BridgeMessage { token, amount, recipient, destination_swap, .. } = message;

        let swap = match destination_swap {
            Some(swap) => swap,
            None => {
                self.pay_out(env, funds, token, amount, recipient)?;
                return Ok(self.settled(env, message_id, recipient, token, amount, false));
            }
        };

        self.pay_out(env, funds, token, amount, self.address)?;
        let checkpoint = env.ledger.clone();
        let call = SwapCall {
            from_token: token,
            to_token: swap.to_token,
            amount_in: amount,
            min_amount_out: swap.min_amount_out,
            router: swap.router,
            calldata: &swap.calldata,
            refund_to: recipient,
        };
        match execute_swap(env, &self.whitelist, self.address, &call) {
            Ok(amount_out) => {
                env.ledger.transfer(swap.to_token, self.address, recipient, amount_out)?;
                env.emit(Event::LocalSwap {
                    router: swap.router,
                    from_token: token,
                    to_token: swap.to_token,
                    amount_in: amount,
                    amount_out,
                });
                Ok(self.settled(env, message_id, recipient, swap.to_token, amount_out, true))
            }
            Err(err) => {
                *env.ledger = checkpoint;
                warn!("message 0x{}: destination swap failed ({}), paying out {:?}", hex::encode(message_id), err, token);
                env.emit(Event::DestinationSwapFallback { message_id, reason: err.to_string() });
                env.ledger.transfer(token, self.address, recipient, amount)?;
                Ok(self.settled(env, message_id, recipient, token, amount, false))
            }
        }
    }

    fn pay_out(&self, env: &mut Env<'_>, funds: Funds, token: Address, amount: U256, to: Address) -> Result<()> {
        match funds {
            Funds::Pool => env.pool.release(env.ledger, self.address, token, amount, to),
            Funds::Router => env.ledger.transfer(token, self.address, to, amount),
        }
    }

    fn settled(
        &self,
        env: &mut Env<'_>,
        message_id: MessageId,
        recipient: Address,
        token: Address,
        amount: U256,
        swapped: bool,
    ) -> Settlement {
        info!("message 0x{}: {} of {:?} to {:?}", hex::encode(message_id), amount, token, recipient);
        env.emit(Event::Settled { message_id, recipient, token, amount, swapped });
        Settlement { message_id, recipient, token, amount, swapped }
    }
}
