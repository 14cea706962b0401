use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::bridge::Backend;
use crate::data_structures::{ChainId, Selector};

/// Log entries appended to a chain's event log. Events emitted inside a
/// transaction that later fails are rolled back with the rest of its state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    // Admin / configuration
    RouterConfigUpdated { version: u64, platform_fee: U256, fee_wallet: Address, gas_wallet: Address },
    OwnershipTransferred { previous: Address, new_owner: Address },
    ReferralAdded { code_identity: Address, recipient: Address, share: u8, discount: u8 },
    TokenPathAdded { local_token: Address, chain_id: ChainId, remote_token: Address },
    TrustedRemoteAdded { chain_id: ChainId, router: Address },
    RouterSelectorsAdded { router: Address, selectors: Vec<Selector> },
    RouterSelectorsRemoved { router: Address, selectors: Vec<Selector> },
    CcipChainSelectorSet { chain_id: ChainId, selector: u64 },
    StargateTargetSet { chain_id: ChainId, eid: u32, target_router: Address },
    StargateConfigured { endpoint: Address, token: Address, lz_endpoint: Address },

    // Pool
    FiberRouterSet { pool: Address, router: Address },
    LiquidityAdded { provider: Address, token: Address, amount: U256 },
    LiquidityRemoved { token: Address, amount: U256, to: Address },

    // Source side
    LocalSwap { router: Address, from_token: Address, to_token: Address, amount_in: U256, amount_out: U256 },
    FeesDistributed {
        token: Address,
        platform_cut: U256,
        referral_cut: U256,
        referral_recipient: Option<Address>,
    },
    CrossInitiated {
        message_id: H256,
        backend: Backend,
        token: Address,
        amount: U256,
        recipient: Address,
        dst_chain_id: ChainId,
        with_destination_swap: bool,
    },

    // Destination side
    Settled { message_id: H256, recipient: Address, token: Address, amount: U256, swapped: bool },
    DestinationSwapFallback { message_id: H256, reason: String },
}
