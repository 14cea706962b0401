use ethers::types::{Address, H256, U256};
use thiserror::Error;

use crate::data_structures::{ChainId, Selector};

/// Every way a call into the protocol can be rejected.
///
/// Admission and funding errors abort the whole transaction; the chain model
/// restores its pre-call snapshot when any of these bubbles out of `transact`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultiswapError {
    // --- Authorization ---
    #[error("caller {caller:?} is not allowed to {action}")]
    Unauthorized { caller: Address, action: &'static str },
    #[error("sender {sender:?} is not the trusted remote router for chain {chain_id}")]
    UntrustedRemote { chain_id: ChainId, sender: Address },
    #[error("no trusted remote router registered for chain {0}")]
    NoTrustedRemote(ChainId),

    // --- Registries ---
    #[error("no token path registered for {token:?} towards chain {chain_id}")]
    UnknownTokenPath { token: Address, chain_id: ChainId },
    #[error("router {0:?} is not whitelisted")]
    RouterNotWhitelisted(Address),
    #[error("selector 0x{} is not whitelisted for router {router:?}", hex::encode(.selector))]
    SelectorNotWhitelisted { router: Address, selector: Selector },
    #[error("call payload of {0} bytes has no selector")]
    CalldataTooShort(usize),
    #[error("parallel input arrays differ in length")]
    ArrayLengthMismatch,
    #[error("percentage {0} is above 100")]
    InvalidPercent(u64),

    // --- Funds ---
    #[error("pool holds {available} of {token:?}, cannot release {requested}")]
    InsufficientLiquidity { token: Address, requested: U256, available: U256 },
    #[error("{holder:?} holds {available} of {token:?}, needs {requested}")]
    InsufficientBalance { token: Address, holder: Address, requested: U256, available: U256 },
    #[error("allowance of {spender:?} over {owner:?}'s {token:?} is {available}, needs {requested}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        requested: U256,
        available: U256,
    },
    #[error("native fee {required} required, {provided} provided")]
    InsufficientNativeFee { required: U256, provided: U256 },
    #[error("swap produced {received}, minimum was {expected_min}")]
    InsufficientSwapOutput { expected_min: U256, received: U256 },
    #[error("amount {amount} does not cover the platform fee {fee}")]
    AmountBelowFee { amount: U256, fee: U256 },
    #[error("amount must be non-zero")]
    ZeroAmount,
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    // --- Backends ---
    #[error("unsupported backend discriminator {0}")]
    UnsupportedBackend(u8),
    #[error("backend {0} is not configured on this router")]
    BackendNotConfigured(&'static str),
    #[error("no CCIP chain selector registered for chain {0}")]
    UnknownCcipChain(ChainId),
    #[error("CCIP chain selector {0} is not mapped to a chain")]
    UnknownChainSelector(u64),
    #[error("no Stargate target network registered for chain {0}")]
    StargateTargetNotSet(ChainId),
    #[error("Stargate endpoint id {0} is not mapped to a chain")]
    UnknownStargateEid(u32),
    #[error("CCIP chain selector {selector} already belongs to chain {chain_id}")]
    DuplicateChainSelector { selector: u64, chain_id: ChainId },
    #[error("Stargate endpoint id {eid} already belongs to chain {chain_id}")]
    DuplicateStargateEid { eid: u32, chain_id: ChainId },
    #[error("token {0:?} cannot travel over Stargate")]
    UnsupportedStargateToken(Address),

    // --- Pool binding ---
    #[error("pool is already bound to a router")]
    FiberRouterAlreadySet,
    #[error("pool has no router bound")]
    FiberRouterNotSet,

    // --- Inbound ---
    #[error("message {0:?} was already settled")]
    DuplicateMessage(H256),
    #[error("message addressed to chain {got}, this is chain {expected}")]
    WrongDestination { expected: ChainId, got: ChainId },

    // --- Codec / external code ---
    #[error("malformed referral data: {0}")]
    MalformedReferralData(String),
    #[error("decode error: {0}")]
    Codec(String),
    #[error("no contract deployed at {0:?}")]
    UnknownContract(Address),
    #[error("external call reverted: {0}")]
    ExternalCallReverted(String),
    #[error("chain {0} is not part of this network")]
    UnknownChain(ChainId),
}

pub type Result<T> = std::result::Result<T, MultiswapError>;

impl From<ethers::abi::Error> for MultiswapError {
    fn from(e: ethers::abi::Error) -> Self {
        MultiswapError::Codec(e.to_string())
    }
}
