use std::collections::HashSet;

use ethers::types::{Address, Bytes, H160, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

use crate::error::{MultiswapError, Result};

/// EVM chain id.
pub type ChainId = u64;

/// Leading four bytes of an external call payload.
pub type Selector = [u8; 4];

/// Identifier of a dispatched bridge message, unique per (source router, nonce).
pub type MessageId = H256;

/// The native currency is tracked in the token ledger under the zero address.
pub const NATIVE_TOKEN: Address = H160([0u8; 20]);

/// Declares which remote token a local token bridges to, per destination chain.
/// Registered independently on each side; nothing is inferred for the reverse direction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPath {
    pub local_token: Address,
    pub chain_id: ChainId,
    pub remote_token: Address,
}

// One authorized router per remote chain
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrustedRemote {
    pub chain_id: ChainId,
    pub router: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WhitelistedRouter {
    pub router: Address,
    pub selectors: HashSet<Selector>,
}

/// A registered referral. `share` and `discount` are whole percentages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub recipient: Address,
    pub share: u8,
    pub discount: u8,
    pub code_identity: Address,
}

/// Salt, expiry and signature carried in a user's referral data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferralSignature {
    pub salt: H256,
    pub expiry: U256,
    pub signature: Bytes,
}

/// Extracts the selector from an opaque call payload.
pub fn selector_of(calldata: &[u8]) -> Result<Selector> {
    if calldata.len() < 4 {
        return Err(MultiswapError::CalldataTooShort(calldata.len()));
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&calldata[..4]);
    Ok(selector)
}

/// Selector of a Solidity function signature, e.g. `"transfer(address,uint256)"`.
pub fn function_selector(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Validates a percentage input for referral records.
pub fn checked_percent(value: u64) -> Result<u8> {
    if value > 100 {
        return Err(MultiswapError::InvalidPercent(value));
    }
    Ok(value as u8)
}

/// `floor(value * percent / 100)` without forming the full product, so any
/// `U256` fee can be split.
pub fn percent_of(value: U256, percent: u8) -> Result<U256> {
    let hundred = U256::from(100u8);
    let percent = U256::from(percent);
    let whole = (value / hundred).checked_mul(percent).ok_or(MultiswapError::ArithmeticOverflow)?;
    let part = (value % hundred) * percent / hundred;
    whole.checked_add(part).ok_or(MultiswapError::ArithmeticOverflow)
}
