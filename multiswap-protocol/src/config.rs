use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{MultiswapError, Result};

// EIP-712 domain under which referral signatures are issued. Previously issued
// signatures only verify if these stay byte-identical.
pub const REFERRAL_DOMAIN_NAME: &str = "FEE_DISTRIBUTOR";
pub const REFERRAL_DOMAIN_VERSION: &str = "000.001";
pub const REFERRAL_SIGNATURE_TYPE: &str = "ReferralSignature(bytes32 salt,uint256 expiry)";

/// Safety margin callers add on top of a Stargate fee quote (basis points).
pub const STARGATE_FEE_BUFFER_BPS: u64 = 500;
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Admin-mutable router settings.
///
/// Every setter bumps `version`, so two snapshots can be compared and each
/// mutation shows up as a distinct `RouterConfigUpdated` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub version: u64,
    /// Flat fee in the bridged token's smallest unit, charged on every cross.
    pub platform_fee: U256,
    pub fee_wallet: Address,
    /// Receives native currency attached to portal dispatches; it funds the
    /// remote execution gas.
    pub gas_wallet: Address,
}

impl RouterConfig {
    pub fn new(fee_wallet: Address, gas_wallet: Address) -> Self {
        RouterConfig {
            version: 0,
            platform_fee: U256::zero(),
            fee_wallet,
            gas_wallet,
        }
    }

    pub fn set_platform_fee(&mut self, fee: U256) {
        self.platform_fee = fee;
        self.version += 1;
    }

    pub fn set_fee_wallet(&mut self, wallet: Address) {
        self.fee_wallet = wallet;
        self.version += 1;
    }

    pub fn set_gas_wallet(&mut self, wallet: Address) {
        self.gas_wallet = wallet;
        self.version += 1;
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig::new(Address::zero(), Address::zero())
    }
}

/// Adds the standard safety buffer to a time-varying transport fee quote.
pub fn apply_fee_buffer(quoted: U256) -> Result<U256> {
    let scaled = quoted
        .checked_mul(U256::from(BPS_DENOMINATOR + STARGATE_FEE_BUFFER_BPS))
        .ok_or(MultiswapError::ArithmeticOverflow)?;
    Ok(scaled / U256::from(BPS_DENOMINATOR))
}
