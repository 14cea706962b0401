use ethers::types::{Address, U256};

use crate::data_structures::NATIVE_TOKEN;
use crate::error::{MultiswapError, Result};
use crate::onchain::token_ledger::TokenLedger;

/// CCIP router on one chain. The fee is native and grows with payload size.
#[derive(Clone, Debug)]
pub struct CcipRouter {
    pub address: Address,
    /// This chain's own CCIP chain selector, stamped on outgoing messages.
    pub local_selector: u64,
    pub base_fee: U256,
    pub fee_per_byte: U256,
    pub fee_collector: Address,
}

impl CcipRouter {
    pub fn new(address: Address, local_selector: u64, fee_collector: Address) -> Self {
        CcipRouter {
            address,
            local_selector,
            base_fee: U256::from(100_000u64),
            fee_per_byte: U256::from(16u64),
            fee_collector,
        }
    }

    pub fn get_fee(&self, payload_len: usize) -> Result<U256> {
        self.fee_per_byte
            .checked_mul(U256::from(payload_len))
            .and_then(|per_byte| per_byte.checked_add(self.base_fee))
            .ok_or(MultiswapError::ArithmeticOverflow)
    }

    /// Takes the fee for a `payload_len` message out of the native currency
    /// `payer` currently holds, given `offered` was attached for it.
    pub fn charge(&self, ledger: &mut TokenLedger, payer: Address, offered: U256, payload_len: usize) -> Result<U256> {
        let fee = self.get_fee(payload_len)?;
        if offered < fee {
            return Err(MultiswapError::InsufficientNativeFee { required: fee, provided: offered });
        }
        ledger.transfer(NATIVE_TOKEN, payer, self.fee_collector, fee)?;
        Ok(fee)
    }
}
