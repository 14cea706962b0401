use ethers::types::{Address, U256};

use crate::error::{MultiswapError, Result};
use crate::onchain::token_ledger::TokenLedger;

/// Quantum Portal gateway. Fees are charged in a fee token and land at the
/// fee target; the message itself is queued for the portal's miners.
#[derive(Clone, Debug)]
pub struct QuantumPortal {
    pub address: Address,
    pub fee_token: Option<Address>,
    pub fee_target: Address,
}

impl QuantumPortal {
    pub fn new(address: Address, fee_target: Address) -> Self {
        QuantumPortal { address, fee_token: None, fee_target }
    }

    pub fn set_fee_token(&mut self, token: Address) {
        self.fee_token = Some(token);
    }

    /// Charges `fee` of the fee token from `payer`, using the allowance
    /// `payer` granted to `spender` (the router).
    pub fn collect_fee(&self, ledger: &mut TokenLedger, spender: Address, payer: Address, fee: U256) -> Result<()> {
        let fee_token = self
            .fee_token
            .ok_or(MultiswapError::BackendNotConfigured("quantum portal fee token"))?;
        ledger.transfer_from(fee_token, spender, payer, self.fee_target, fee)
    }
}
