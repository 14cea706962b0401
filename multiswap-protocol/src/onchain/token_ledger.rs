use std::collections::HashMap;

use ethers::types::{Address, U256};

use crate::error::{MultiswapError, Result};

/// ERC-20 style balances and allowances for every token on one chain.
/// Native currency lives here too, under `NATIVE_TOKEN`.
#[derive(Clone, Debug, Default)]
pub struct TokenLedger {
    // (token, holder) -> balance
    balances: HashMap<(Address, Address), U256>,
    // (token, owner, spender) -> allowance
    allowances: HashMap<(Address, Address, Address), U256>,
}

impl TokenLedger {
    pub fn new() -> Self {
        TokenLedger::default()
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances.get(&(token, holder)).copied().unwrap_or_default()
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(token, owner, spender)).copied().unwrap_or_default()
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<()> {
        let balance = self.balances.entry((token, to)).or_default();
        *balance = balance.checked_add(amount).ok_or(MultiswapError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        if amount.is_zero() {
            self.allowances.remove(&(token, owner, spender));
        } else {
            self.allowances.insert((token, owner, spender), amount);
        }
    }

    pub fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(MultiswapError::InsufficientBalance {
                token,
                holder: from,
                requested: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        // Compute the credit first so an overflow leaves the sender untouched
        let credited = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(MultiswapError::ArithmeticOverflow)?;
        self.balances.insert((token, from), available - amount);
        self.balances.insert((token, to), credited);
        Ok(())
    }

    /// Moves `amount` on behalf of `owner`, consuming `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        owner: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let allowed = self.allowance(token, owner, spender);
        if allowed < amount {
            return Err(MultiswapError::InsufficientAllowance {
                token,
                owner,
                spender,
                requested: amount,
                available: allowed,
            });
        }
        self.transfer(token, owner, to, amount)?;
        self.approve(token, owner, spender, allowed - amount);
        Ok(())
    }
}
