use ethers::types::{Address, U256};
use log::info;

use crate::error::{MultiswapError, Result};
use crate::events::Event;
use crate::onchain::token_ledger::TokenLedger;

/// Liquidity held for cross-chain settlement. Balances are whatever the token
/// ledger records at the pool's address; only the bound router moves them
/// during settlement.
#[derive(Clone, Debug)]
pub struct Pool {
    pub address: Address,
    owner: Address,
    liquidity_manager: Address,
    fiber_router: Option<Address>,
}

impl Pool {
    pub fn new(address: Address, owner: Address) -> Self {
        Pool { address, owner, liquidity_manager: owner, fiber_router: None }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn fiber_router(&self) -> Option<Address> {
        self.fiber_router
    }

    pub fn balance(&self, ledger: &TokenLedger, token: Address) -> U256 {
        ledger.balance_of(token, self.address)
    }

    /// One-time binding to the router allowed to credit and release.
    pub fn set_fiber_router(&mut self, caller: Address, router: Address, events: &mut Vec<Event>) -> Result<()> {
        if caller != self.owner {
            return Err(MultiswapError::Unauthorized { caller, action: "bind the pool" });
        }
        if self.fiber_router.is_some() {
            return Err(MultiswapError::FiberRouterAlreadySet);
        }
        self.fiber_router = Some(router);
        info!("pool {:?} bound to router {:?}", self.address, router);
        events.push(Event::FiberRouterSet { pool: self.address, router });
        Ok(())
    }

    pub fn set_liquidity_manager(&mut self, caller: Address, manager: Address) -> Result<()> {
        if caller != self.owner {
            return Err(MultiswapError::Unauthorized { caller, action: "set the liquidity manager" });
        }
        self.liquidity_manager = manager;
        Ok(())
    }

    fn ensure_manager(&self, caller: Address, action: &'static str) -> Result<()> {
        if caller != self.owner && caller != self.liquidity_manager {
            return Err(MultiswapError::Unauthorized { caller, action });
        }
        Ok(())
    }

    fn ensure_router(&self, caller: Address, action: &'static str) -> Result<()> {
        match self.fiber_router {
            None => Err(MultiswapError::FiberRouterNotSet),
            Some(router) if router == caller => Ok(()),
            Some(_) => Err(MultiswapError::Unauthorized { caller, action }),
        }
    }

    /// Seeds liquidity from `caller`, who must have approved the pool.
    pub fn add_liquidity(
        &mut self,
        ledger: &mut TokenLedger,
        caller: Address,
        token: Address,
        amount: U256,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        self.ensure_manager(caller, "add liquidity")?;
        if amount.is_zero() {
            return Err(MultiswapError::ZeroAmount);
        }
        ledger.transfer_from(token, self.address, caller, self.address, amount)?;
        info!("pool {:?}: +{} of {:?}", self.address, amount, token);
        events.push(Event::LiquidityAdded { provider: caller, token, amount });
        Ok(())
    }

    pub fn remove_liquidity(
        &mut self,
        ledger: &mut TokenLedger,
        caller: Address,
        token: Address,
        amount: U256,
        to: Address,
        events: &mut Vec<Event>,
    ) -> Result<()> {
        self.ensure_manager(caller, "remove liquidity")?;
        self.pay_out(ledger, token, amount, to)?;
        info!("pool {:?}: -{} of {:?} to {:?}", self.address, amount, token, to);
        events.push(Event::LiquidityRemoved { token, amount, to });
        Ok(())
    }

    /// Locks source-side funds the router already holds.
    pub fn credit(&self, ledger: &mut TokenLedger, caller: Address, token: Address, amount: U256) -> Result<()> {
        self.ensure_router(caller, "credit the pool")?;
        ledger.transfer(token, caller, self.address, amount)
    }

    pub fn release(
        &self,
        ledger: &mut TokenLedger,
        caller: Address,
        token: Address,
        amount: U256,
        to: Address,
    ) -> Result<()> {
        self.ensure_router(caller, "release pool funds")?;
        self.pay_out(ledger, token, amount, to)
    }

    fn pay_out(&self, ledger: &mut TokenLedger, token: Address, amount: U256, to: Address) -> Result<()> {
        let available = self.balance(ledger, token);
        if amount > available {
            return Err(MultiswapError::InsufficientLiquidity { token, requested: amount, available });
        }
        ledger.transfer(token, self.address, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: Address = ethers::types::H160([0x50; 20]);

    fn setup() -> (Pool, TokenLedger, Vec<Event>) {
        (Pool::new(POOL, Address::repeat_byte(1)), TokenLedger::new(), Vec::new())
    }

    #[test]
    fn router_binding_is_one_time() {
        let (mut pool, _, mut events) = setup();
        let owner = Address::repeat_byte(1);
        assert!(pool.set_fiber_router(Address::repeat_byte(9), Address::repeat_byte(2), &mut events).is_err());
        pool.set_fiber_router(owner, Address::repeat_byte(2), &mut events).unwrap();
        assert_eq!(
            pool.set_fiber_router(owner, Address::repeat_byte(3), &mut events),
            Err(MultiswapError::FiberRouterAlreadySet)
        );
        assert_eq!(pool.fiber_router(), Some(Address::repeat_byte(2)));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn release_bounded_by_balance() {
        let (mut pool, mut ledger, mut events) = setup();
        let (owner, router, token) = (Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(0xaa));
        pool.set_fiber_router(owner, router, &mut events).unwrap();

        ledger.mint(token, owner, U256::from(100)).unwrap();
        ledger.approve(token, owner, POOL, U256::from(100));
        pool.add_liquidity(&mut ledger, owner, token, U256::from(100), &mut events).unwrap();

        let err = pool.release(&mut ledger, router, token, U256::from(101), Address::repeat_byte(5)).unwrap_err();
        assert!(matches!(err, MultiswapError::InsufficientLiquidity { .. }));

        pool.release(&mut ledger, router, token, U256::from(60), Address::repeat_byte(5)).unwrap();
        assert_eq!(pool.balance(&ledger, token), U256::from(40));
    }

    #[test]
    fn only_router_moves_settlement_funds() {
        let (mut pool, mut ledger, mut events) = setup();
        let token = Address::repeat_byte(0xaa);
        assert_eq!(
            pool.release(&mut ledger, Address::repeat_byte(2), token, U256::one(), Address::zero()),
            Err(MultiswapError::FiberRouterNotSet)
        );
        pool.set_fiber_router(Address::repeat_byte(1), Address::repeat_byte(2), &mut events).unwrap();
        let err = pool.credit(&mut ledger, Address::repeat_byte(3), token, U256::one()).unwrap_err();
        assert!(matches!(err, MultiswapError::Unauthorized { .. }));
    }
}
