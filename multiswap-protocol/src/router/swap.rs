use ethers::types::{Address, U256};
use log::debug;

use crate::error::{MultiswapError, Result};
use crate::onchain::chain_simulator::Env;
use crate::registry::RouterWhitelist;

pub(crate) struct SwapCall<'a> {
    pub from_token: Address,
    pub to_token: Address,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub router: Address,
    pub calldata: &'a [u8],
    /// Receives whatever part of `amount_in` the router left unspent.
    pub refund_to: Address,
}

/// Forwards `calldata` to a whitelisted router holding an allowance of
/// `amount_in`. Output is measured as the balance delta of `to_token` at
/// `this`; whatever the router returns is ignored. Input the router did not
/// pull is handed back to `refund_to`.
pub(crate) fn execute_swap(
    env: &mut Env<'_>,
    whitelist: &RouterWhitelist,
    this: Address,
    call: &SwapCall<'_>,
) -> Result<U256> {
    whitelist.check(call.router, call.calldata)?;

    let before = env.ledger.balance_of(call.to_token, this);
    let input_before = env.ledger.balance_of(call.from_token, this);
    env.ledger.approve(call.from_token, this, call.router, call.amount_in);
    env.call_contract(this, call.router, call.calldata)?;
    // No allowance survives the call
    env.ledger.approve(call.from_token, this, call.router, U256::zero());
    let received = env.ledger.balance_of(call.to_token, this).saturating_sub(before);

    debug!(
        "swap via {:?}: {} of {:?} -> {} of {:?}",
        call.router, call.amount_in, call.from_token, received, call.to_token
    );
    if received < call.min_amount_out {
        return Err(MultiswapError::InsufficientSwapOutput { expected_min: call.min_amount_out, received });
    }

    if call.from_token != call.to_token {
        let spent = input_before.saturating_sub(env.ledger.balance_of(call.from_token, this));
        let unspent = call.amount_in.saturating_sub(spent);
        if !unspent.is_zero() {
            debug!("returning {} unspent {:?} to {:?}", unspent, call.from_token, call.refund_to);
            env.ledger.transfer(call.from_token, this, call.refund_to, unspent)?;
        }
    }
    Ok(received)
}
