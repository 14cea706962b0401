use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::bridge::message::ComposeMessage;
use crate::config::BPS_DENOMINATOR;
use crate::data_structures::NATIVE_TOKEN;
use crate::error::{MultiswapError, Result};
use crate::onchain::token_ledger::TokenLedger;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingFee {
    pub native_fee: U256,
    pub lz_token_fee: U256,
}

/// Result of quoting a taxi-mode send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxiQuote {
    pub amount_sent_ld: U256,
    pub amount_received_ld: U256,
    pub messaging_fee: MessagingFee,
}

/// A Stargate pool endpoint for a single token. It holds the token's
/// cross-chain liquidity itself, so Stargate transfers never touch the Pool.
#[derive(Clone, Debug)]
pub struct StargateEndpoint {
    pub address: Address,
    pub eid: u32,
    pub token: Option<Address>,
    pub base_fee: U256,
    pub fee_per_byte: U256,
    /// Scales quotes over time; 10_000 is 1x.
    pub fee_multiplier_bps: u64,
    pub fee_collector: Address,
}

impl StargateEndpoint {
    pub fn new(address: Address, eid: u32, fee_collector: Address) -> Self {
        StargateEndpoint {
            address,
            eid,
            token: None,
            base_fee: U256::from(200_000u64),
            fee_per_byte: U256::from(20u64),
            fee_multiplier_bps: BPS_DENOMINATOR,
            fee_collector,
        }
    }

    pub fn set_token(&mut self, token: Address) {
        self.token = Some(token);
    }

    /// The native fee moves with network conditions between quote and send.
    pub fn set_fee_multiplier(&mut self, bps: u64) {
        self.fee_multiplier_bps = bps;
    }

    fn configured_token(&self) -> Result<Address> {
        self.token.ok_or(MultiswapError::BackendNotConfigured("stargate pool token"))
    }

    pub fn quote_send(&self, _dst_eid: u32, amount: U256, _composer: Address, compose_msg: &[u8]) -> Result<TaxiQuote> {
        self.configured_token()?;
        let native_fee = self
            .fee_per_byte
            .checked_mul(U256::from(compose_msg.len()))
            .and_then(|per_byte| per_byte.checked_add(self.base_fee))
            .and_then(|raw| raw.checked_mul(U256::from(self.fee_multiplier_bps)))
            .ok_or(MultiswapError::ArithmeticOverflow)?
            / U256::from(BPS_DENOMINATOR);
        Ok(TaxiQuote {
            amount_sent_ld: amount,
            amount_received_ld: amount,
            messaging_fee: MessagingFee { native_fee, lz_token_fee: U256::zero() },
        })
    }

    /// Locks `amount` of the pool token from `payer` and charges the native
    /// fee against `offered`. Returns the fee actually taken.
    pub fn send(
        &self,
        ledger: &mut TokenLedger,
        payer: Address,
        offered: U256,
        dst_eid: u32,
        amount: U256,
        composer: Address,
        compose_msg: &[u8],
    ) -> Result<U256> {
        let token = self.configured_token()?;
        let quote = self.quote_send(dst_eid, amount, composer, compose_msg)?;
        let fee = quote.messaging_fee.native_fee;
        if offered < fee {
            return Err(MultiswapError::InsufficientNativeFee { required: fee, provided: offered });
        }
        ledger.transfer(token, payer, self.address, amount)?;
        ledger.transfer(NATIVE_TOKEN, payer, self.fee_collector, fee)?;
        Ok(fee)
    }

    /// Pays out an arriving transfer to `composer` and builds the compose
    /// message the LayerZero endpoint hands it next.
    pub fn receive(
        &self,
        ledger: &mut TokenLedger,
        src_eid: u32,
        compose_from: Address,
        composer: Address,
        amount: U256,
        inner: Bytes,
    ) -> Result<ComposeMessage> {
        let token = self.configured_token()?;
        ledger.transfer(token, self.address, composer, amount)?;
        Ok(ComposeMessage { src_eid, amount_ld: amount, compose_from, inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> StargateEndpoint {
        let mut sg = StargateEndpoint::new(Address::repeat_byte(0x57), 30110, Address::repeat_byte(0xfe));
        sg.set_token(Address::repeat_byte(0xaa));
        sg
    }

    #[test]
    fn quote_follows_multiplier() {
        let mut sg = endpoint();
        let msg = [0u8; 10];
        let base = sg.quote_send(30184, U256::from(1_000), Address::zero(), &msg).unwrap();
        assert_eq!(base.messaging_fee.native_fee, U256::from(200_200));
        assert_eq!(base.amount_received_ld, U256::from(1_000));

        sg.set_fee_multiplier(10_300);
        let bumped = sg.quote_send(30184, U256::from(1_000), Address::zero(), &msg).unwrap();
        assert_eq!(bumped.messaging_fee.native_fee, U256::from(206_206));
    }

    #[test]
    fn runaway_multiplier_fails_the_quote() {
        let mut sg = endpoint();
        sg.base_fee = U256::MAX / 2;
        sg.set_fee_multiplier(10_300);
        let err = sg.quote_send(30184, U256::one(), Address::zero(), &[]).unwrap_err();
        assert_eq!(err, MultiswapError::ArithmeticOverflow);
    }

    #[test]
    fn unconfigured_endpoint_refuses_quotes() {
        let sg = StargateEndpoint::new(Address::repeat_byte(0x57), 30110, Address::zero());
        let err = sg.quote_send(1, U256::one(), Address::zero(), &[]).unwrap_err();
        assert_eq!(err, MultiswapError::BackendNotConfigured("stargate pool token"));
    }

    #[test]
    fn send_locks_tokens_and_takes_fee() {
        let sg = endpoint();
        let token = Address::repeat_byte(0xaa);
        let payer = Address::repeat_byte(1);
        let mut ledger = TokenLedger::new();
        ledger.mint(token, payer, U256::from(500)).unwrap();
        ledger.mint(NATIVE_TOKEN, payer, U256::from(1_000_000)).unwrap();

        let fee = sg
            .send(&mut ledger, payer, U256::from(1_000_000), 30184, U256::from(500), Address::zero(), &[])
            .unwrap();
        assert_eq!(fee, U256::from(200_000));
        assert_eq!(ledger.balance_of(token, sg.address), U256::from(500));
        assert_eq!(ledger.balance_of(NATIVE_TOKEN, sg.fee_collector), fee);
    }
}
