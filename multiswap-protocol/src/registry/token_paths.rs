use std::collections::HashMap;

use ethers::types::Address;

use super::ensure_same_len;
use crate::data_structures::{ChainId, TokenPath};
use crate::error::{MultiswapError, Result};

/// (local token, destination chain) -> remote token.
#[derive(Clone, Debug, Default)]
pub struct TokenPathRegistry {
    paths: HashMap<(Address, ChainId), Address>,
}

impl TokenPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers paths from parallel arrays. Later entries overwrite earlier
    /// ones for the same key. Nothing is written if the lengths differ.
    pub fn add_token_paths(
        &mut self,
        local_tokens: &[Address],
        chain_ids: &[ChainId],
        remote_tokens: &[Address],
    ) -> Result<Vec<TokenPath>> {
        ensure_same_len(&[local_tokens.len(), chain_ids.len(), remote_tokens.len()])?;
        let mut added = Vec::with_capacity(local_tokens.len());
        for ((&local_token, &chain_id), &remote_token) in local_tokens.iter().zip(chain_ids).zip(remote_tokens) {
            self.paths.insert((local_token, chain_id), remote_token);
            added.push(TokenPath { local_token, chain_id, remote_token });
        }
        Ok(added)
    }

    pub fn get(&self, local_token: Address, chain_id: ChainId) -> Option<Address> {
        self.paths.get(&(local_token, chain_id)).copied()
    }

    pub fn resolve(&self, local_token: Address, chain_id: ChainId) -> Result<Address> {
        self.get(local_token, chain_id)
            .ok_or(MultiswapError::UnknownTokenPath { token: local_token, chain_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_one_directional() {
        let mut reg = TokenPathRegistry::new();
        let (usdc_arb, usdc_base) = (Address::repeat_byte(1), Address::repeat_byte(2));
        reg.add_token_paths(&[usdc_arb], &[8453], &[usdc_base]).unwrap();

        assert_eq!(reg.resolve(usdc_arb, 8453).unwrap(), usdc_base);
        assert!(reg.get(usdc_base, 42161).is_none());
        assert!(matches!(reg.resolve(usdc_arb, 10), Err(MultiswapError::UnknownTokenPath { .. })));
    }

    #[test]
    fn mismatched_arrays_write_nothing() {
        let mut reg = TokenPathRegistry::new();
        let err = reg
            .add_token_paths(&[Address::repeat_byte(1), Address::repeat_byte(2)], &[1], &[Address::zero()])
            .unwrap_err();
        assert_eq!(err, MultiswapError::ArrayLengthMismatch);
        assert!(reg.get(Address::repeat_byte(1), 1).is_none());
    }
}
