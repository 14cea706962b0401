use std::collections::HashMap;

use ethers::types::Address;

use super::ensure_same_len;
use crate::data_structures::{ChainId, TrustedRemote};
use crate::error::{MultiswapError, Result};

/// The single peer router accepted from each remote chain.
#[derive(Clone, Debug, Default)]
pub struct TrustedRemoteRegistry {
    remotes: HashMap<ChainId, Address>,
}

impl TrustedRemoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trusted_remotes(&mut self, chain_ids: &[ChainId], routers: &[Address]) -> Result<Vec<TrustedRemote>> {
        ensure_same_len(&[chain_ids.len(), routers.len()])?;
        Ok(chain_ids
            .iter()
            .zip(routers)
            .map(|(&chain_id, &router)| {
                self.remotes.insert(chain_id, router);
                TrustedRemote { chain_id, router }
            })
            .collect())
    }

    pub fn get(&self, chain_id: ChainId) -> Option<Address> {
        self.remotes.get(&chain_id).copied()
    }

    /// Router a message for `chain_id` must be addressed to.
    pub fn peer_for(&self, chain_id: ChainId) -> Result<Address> {
        self.get(chain_id).ok_or(MultiswapError::NoTrustedRemote(chain_id))
    }

    pub fn authenticate(&self, chain_id: ChainId, sender: Address) -> Result<()> {
        match self.get(chain_id) {
            Some(router) if router == sender => Ok(()),
            _ => Err(MultiswapError::UntrustedRemote { chain_id, sender }),
        }
    }
}
