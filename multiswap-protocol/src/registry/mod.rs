// Admin-maintained lookup tables consulted by the router

pub mod router_whitelist;
pub mod token_paths;
pub mod trusted_remotes;

pub use router_whitelist::RouterWhitelist;
pub use token_paths::TokenPathRegistry;
pub use trusted_remotes::TrustedRemoteRegistry;

use crate::error::{MultiswapError, Result};

pub(crate) fn ensure_same_len(lens: &[usize]) -> Result<()> {
    match lens.split_first() {
        Some((first, rest)) if rest.iter().any(|l| l != first) => Err(MultiswapError::ArrayLengthMismatch),
        _ => Ok(()),
    }
}
