use std::collections::{HashMap, HashSet};

use ethers::types::Address;

use crate::data_structures::{selector_of, Selector, WhitelistedRouter};
use crate::error::{MultiswapError, Result};

/// External swap routers the protocol may call, and which functions on each.
#[derive(Clone, Debug, Default)]
pub struct RouterWhitelist {
    routers: HashMap<Address, HashSet<Selector>>,
}

impl RouterWhitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_router_and_selectors(&mut self, router: Address, selectors: &[Selector]) {
        self.routers.entry(router).or_default().extend(selectors.iter().copied());
    }

    /// Removing the last selector drops the router entirely.
    pub fn remove_router_and_selectors(&mut self, router: Address, selectors: &[Selector]) {
        if let Some(allowed) = self.routers.get_mut(&router) {
            for selector in selectors {
                allowed.remove(selector);
            }
            if allowed.is_empty() {
                self.routers.remove(&router);
            }
        }
    }

    pub fn is_allowed(&self, router: Address, selector: Selector) -> bool {
        self.routers.get(&router).map_or(false, |s| s.contains(&selector))
    }

    /// Admits `calldata` for `router` or names why it is refused.
    pub fn check(&self, router: Address, calldata: &[u8]) -> Result<Selector> {
        let allowed = self.routers.get(&router).ok_or(MultiswapError::RouterNotWhitelisted(router))?;
        let selector = selector_of(calldata)?;
        if !allowed.contains(&selector) {
            return Err(MultiswapError::SelectorNotWhitelisted { router, selector });
        }
        Ok(selector)
    }

    pub fn entry(&self, router: Address) -> Option<WhitelistedRouter> {
        self.routers
            .get(&router)
            .map(|selectors| WhitelistedRouter { router, selectors: selectors.clone() })
    }
}
