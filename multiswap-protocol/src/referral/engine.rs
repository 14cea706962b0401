use std::collections::{HashMap, HashSet};

use ethers::types::{Address, H256, U256};
use log::debug;

use super::signature::{decode_referral_data, recover_referral_signer};
use crate::data_structures::{checked_percent, percent_of, ChainId, ReferralRecord};
use crate::error::{MultiswapError, Result};

/// How the platform fee of one cross is divided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeSplit {
    pub fee: U256,
    pub platform_cut: U256,
    pub referral_cut: U256,
    pub referral_recipient: Option<Address>,
    /// (code identity, salt) to mark consumed once the cross goes through.
    pub consumes: Option<(Address, H256)>,
}

impl FeeSplit {
    /// Whole fee to the platform, no referral.
    pub fn flat(platform_fee: U256) -> Self {
        FeeSplit {
            fee: platform_fee,
            platform_cut: platform_fee,
            referral_cut: U256::zero(),
            referral_recipient: None,
            consumes: None,
        }
    }

    pub fn with_referral(platform_fee: U256, record: &ReferralRecord) -> Result<Self> {
        let discount = percent_of(platform_fee, record.discount)?;
        let fee = platform_fee.checked_sub(discount).ok_or(MultiswapError::ArithmeticOverflow)?;
        let referral_cut = percent_of(fee, record.share)?;
        Ok(FeeSplit {
            fee,
            platform_cut: fee.checked_sub(referral_cut).ok_or(MultiswapError::ArithmeticOverflow)?,
            referral_cut,
            referral_recipient: Some(record.recipient),
            consumes: None,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReferralEngine {
    referrals: HashMap<Address, ReferralRecord>,
    consumed_salts: HashSet<(Address, H256)>,
}

impl ReferralEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the referral keyed by `code_identity`.
    pub fn add_referral(
        &mut self,
        recipient: Address,
        share: u64,
        discount: u64,
        code_identity: Address,
    ) -> Result<ReferralRecord> {
        let record = ReferralRecord {
            recipient,
            share: checked_percent(share)?,
            discount: checked_percent(discount)?,
            code_identity,
        };
        self.referrals.insert(code_identity, record.clone());
        Ok(record)
    }

    pub fn referral(&self, code_identity: Address) -> Option<&ReferralRecord> {
        self.referrals.get(&code_identity)
    }

    pub fn is_salt_consumed(&self, code_identity: Address, salt: H256) -> bool {
        self.consumed_salts.contains(&(code_identity, salt))
    }

    /// Works out the fee for one cross without mutating anything.
    ///
    /// Only a malformed envelope is an error. A signature that is invalid,
    /// expired, from an unregistered code, or replays a consumed salt simply
    /// yields the flat fee.
    pub fn quote(
        &self,
        platform_fee: U256,
        referral_sig_data: &[u8],
        chain_id: ChainId,
        verifying_contract: Address,
        now: u64,
    ) -> Result<FeeSplit> {
        let sig = match decode_referral_data(referral_sig_data)? {
            Some(sig) => sig,
            None => return Ok(FeeSplit::flat(platform_fee)),
        };
        if sig.expiry < U256::from(now) {
            debug!("referral signature expired at {}, now {}", sig.expiry, now);
            return Ok(FeeSplit::flat(platform_fee));
        }
        let signer = match recover_referral_signer(chain_id, verifying_contract, &sig) {
            Some(signer) => signer,
            None => {
                debug!("referral signature did not recover");
                return Ok(FeeSplit::flat(platform_fee));
            }
        };
        let record = match self.referrals.get(&signer) {
            Some(record) => record,
            None => {
                debug!("referral signer {:?} is not registered", signer);
                return Ok(FeeSplit::flat(platform_fee));
            }
        };
        if self.is_salt_consumed(signer, sig.salt) {
            debug!("referral salt {:?} already used", sig.salt);
            return Ok(FeeSplit::flat(platform_fee));
        }
        let mut split = FeeSplit::with_referral(platform_fee, record)?;
        split.consumes = Some((signer, sig.salt));
        Ok(split)
    }

    pub fn consume(&mut self, split: &FeeSplit) {
        if let Some(key) = split.consumes {
            self.consumed_salts.insert(key);
        }
    }
}
