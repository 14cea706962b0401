// Referral registry, EIP-712 signature checks and fee splitting

pub mod engine;
pub mod signature;

pub use engine::{FeeSplit, ReferralEngine};
pub use signature::{
    decode_referral_data, encode_referral_data, recover_referral_signer, referral_code_identity,
    referral_code_wallet, referral_digest,
};
