use std::convert::TryFrom;

use ethers::abi::{self, ParamType, Token};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, Signature, H256, U256};
use ethers::utils::keccak256;

use crate::config::{REFERRAL_DOMAIN_NAME, REFERRAL_DOMAIN_VERSION, REFERRAL_SIGNATURE_TYPE};
use crate::data_structures::{ChainId, ReferralSignature};
use crate::error::{MultiswapError, Result};

const EIP712_DOMAIN_TYPE: &str = "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

// secp256k1 group order / 2; signatures with a larger s are malleable twins
const SECP256K1_HALF_ORDER: &str = "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0";

/// Decodes `abi.encode(bytes32 salt, uint256 expiry, bytes signature)`.
/// Empty input means the caller supplied no referral.
pub fn decode_referral_data(data: &[u8]) -> Result<Option<ReferralSignature>> {
    if data.is_empty() {
        return Ok(None);
    }
    let tokens = abi::decode(&[ParamType::FixedBytes(32), ParamType::Uint(256), ParamType::Bytes], data)
        .map_err(|e| MultiswapError::MalformedReferralData(e.to_string()))?;
    match tokens.as_slice() {
        [Token::FixedBytes(salt), Token::Uint(expiry), Token::Bytes(signature)] => Ok(Some(ReferralSignature {
            salt: H256::from_slice(salt),
            expiry: *expiry,
            signature: Bytes::from(signature.clone()),
        })),
        _ => Err(MultiswapError::MalformedReferralData("unexpected field layout".into())),
    }
}

pub fn encode_referral_data(sig: &ReferralSignature) -> Bytes {
    abi::encode(&[
        Token::FixedBytes(sig.salt.as_bytes().to_vec()),
        Token::Uint(sig.expiry),
        Token::Bytes(sig.signature.to_vec()),
    ])
    .into()
}

pub fn domain_separator(chain_id: ChainId, verifying_contract: Address) -> H256 {
    keccak256(abi::encode(&[
        Token::FixedBytes(keccak256(EIP712_DOMAIN_TYPE).to_vec()),
        Token::FixedBytes(keccak256(REFERRAL_DOMAIN_NAME).to_vec()),
        Token::FixedBytes(keccak256(REFERRAL_DOMAIN_VERSION).to_vec()),
        Token::Uint(U256::from(chain_id)),
        Token::Address(verifying_contract),
    ]))
    .into()
}

/// Digest a referral code holder signs: `keccak256(0x1901 || domainSeparator || structHash)`.
pub fn referral_digest(chain_id: ChainId, verifying_contract: Address, salt: H256, expiry: U256) -> H256 {
    let struct_hash = keccak256(abi::encode(&[
        Token::FixedBytes(keccak256(REFERRAL_SIGNATURE_TYPE).to_vec()),
        Token::FixedBytes(salt.as_bytes().to_vec()),
        Token::Uint(expiry),
    ]));
    let mut preimage = Vec::with_capacity(66);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain_separator(chain_id, verifying_contract).as_bytes());
    preimage.extend_from_slice(&struct_hash);
    keccak256(preimage).into()
}

/// Recovers who signed `sig`. `None` for anything that is not a well-formed,
/// canonical 65-byte signature over the referral digest.
pub fn recover_referral_signer(chain_id: ChainId, verifying_contract: Address, sig: &ReferralSignature) -> Option<Address> {
    let signature = Signature::try_from(sig.signature.as_ref()).ok()?;
    if !(27..=28).contains(&signature.v) {
        return None;
    }
    let half_order = U256::from_str_radix(SECP256K1_HALF_ORDER, 16).ok()?;
    if signature.s > half_order {
        return None;
    }
    let digest = referral_digest(chain_id, verifying_contract, sig.salt, sig.expiry);
    signature.recover(digest).ok()
}

/// Address that identifies a referral code: the account whose private key is
/// `keccak256(code)`.
pub fn referral_code_identity(code: &str) -> Result<Address> {
    Ok(referral_code_wallet(code)?.address())
}

pub fn referral_code_wallet(code: &str) -> Result<LocalWallet> {
    LocalWallet::from_bytes(&keccak256(code.as_bytes()))
        .map_err(|e| MultiswapError::MalformedReferralData(format!("unusable referral code: {}", e)))
}
