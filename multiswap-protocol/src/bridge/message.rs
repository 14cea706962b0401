use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::keccak256;

use crate::data_structures::{ChainId, MessageId};
use crate::error::{MultiswapError, Result};

/// Swap the destination router performs on arrival before paying out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestinationSwap {
    pub to_token: Address,
    pub min_amount_out: U256,
    pub router: Address,
    pub calldata: Bytes,
}

impl DestinationSwap {
    /// `abi.encode(address toToken, uint256 minOut, address router, bytes data)`
    pub fn encode(&self) -> Bytes {
        abi::encode(&[
            Token::Address(self.to_token),
            Token::Uint(self.min_amount_out),
            Token::Address(self.router),
            Token::Bytes(self.calldata.to_vec()),
        ])
        .into()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let tokens = abi::decode(
            &[ParamType::Address, ParamType::Uint(256), ParamType::Address, ParamType::Bytes],
            data,
        )?;
        let mut it = tokens.into_iter();
        Ok(DestinationSwap {
            to_token: next_address(&mut it)?,
            min_amount_out: next_uint(&mut it)?,
            router: next_address(&mut it)?,
            calldata: next_bytes(&mut it)?.into(),
        })
    }
}

/// Application payload every backend carries from router to router.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeMessage {
    pub src_chain_id: ChainId,
    pub dst_chain_id: ChainId,
    pub nonce: u64,
    /// Token to release on the destination chain.
    pub token: Address,
    pub amount: U256,
    pub recipient: Address,
    pub destination_swap: Option<DestinationSwap>,
}

impl BridgeMessage {
    pub fn encode(&self) -> Bytes {
        let compose = self
            .destination_swap
            .as_ref()
            .map(|swap| swap.encode().to_vec())
            .unwrap_or_default();
        abi::encode(&[
            Token::Uint(U256::from(self.src_chain_id)),
            Token::Uint(U256::from(self.dst_chain_id)),
            Token::Uint(U256::from(self.nonce)),
            Token::Address(self.token),
            Token::Uint(self.amount),
            Token::Address(self.recipient),
            Token::Bytes(compose),
        ])
        .into()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let tokens = abi::decode(
            &[
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Address,
                ParamType::Bytes,
            ],
            data,
        )?;
        let mut it = tokens.into_iter();
        let src_chain_id = as_u64(next_uint(&mut it)?)?;
        let dst_chain_id = as_u64(next_uint(&mut it)?)?;
        let nonce = as_u64(next_uint(&mut it)?)?;
        let token = next_address(&mut it)?;
        let amount = next_uint(&mut it)?;
        let recipient = next_address(&mut it)?;
        let compose = next_bytes(&mut it)?;
        let destination_swap = if compose.is_empty() { None } else { Some(DestinationSwap::decode(&compose)?) };
        Ok(BridgeMessage { src_chain_id, dst_chain_id, nonce, token, amount, recipient, destination_swap })
    }

    /// Identity used for replay protection on the destination side.
    pub fn id(&self, source_router: Address) -> MessageId {
        message_id(self.src_chain_id, self.dst_chain_id, source_router, self.nonce)
    }
}

/// `keccak256(abi.encode(src, dst, sourceRouter, nonce))`
pub fn message_id(src_chain_id: ChainId, dst_chain_id: ChainId, source_router: Address, nonce: u64) -> MessageId {
    let encoded = abi::encode(&[
        Token::Uint(U256::from(src_chain_id)),
        Token::Uint(U256::from(dst_chain_id)),
        Token::Address(source_router),
        Token::Uint(U256::from(nonce)),
    ]);
    keccak256(encoded).into()
}

/// Compose payload a Stargate endpoint hands to the receiving composer,
/// wrapping the sender's inner message with what actually arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposeMessage {
    pub src_eid: u32,
    pub amount_ld: U256,
    pub compose_from: Address,
    pub inner: Bytes,
}

impl ComposeMessage {
    pub fn encode(&self) -> Bytes {
        abi::encode(&[
            Token::Uint(U256::from(self.src_eid)),
            Token::Uint(self.amount_ld),
            Token::Address(self.compose_from),
            Token::Bytes(self.inner.to_vec()),
        ])
        .into()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let tokens = abi::decode(
            &[ParamType::Uint(32), ParamType::Uint(256), ParamType::Address, ParamType::Bytes],
            data,
        )?;
        let mut it = tokens.into_iter();
        let src_eid = next_uint(&mut it)?;
        if src_eid > U256::from(u32::MAX) {
            return Err(MultiswapError::Codec(format!("endpoint id {} out of range", src_eid)));
        }
        Ok(ComposeMessage {
            src_eid: src_eid.as_u32(),
            amount_ld: next_uint(&mut it)?,
            compose_from: next_address(&mut it)?,
            inner: next_bytes(&mut it)?.into(),
        })
    }
}

fn next_uint(it: &mut impl Iterator<Item = Token>) -> Result<U256> {
    it.next()
        .and_then(Token::into_uint)
        .ok_or_else(|| MultiswapError::Codec("expected uint".into()))
}

fn next_address(it: &mut impl Iterator<Item = Token>) -> Result<Address> {
    it.next()
        .and_then(Token::into_address)
        .ok_or_else(|| MultiswapError::Codec("expected address".into()))
}

fn next_bytes(it: &mut impl Iterator<Item = Token>) -> Result<Vec<u8>> {
    it.next()
        .and_then(Token::into_bytes)
        .ok_or_else(|| MultiswapError::Codec("expected bytes".into()))
}

fn as_u64(value: U256) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(MultiswapError::Codec(format!("{} does not fit in 64 bits", value)));
    }
    Ok(value.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(swap: Option<DestinationSwap>) -> BridgeMessage {
        BridgeMessage {
            src_chain_id: 42161,
            dst_chain_id: 8453,
            nonce: 7,
            token: Address::repeat_byte(0xaa),
            amount: U256::from(99_900u64),
            recipient: Address::repeat_byte(0x05),
            destination_swap: swap,
        }
    }

    #[test]
    fn message_without_swap_decodes_to_none() {
        let msg = sample(None);
        assert_eq!(BridgeMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn message_carries_destination_swap() {
        let swap = DestinationSwap {
            to_token: Address::repeat_byte(0xbb),
            min_amount_out: U256::from(5),
            router: Address::repeat_byte(0xcc),
            calldata: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef, 0x01]),
        };
        let msg = sample(Some(swap.clone()));
        let decoded = BridgeMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.destination_swap, Some(swap));
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let err = BridgeMessage::decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, MultiswapError::Codec(_)));
    }

    #[test]
    fn message_ids_differ_by_nonce_and_router() {
        let router = Address::repeat_byte(1);
        let a = message_id(1, 2, router, 1);
        assert_ne!(a, message_id(1, 2, router, 2));
        assert_ne!(a, message_id(1, 2, Address::repeat_byte(2), 1));
        assert_eq!(a, sample_with_nonce(1).id(router));
    }

    fn sample_with_nonce(nonce: u64) -> BridgeMessage {
        BridgeMessage { src_chain_id: 1, dst_chain_id: 2, nonce, ..sample(None) }
    }

    #[test]
    fn compose_wraps_inner_message() {
        let compose = ComposeMessage {
            src_eid: 30110,
            amount_ld: U256::from(1_000),
            compose_from: Address::repeat_byte(0x33),
            inner: sample(None).encode(),
        };
        let decoded = ComposeMessage::decode(&compose.encode()).unwrap();
        assert_eq!(decoded.src_eid, 30110);
        assert_eq!(BridgeMessage::decode(&decoded.inner).unwrap(), sample(None));
    }
}
