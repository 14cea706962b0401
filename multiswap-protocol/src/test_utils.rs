use std::sync::Arc;

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, H256, U256};

use crate::bridge::Backend;
use crate::data_structures::{function_selector, selector_of, ChainId, ReferralSignature, Selector, NATIVE_TOKEN};
use crate::error::{MultiswapError, Result};
use crate::onchain::interface::{CallEnv, ContractCode};
use crate::onchain::{contract_address, Chain, TxContext};
use crate::referral::{encode_referral_data, referral_code_wallet, referral_digest};
use crate::router::{BridgeLeg, Settlement, SourceSwap};

pub const SWAP_EXACT_TOKENS_FOR_TOKENS: &str = "swapExactTokensForTokens(uint256,uint256,address,address,address)";
pub const FAILING_SWAP: &str = "failingSwapExactTokensForTokens(uint256,uint256,address,address,address)";
/// Takes the input, reports the promised output, delivers nothing.
pub const SHORTCHANGE_SWAP: &str = "shortchangeSwapExactTokensForTokens(uint256,uint256,address,address,address)";

pub const ARBITRUM: ChainId = 42161;
pub const BASE: ChainId = 8453;
pub const PLATFORM_FEE: u64 = 100;

/// DEX stand-in: pulls `amountIn` of `tokenIn` from the caller and sends
/// exactly `amountOutMin` of `tokenOut` to `to` out of its own inventory.
#[derive(Debug, Default)]
pub struct MockSwapRouter;

impl ContractCode for MockSwapRouter {
    fn call(&self, env: &mut CallEnv<'_>, calldata: &[u8]) -> Result<Bytes> {
        let selector = selector_of(calldata)?;
        let tokens = abi::decode(
            &[ParamType::Uint(256), ParamType::Uint(256), ParamType::Address, ParamType::Address, ParamType::Address],
            &calldata[4..],
        )?;
        let (amount_in, amount_out, token_in, token_out, to) = match tokens.as_slice() {
            [Token::Uint(a), Token::Uint(b), Token::Address(c), Token::Address(d), Token::Address(e)] => {
                (*a, *b, *c, *d, *e)
            }
            _ => return Err(MultiswapError::Codec("bad swap arguments".into())),
        };

        if selector == function_selector(FAILING_SWAP) {
            return Err(MultiswapError::ExternalCallReverted("swap failed".into()));
        }
        env.ledger.transfer_from(token_in, env.this, env.caller, env.this, amount_in)?;
        if selector == function_selector(SHORTCHANGE_SWAP) {
            return Ok(abi::encode(&[Token::Uint(amount_out)]).into());
        }
        if selector != function_selector(SWAP_EXACT_TOKENS_FOR_TOKENS) {
            return Err(MultiswapError::ExternalCallReverted("unknown function".into()));
        }
        env.ledger.transfer(token_out, env.this, to, amount_out)?;
        Ok(abi::encode(&[Token::Uint(amount_out)]).into())
    }
}

pub fn mock_swap_selectors() -> Vec<Selector> {
    vec![
        function_selector(SWAP_EXACT_TOKENS_FOR_TOKENS),
        function_selector(FAILING_SWAP),
        function_selector(SHORTCHANGE_SWAP),
    ]
}

pub fn encode_swap_call(
    signature: &str,
    amount_in: U256,
    amount_out_min: U256,
    token_in: Address,
    token_out: Address,
    to: Address,
) -> Bytes {
    let mut calldata = function_selector(signature).to_vec();
    calldata.extend(abi::encode(&[
        Token::Uint(amount_in),
        Token::Uint(amount_out_min),
        Token::Address(token_in),
        Token::Address(token_out),
        Token::Address(to),
    ]));
    calldata.into()
}

/// Referral data as a code holder would produce it for `router` on `chain_id`.
pub fn sign_referral(code: &str, chain_id: ChainId, router: Address, salt: H256, expiry: U256) -> Bytes {
    let wallet = referral_code_wallet(code).expect("referral wallet");
    let signature = wallet
        .sign_hash(referral_digest(chain_id, router, salt, expiry))
        .expect("sign referral digest");
    encode_referral_data(&ReferralSignature { salt, expiry, signature: signature.to_vec().into() })
}

/// Two chains with routers wired to each other over every backend, funded
/// pools, swap routers and a user holding tokens on the source side.
pub struct TestNetwork {
    pub src: Chain,
    pub dst: Chain,
    pub owner: Address,
    pub user: Address,
    pub recipient: Address,
    pub fee_wallet: Address,
    pub referral_recipient: Address,
    pub src_usdc: Address,
    pub src_weth: Address,
    pub dst_usdc: Address,
    pub dst_weth: Address,
    pub frm: Address,
    pub src_swap_router: Address,
    pub dst_swap_router: Address,
}

// One end of the test network, as the other end needs to know it
struct Side {
    chain_id: ChainId,
    router: Address,
    usdc: Address,
    weth: Address,
    ccip_selector: u64,
    eid: u32,
}

fn wire_router(
    chain: &mut Chain,
    owner: Address,
    fee_wallet: Address,
    local: &Side,
    remote: &Side,
    swap_router: Address,
    (stargate, lz_endpoint): (Address, Address),
) {
    chain
        .transact(TxContext::call(owner), |router, env| {
            router.set_platform_fee(env, U256::from(PLATFORM_FEE))?;
            router.set_fee_wallet(env, fee_wallet)?;
            router.add_token_paths(
                env,
                &[local.usdc, local.weth],
                &[remote.chain_id, remote.chain_id],
                &[remote.usdc, remote.weth],
            )?;
            router.add_trusted_remotes(env, &[remote.chain_id], &[remote.router])?;
            router.add_router_and_selectors(env, swap_router, &mock_swap_selectors())?;
            router.set_chain_id_and_ccip_chain_selector_pairs(env, &[remote.chain_id], &[remote.ccip_selector])?;
            router.init_config(env, stargate, local.usdc, lz_endpoint)?;
            router.set_stg_target_network(env, remote.chain_id, remote.eid, remote.router)
        })
        .expect("wire router");
}

impl TestNetwork {
    pub const USER_BALANCE: u64 = 1_000_000_000;
    pub const POOL_LIQUIDITY: u64 = 10_000_000;

    pub fn deploy() -> Self {
        let owner = Address::repeat_byte(0x01);
        let user = Address::repeat_byte(0x02);
        let recipient = Address::repeat_byte(0x03);
        let fee_wallet = Address::repeat_byte(0x04);
        let referral_recipient = Address::repeat_byte(0x05);

        let mut src = Chain::new(ARBITRUM, owner);
        let mut dst = Chain::new(BASE, owner);

        let src_usdc = contract_address(ARBITRUM, "usdc");
        let src_weth = contract_address(ARBITRUM, "weth");
        let dst_usdc = contract_address(BASE, "usdc");
        let dst_weth = contract_address(BASE, "weth");
        let frm = contract_address(ARBITRUM, "frm");
        let src_swap_router = contract_address(ARBITRUM, "swap-router");
        let dst_swap_router = contract_address(BASE, "swap-router");

        src.deploy_code(src_swap_router, Arc::new(MockSwapRouter));
        dst.deploy_code(dst_swap_router, Arc::new(MockSwapRouter));

        let src_router = src.router().address;
        let dst_router = dst.router().address;
        let (src_sg, src_lz, src_eid) = (src.endpoints().stargate.address, src.endpoints().lz_endpoint, src.endpoints().stargate.eid);
        let (dst_sg, dst_lz, dst_eid) = (dst.endpoints().stargate.address, dst.endpoints().lz_endpoint, dst.endpoints().stargate.eid);
        let (src_selector, dst_selector) = (src.endpoints().ccip.local_selector, dst.endpoints().ccip.local_selector);

        src.endpoints_mut().portal.set_fee_token(frm);
        src.endpoints_mut().stargate.set_token(src_usdc);
        dst.endpoints_mut().stargate.set_token(dst_usdc);

        let src_side = Side {
            chain_id: ARBITRUM,
            router: src_router,
            usdc: src_usdc,
            weth: src_weth,
            ccip_selector: src_selector,
            eid: src_eid,
        };
        let dst_side = Side {
            chain_id: BASE,
            router: dst_router,
            usdc: dst_usdc,
            weth: dst_weth,
            ccip_selector: dst_selector,
            eid: dst_eid,
        };
        wire_router(&mut src, owner, fee_wallet, &src_side, &dst_side, src_swap_router, (src_sg, src_lz));
        wire_router(&mut dst, owner, fee_wallet, &dst_side, &src_side, dst_swap_router, (dst_sg, dst_lz));

        let liquidity = U256::from(Self::POOL_LIQUIDITY);
        for (chain, usdc, weth, swap_router, sg) in [
            (&mut src, src_usdc, src_weth, src_swap_router, src_sg),
            (&mut dst, dst_usdc, dst_weth, dst_swap_router, dst_sg),
        ] {
            let pool = chain.pool().address;
            chain.mint(usdc, owner, liquidity).expect("mint");
            chain.approve(owner, usdc, pool, liquidity);
            chain.add_liquidity(owner, usdc, liquidity).expect("seed pool");
            chain.mint(usdc, swap_router, liquidity).expect("mint");
            chain.mint(weth, swap_router, liquidity).expect("mint");
            chain.mint(usdc, sg, liquidity).expect("mint");
        }

        let balance = U256::from(Self::USER_BALANCE);
        for token in [src_usdc, src_weth, frm, NATIVE_TOKEN] {
            src.mint(token, user, balance).expect("mint");
            src.approve(user, token, src_router, balance);
        }

        TestNetwork {
            src,
            dst,
            owner,
            user,
            recipient,
            fee_wallet,
            referral_recipient,
            src_usdc,
            src_weth,
            dst_usdc,
            dst_weth,
            frm,
            src_swap_router,
            dst_swap_router,
        }
    }

    pub fn leg(&self, backend: Backend) -> BridgeLeg {
        BridgeLeg {
            bridge_fee: U256::zero(),
            recipient: self.recipient,
            dst_chain_id: BASE,
            backend: backend.as_u8(),
            referral_sig_data: Bytes::new(),
        }
    }

    /// Source swap of WETH into USDC through the source swap router.
    pub fn weth_to_usdc(&self, amount_in: U256, amount_out: U256) -> SourceSwap {
        SourceSwap {
            from_token: self.src_weth,
            to_token: self.src_usdc,
            amount_in,
            min_amount_out: amount_out,
            router: self.src_swap_router,
            calldata: encode_swap_call(
                SWAP_EXACT_TOKENS_FOR_TOKENS,
                amount_in,
                amount_out,
                self.src_weth,
                self.src_usdc,
                self.src.router().address,
            ),
        }
    }

    pub fn register_referral(&mut self, code: &str, share: u64, discount: u64) {
        let identity = crate::referral::referral_code_identity(code).expect("code identity");
        let (owner, recipient) = (self.owner, self.referral_recipient);
        self.src
            .transact(TxContext::call(owner), |router, env| {
                router.add_referral(env, recipient, share, discount, identity)
            })
            .expect("add referral");
    }

    /// Moves every queued packet to its destination, both directions.
    pub fn relay(&mut self) -> Vec<Result<Settlement>> {
        let mut results = Vec::new();
        for packet in self.src.take_outbound() {
            results.push(self.dst.deliver(&packet));
        }
        for packet in self.dst.take_outbound() {
            results.push(self.src.deliver(&packet));
        }
        results
    }
}
