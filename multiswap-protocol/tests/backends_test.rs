// Per-backend fee handling and delivery paths

use ethers::types::{Address, U256};
use multiswap_protocol::{
    bridge::{Backend, DestinationSwap},
    config::apply_fee_buffer,
    onchain::TxContext,
    test_utils::{encode_swap_call, TestNetwork, BASE, SWAP_EXACT_TOKENS_FOR_TOKENS},
    MultiswapError,
};

const AMOUNT: u64 = 100_000;
const BRIDGED: u64 = 99_900;

// Registers a third chain on the source router with a token path and a peer
fn add_route_to(net: &mut TestNetwork, chain_id: u64) {
    let (owner, usdc) = (net.owner, net.src_usdc);
    net.src
        .transact(TxContext::call(owner), |router, env| {
            router.add_token_paths(env, &[usdc], &[chain_id], &[Address::repeat_byte(0x10)])?;
            router.add_trusted_remotes(env, &[chain_id], &[Address::repeat_byte(0x11)])
        })
        .unwrap();
}

#[test]
fn portal_charges_fee_token_and_forwards_gas() {
    let mut net = TestNetwork::deploy();
    let (owner, user) = (net.owner, net.user);
    let gas_wallet = Address::repeat_byte(0x6a);
    net.src
        .transact(TxContext::call(owner), |router, env| router.set_gas_wallet(env, gas_wallet))
        .unwrap();

    let mut leg = net.leg(Backend::QuantumPortal);
    leg.bridge_fee = U256::from(500);
    let receipt = net
        .src
        .cross(TxContext::with_value(user, U256::from(1_000)), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap();

    assert_eq!(receipt.transport_fee, U256::from(500));
    let fee_target = net.src.endpoints().portal.fee_target;
    assert_eq!(net.src.balance_of(net.frm, fee_target), U256::from(500));
    assert_eq!(net.src.native_balance(gas_wallet), U256::from(1_000));
    assert!(net.src.native_balance(net.src.router().address).is_zero());
    assert_eq!(net.src.quote_native_fee(Backend::QuantumPortal, BASE, U256::from(AMOUNT), None).unwrap(), U256::zero());
}

#[test]
fn portal_fee_needs_allowance() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let router = net.src.router().address;
    net.src.approve(user, net.frm, router, U256::from(10));

    let mut leg = net.leg(Backend::QuantumPortal);
    leg.bridge_fee = U256::from(500);
    let err = net.src.cross(TxContext::call(user), net.src_usdc, U256::from(AMOUNT), &leg).unwrap_err();
    assert!(matches!(err, MultiswapError::InsufficientAllowance { .. }));
    assert_eq!(net.src.balance_of(net.src_usdc, user), U256::from(TestNetwork::USER_BALANCE));
}

#[test]
fn ccip_takes_quoted_fee_and_refunds_the_rest() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let quote = net.src.quote_native_fee(Backend::Ccip, BASE, U256::from(AMOUNT), None).unwrap();
    assert!(quote > U256::from(100_000));

    let leg = net.leg(Backend::Ccip);
    let receipt = net
        .src
        .cross(TxContext::with_value(user, quote + U256::from(5_000)), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap();

    assert_eq!(receipt.transport_fee, quote);
    assert_eq!(net.src.native_balance(user), U256::from(TestNetwork::USER_BALANCE) - quote);
    assert_eq!(net.src.native_balance(net.src.endpoints().ccip.fee_collector), quote);

    let packet = &net.src.endpoints().pending()[0];
    assert_eq!(packet.source_ref, net.src.endpoints().ccip.local_selector);

    let settled = net.relay().remove(0).unwrap();
    assert_eq!(settled.amount, U256::from(BRIDGED));
    assert_eq!(net.dst.balance_of(net.dst_usdc, net.recipient), U256::from(BRIDGED));
}

#[test]
fn ccip_underfunded_cross_reverts() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let quote = net.src.quote_native_fee(Backend::Ccip, BASE, U256::from(AMOUNT), None).unwrap();
    let leg = net.leg(Backend::Ccip);

    let err = net
        .src
        .cross(TxContext::with_value(user, quote - U256::one()), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap_err();
    assert_eq!(err, MultiswapError::InsufficientNativeFee { required: quote, provided: quote - U256::one() });
    assert_eq!(net.src.native_balance(user), U256::from(TestNetwork::USER_BALANCE));
    assert!(net.src.balance_of(net.src_usdc, net.fee_wallet).is_zero());
}

#[test]
fn ccip_needs_a_selector_for_the_destination() {
    let mut net = TestNetwork::deploy();
    add_route_to(&mut net, 10);
    let user = net.user;
    let mut leg = net.leg(Backend::Ccip);
    leg.dst_chain_id = 10;

    let err = net
        .src
        .cross(TxContext::with_value(user, U256::from(1_000_000)), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap_err();
    assert_eq!(err, MultiswapError::UnknownCcipChain(10));
}

#[test]
fn ccip_delivery_from_unmapped_selector_is_rejected() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let quote = net.src.quote_native_fee(Backend::Ccip, BASE, U256::from(AMOUNT), None).unwrap();
    let leg = net.leg(Backend::Ccip);
    net.src
        .cross(TxContext::with_value(user, quote), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap();

    let mut packet = net.src.take_outbound().remove(0);
    packet.source_ref = 12_345;
    assert_eq!(net.dst.deliver(&packet).unwrap_err(), MultiswapError::UnknownChainSelector(12_345));
}

#[test]
fn stargate_buffer_absorbs_fee_drift() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let quote = net.src.quote_native_fee(Backend::Stargate, BASE, U256::from(AMOUNT), None).unwrap();
    let buffered = apply_fee_buffer(quote).unwrap();
    assert_eq!(buffered, quote * U256::from(10_500) / U256::from(10_000));

    // Fee rises 3% between quote and send
    net.src.endpoints_mut().stargate.set_fee_multiplier(10_300);
    let live = net.src.quote_native_fee(Backend::Stargate, BASE, U256::from(AMOUNT), None).unwrap();
    assert!(live > quote && live <= buffered);

    let leg = net.leg(Backend::Stargate);
    let receipt = net
        .src
        .cross(TxContext::with_value(user, buffered), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap();
    assert_eq!(receipt.transport_fee, live);
    assert_eq!(net.src.native_balance(user), U256::from(TestNetwork::USER_BALANCE) - live);
}

#[test]
fn stargate_fee_jump_beyond_buffer_reverts() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let quote = net.src.quote_native_fee(Backend::Stargate, BASE, U256::from(AMOUNT), None).unwrap();
    let buffered = apply_fee_buffer(quote).unwrap();

    net.src.endpoints_mut().stargate.set_fee_multiplier(11_000);
    let leg = net.leg(Backend::Stargate);
    let err = net
        .src
        .cross(TxContext::with_value(user, buffered), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap_err();
    assert!(matches!(err, MultiswapError::InsufficientNativeFee { provided, .. } if provided == buffered));
}

#[test]
fn stargate_moves_liquidity_outside_the_pool() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let src_pool = net.src.pool_balance(net.src_usdc);
    let dst_pool = net.dst.pool_balance(net.dst_usdc);
    let src_sg = net.src.endpoints().stargate.address;
    let sg_before = net.src.balance_of(net.src_usdc, src_sg);

    let fee = net.src.quote_native_fee(Backend::Stargate, BASE, U256::from(AMOUNT), None).unwrap();
    let leg = net.leg(Backend::Stargate);
    net.src
        .cross(TxContext::with_value(user, fee), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap();

    assert_eq!(net.src.balance_of(net.src_usdc, src_sg), sg_before + U256::from(BRIDGED));
    let packet = &net.src.endpoints().pending()[0];
    assert_eq!(packet.amount, U256::from(BRIDGED));
    assert_eq!(packet.source_ref, u64::from(net.src.endpoints().stargate.eid));

    let settled = net.relay().remove(0).unwrap();
    assert_eq!(settled.token, net.dst_usdc);
    assert_eq!(net.dst.balance_of(net.dst_usdc, net.recipient), U256::from(BRIDGED));
    assert_eq!(net.src.pool_balance(net.src_usdc), src_pool);
    assert_eq!(net.dst.pool_balance(net.dst_usdc), dst_pool);
}

#[test]
fn stargate_compose_runs_destination_swap() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let dst_swap = DestinationSwap {
        to_token: net.dst_weth,
        min_amount_out: U256::from(40_000),
        router: net.dst_swap_router,
        calldata: encode_swap_call(
            SWAP_EXACT_TOKENS_FOR_TOKENS,
            U256::from(BRIDGED),
            U256::from(41_000),
            net.dst_usdc,
            net.dst_weth,
            net.dst.router().address,
        ),
    };
    let fee = net
        .src
        .quote_native_fee(Backend::Stargate, BASE, U256::from(AMOUNT), Some(&dst_swap))
        .unwrap();
    let leg = net.leg(Backend::Stargate);
    net.src
        .cross_and_swap(TxContext::with_value(user, fee), net.src_usdc, U256::from(AMOUNT), &leg, &dst_swap)
        .unwrap();

    let settled = net.relay().remove(0).unwrap();
    assert!(settled.swapped);
    assert_eq!(net.dst.balance_of(net.dst_weth, net.recipient), U256::from(41_000));
}

#[test]
fn stargate_replay_is_rolled_back() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let fee = net.src.quote_native_fee(Backend::Stargate, BASE, U256::from(AMOUNT), None).unwrap();
    let leg = net.leg(Backend::Stargate);
    let receipt = net
        .src
        .cross(TxContext::with_value(user, fee), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap();

    let packet = net.src.take_outbound().remove(0);
    net.dst.deliver(&packet).unwrap();
    let dst_sg = net.dst.endpoints().stargate.address;
    let sg_balance = net.dst.balance_of(net.dst_usdc, dst_sg);

    assert_eq!(net.dst.deliver(&packet).unwrap_err(), MultiswapError::DuplicateMessage(receipt.message_id));
    assert_eq!(net.dst.balance_of(net.dst_usdc, dst_sg), sg_balance);
    assert!(net.dst.balance_of(net.dst_usdc, net.dst.router().address).is_zero());
}

#[test]
fn stargate_only_carries_its_pool_token() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let leg = net.leg(Backend::Stargate);
    let err = net
        .src
        .cross(TxContext::with_value(user, U256::from(1_000_000)), net.src_weth, U256::from(AMOUNT), &leg)
        .unwrap_err();
    assert_eq!(err, MultiswapError::UnsupportedStargateToken(net.src_weth));
}

#[test]
fn stargate_needs_a_target_network() {
    let mut net = TestNetwork::deploy();
    add_route_to(&mut net, 10);
    let user = net.user;
    let mut leg = net.leg(Backend::Stargate);
    leg.dst_chain_id = 10;

    let err = net
        .src
        .cross(TxContext::with_value(user, U256::from(1_000_000)), net.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap_err();
    assert_eq!(err, MultiswapError::StargateTargetNotSet(10));
    assert_eq!(
        net.src.quote_native_fee(Backend::Stargate, 10, U256::from(AMOUNT), None).unwrap_err(),
        MultiswapError::StargateTargetNotSet(10)
    );
}

#[test]
fn taxi_quote_prices_the_compose_message() {
    let net = TestNetwork::deploy();
    let target = net.src.router().stargate_target(BASE).unwrap();
    let quote = net
        .src
        .router()
        .prepare_take_taxi(net.src.endpoints(), target.eid, U256::from(AMOUNT), target.router, &[0u8; 100])
        .unwrap();
    assert_eq!(quote.amount_sent_ld, U256::from(AMOUNT));
    assert_eq!(quote.amount_received_ld, U256::from(AMOUNT));
    assert_eq!(quote.messaging_fee.native_fee, U256::from(202_000));
    assert!(quote.messaging_fee.lz_token_fee.is_zero());
}

#[test]
fn compose_is_restricted_to_the_lz_endpoint() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let stargate = net.dst.endpoints().stargate.address;
    let lz_endpoint = net.dst.endpoints().lz_endpoint;

    let err = net
        .dst
        .transact(TxContext::call(user), |router, env| router.lz_compose(env, stargate, &[]))
        .unwrap_err();
    assert_eq!(err, MultiswapError::Unauthorized { caller: user, action: "invoke compose" });

    let err = net
        .dst
        .transact(TxContext::call(lz_endpoint), |router, env| router.lz_compose(env, user, &[]))
        .unwrap_err();
    assert_eq!(err, MultiswapError::Unauthorized { caller: user, action: "compose into the router" });
}

#[test]
fn unknown_backend_discriminator_is_rejected() {
    let mut net = TestNetwork::deploy();
    let user = net.user;
    let mut leg = net.leg(Backend::QuantumPortal);
    leg.backend = 3;
    let err = net.src.cross(TxContext::call(user), net.src_usdc, U256::from(AMOUNT), &leg).unwrap_err();
    assert_eq!(err, MultiswapError::UnsupportedBackend(3));
}
