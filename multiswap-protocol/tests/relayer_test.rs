use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, U256};
use multiswap_protocol::{
    bridge::Backend,
    onchain::{ChainHandle, TxContext},
    router::BridgeLeg,
    simulation::{RelayOutcome, Relayer, RelayerConfig},
    test_utils::{TestNetwork, BASE},
    MultiswapError,
};

const AMOUNT: u64 = 100_000;
const BRIDGED: u64 = 99_900;

struct Deployed {
    src: ChainHandle,
    dst: ChainHandle,
    user: Address,
    owner: Address,
    recipient: Address,
    src_usdc: Address,
    dst_usdc: Address,
}

fn deploy() -> Deployed {
    let net = TestNetwork::deploy();
    Deployed {
        user: net.user,
        owner: net.owner,
        recipient: net.recipient,
        src_usdc: net.src_usdc,
        dst_usdc: net.dst_usdc,
        src: ChainHandle::new(net.src),
        dst: ChainHandle::new(net.dst),
    }
}

fn build_relayer(d: &Deployed, config: RelayerConfig) -> Relayer {
    Relayer::new(config)
        .with_chain(Arc::new(d.src.clone()))
        .with_chain(Arc::new(d.dst.clone()))
}

async fn cross(d: &Deployed, backend: Backend) {
    let leg = BridgeLeg {
        recipient: d.recipient,
        dst_chain_id: BASE,
        backend: backend.as_u8(),
        ..Default::default()
    };
    let mut src = d.src.lock().await;
    let value = src.quote_native_fee(backend, leg.dst_chain_id, U256::from(AMOUNT), None).unwrap();
    src.cross(TxContext::with_value(d.user, value), d.src_usdc, U256::from(AMOUNT), &leg)
        .unwrap();
}

#[tokio::test]
async fn flush_delivers_every_backend() {
    let d = deploy();
    for backend in [Backend::QuantumPortal, Backend::Ccip, Backend::Stargate] {
        cross(&d, backend).await;
    }
    let relayer = build_relayer(&d, RelayerConfig::instant());

    let outcomes = relayer.flush().await;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| matches!(o, RelayOutcome::Delivered(_))));
    assert_eq!(
        d.dst.lock().await.balance_of(d.dst_usdc, d.recipient),
        U256::from(3 * BRIDGED)
    );

    let stats = relayer.stats().await;
    assert_eq!(stats.picked_up, 3);
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(relayer.in_flight().await, 0);
}

#[tokio::test]
async fn dropped_packets_never_arrive() {
    let d = deploy();
    cross(&d, Backend::QuantumPortal).await;
    let config = RelayerConfig { drop_rate: 1.0, ..RelayerConfig::instant() };
    let relayer = build_relayer(&d, config);

    assert!(relayer.flush().await.is_empty());
    assert_eq!(relayer.stats().await.dropped, 1);
    assert!(d.dst.lock().await.balance_of(d.dst_usdc, d.recipient).is_zero());
}

#[tokio::test]
async fn rejected_packet_is_parked_until_redelivered() {
    let d = deploy();
    {
        let mut dst = d.dst.lock().await;
        dst.remove_liquidity(d.owner, d.dst_usdc, U256::from(TestNetwork::POOL_LIQUIDITY), d.owner)
            .unwrap();
    }
    cross(&d, Backend::QuantumPortal).await;
    let relayer = build_relayer(&d, RelayerConfig::instant());

    let outcomes = relayer.flush().await;
    assert!(matches!(
        outcomes.as_slice(),
        [RelayOutcome::Failed(f)] if matches!(f.error, MultiswapError::InsufficientLiquidity { .. })
    ));
    let parked = relayer.failed_deliveries().await;
    assert_eq!(parked.len(), 1);
    assert_eq!(relayer.stats().await.failed, 1);

    {
        let mut dst = d.dst.lock().await;
        let pool = dst.pool().address;
        dst.approve(d.owner, d.dst_usdc, pool, U256::from(TestNetwork::POOL_LIQUIDITY));
        dst.add_liquidity(d.owner, d.dst_usdc, U256::from(TestNetwork::POOL_LIQUIDITY))
            .unwrap();
    }
    let settled = relayer.redeliver(&parked[0].packet).await.unwrap();
    assert_eq!(settled.amount, U256::from(BRIDGED));

    let err = relayer.redeliver(&parked[0].packet).await.unwrap_err();
    assert_eq!(err, MultiswapError::DuplicateMessage(parked[0].packet.message_id));
}

#[tokio::test]
async fn delayed_packets_wait_in_flight() {
    let d = deploy();
    cross(&d, Backend::Ccip).await;
    let config = RelayerConfig {
        min_delivery_delay: Duration::from_millis(10),
        max_delivery_delay: Duration::from_millis(20),
        ..RelayerConfig::instant()
    };
    let relayer = build_relayer(&d, config);

    assert!(relayer.relay_once().await.is_empty());
    assert_eq!(relayer.in_flight().await, 1);

    let outcomes = relayer.flush().await;
    assert_eq!(outcomes.len(), 1);
    let latency = relayer.stats().await.average_latency().unwrap();
    assert!(latency >= Duration::from_millis(10));
}

#[tokio::test]
async fn background_loop_relays_new_traffic() {
    let d = deploy();
    let relayer = Arc::new(build_relayer(&d, RelayerConfig::instant()));
    let handle = relayer.clone().spawn();

    cross(&d, Backend::QuantumPortal).await;

    let mut delivered = false;
    for _ in 0..200 {
        if !d.dst.lock().await.balance_of(d.dst_usdc, d.recipient).is_zero() {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    handle.abort();

    assert!(delivered);
    assert_eq!(relayer.stats().await.picked_up, 1);
}

#[tokio::test]
async fn unknown_destination_is_a_failure() {
    let d = deploy();
    cross(&d, Backend::QuantumPortal).await;
    // Only the source chain is reachable
    let relayer = Relayer::new(RelayerConfig::instant()).with_chain(Arc::new(d.src.clone()));

    let outcomes = relayer.flush().await;
    assert!(matches!(
        outcomes.as_slice(),
        [RelayOutcome::Failed(f)] if f.error == MultiswapError::UnknownChain(BASE)
    ));
}
