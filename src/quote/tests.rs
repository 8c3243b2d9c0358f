use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use rust_decimal::Decimal;

use super::*;
use crate::chain::ChainGateway;
use crate::config::ContractsConfig;
use crate::error::ClientError;
use crate::provider::ProviderError;
use crate::session::ConnectionManager;
use crate::testkit::{MockGateway, ready_manager};

fn contracts() -> ContractsConfig {
    ContractsConfig {
        quoter: Some(Address::repeat_byte(0x9a)),
        ..ContractsConfig::default()
    }
}

fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

/// `quote` 的返回值：(amountOut, sqrtPriceX96After, tickAfter)。
fn quote_bytes(amount_out: U256) -> Bytes {
    let mut out = amount_out.to_be_bytes::<32>().to_vec();
    out.extend([0u8; 64]);
    Bytes::from(out)
}

fn desync() -> ProviderError {
    ProviderError::rpc(-32000, "eth_call failed: BlockOutOfRange")
}

async fn engine(gateway: &Arc<MockGateway>) -> (Arc<ConnectionManager>, Arc<QuoteEngine>) {
    let (manager, view) = ready_manager().await;
    let engine = QuoteEngine::new(
        gateway.clone() as Arc<dyn ChainGateway>,
        view,
        &contracts(),
        QuoteSettings::default(),
    );
    (manager, Arc::new(engine))
}

#[tokio::test(start_paused = true)]
async fn burst_of_requests_only_applies_the_last() {
    let gateway = MockGateway::new();
    gateway.push_simulation(Ok(quote_bytes(ether(15_000))));
    let (_manager, engine) = engine(&gateway).await;

    let mut handles = Vec::new();
    for amount in [1i64, 2, 3] {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .request_quote(QuoteDirection::Forward, Decimal::from(amount))
                .await
        }));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    assert_eq!(outcomes[0], QuoteOutcome::Superseded);
    assert_eq!(outcomes[1], QuoteOutcome::Superseded);
    assert_eq!(outcomes[2], QuoteOutcome::Quoted(Decimal::from(15_000)));
    assert_eq!(gateway.simulated().len(), 1);

    let display = engine.display();
    assert_eq!(display.input, Decimal::from(3));
    assert_eq!(display.amount1(), Decimal::from(15_000));
    assert!(!display.busy);
}

#[tokio::test(start_paused = true)]
async fn stale_in_flight_result_is_discarded() {
    let gateway = MockGateway::new();
    gateway.set_simulate_delay(Duration::from_secs(1));
    gateway.push_simulation(Ok(quote_bytes(ether(5_000))));
    gateway.push_simulation(Ok(quote_bytes(ether(10_000))));
    let (_manager, engine) = engine(&gateway).await;

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.request_quote(QuoteDirection::Forward, Decimal::ONE).await }
    });
    // 第一次请求已过防抖，正在等待节点返回
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(engine.display().busy);

    let second = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .request_quote(QuoteDirection::Forward, Decimal::from(2))
                .await
        }
    });

    assert_eq!(first.await.unwrap(), QuoteOutcome::Superseded);
    assert_eq!(engine.display().output, Decimal::ZERO);

    assert_eq!(
        second.await.unwrap(),
        QuoteOutcome::Quoted(Decimal::from(10_000))
    );
    assert_eq!(engine.display().output, Decimal::from(10_000));
    assert_eq!(gateway.simulated().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn view_desynchronization_is_retried_with_backoff() {
    let gateway = MockGateway::new();
    gateway.push_simulation(Err(desync()));
    gateway.push_simulation(Err(desync()));
    gateway.push_simulation(Ok(quote_bytes(ether(2_000))));
    let (_manager, engine) = engine(&gateway).await;

    let started = tokio::time::Instant::now();
    let outcome = engine
        .request_quote(QuoteDirection::Forward, Decimal::ONE)
        .await;
    assert_eq!(outcome, QuoteOutcome::Quoted(Decimal::from(2_000)));
    assert_eq!(gateway.simulated().len(), 3);
    // 300ms 防抖 + 1000ms + 2000ms 退避
    assert!(started.elapsed() >= Duration::from_millis(3_300));
    assert!(engine.display().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn persistent_desynchronization_fails_and_resets_output() {
    let gateway = MockGateway::new();
    for _ in 0..4 {
        gateway.push_simulation(Err(desync()));
    }
    let (_manager, engine) = engine(&gateway).await;

    let outcome = engine
        .request_quote(QuoteDirection::Forward, Decimal::ONE)
        .await;
    assert!(matches!(
        outcome,
        QuoteOutcome::Failed(ClientError::ViewDesynchronization(_))
    ));
    assert_eq!(gateway.simulated().len(), 4);

    let display = engine.display();
    assert_eq!(display.output, Decimal::ZERO);
    assert!(!display.busy);
    assert!(matches!(
        display.error,
        Some(ClientError::ViewDesynchronization(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn other_failures_are_not_retried() {
    let gateway = MockGateway::new();
    gateway.push_simulation(Err(ProviderError::rpc(3, "execution reverted")));
    let (_manager, engine) = engine(&gateway).await;

    let outcome = engine
        .request_quote(QuoteDirection::Forward, Decimal::ONE)
        .await;
    assert!(matches!(
        outcome,
        QuoteOutcome::Failed(ClientError::ActionFailed(_))
    ));
    assert_eq!(gateway.simulated().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_input_never_reaches_the_node() {
    let gateway = MockGateway::new();
    let (_manager, engine) = engine(&gateway).await;

    let outcome = engine.set_input(Decimal::ZERO).await;
    assert_eq!(outcome, QuoteOutcome::NoQuote);
    assert!(gateway.simulated().is_empty());
    assert!(!engine.display().busy);
}

#[tokio::test(start_paused = true)]
async fn missing_quoter_is_reported() {
    let gateway = MockGateway::new();
    let (_manager, view) = ready_manager().await;
    let engine = QuoteEngine::new(
        gateway.clone() as Arc<dyn ChainGateway>,
        view,
        &ContractsConfig::default(),
        QuoteSettings::default(),
    );

    let outcome = engine.set_input(Decimal::ONE).await;
    assert_eq!(outcome, QuoteOutcome::Failed(ClientError::QuoterUnavailable));
    assert!(gateway.simulated().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disconnected_session_is_not_quoted() {
    let gateway = MockGateway::new();
    let (manager, engine) = engine(&gateway).await;
    manager.disconnect();

    let outcome = engine.set_input(Decimal::ONE).await;
    assert_eq!(outcome, QuoteOutcome::Failed(ClientError::NotConnected));
    assert!(gateway.simulated().is_empty());
}

#[tokio::test(start_paused = true)]
async fn toggle_swaps_sides_and_requotes_from_new_input() {
    let gateway = MockGateway::new();
    gateway.push_simulation(Ok(quote_bytes(ether(2_000))));
    gateway.push_simulation(Ok(quote_bytes(U256::from(990_000_000_000_000_000u64))));
    let (_manager, engine) = engine(&gateway).await;

    engine
        .request_quote(QuoteDirection::Forward, Decimal::ONE)
        .await;
    let display = engine.display();
    assert_eq!(display.amount0(), Decimal::ONE);
    assert_eq!(display.amount1(), Decimal::from(2_000));

    let mut updates = engine.subscribe();
    let outcome = engine.toggle_direction().await;
    assert_eq!(outcome, QuoteOutcome::Quoted(Decimal::new(99, 2)));

    let display = engine.display();
    assert_eq!(display.direction, QuoteDirection::Reverse);
    assert_eq!(display.input, Decimal::from(2_000));
    assert_eq!(display.amount1(), Decimal::from(2_000));
    assert_eq!(display.amount0(), Decimal::new(99, 2));
    assert!(updates.has_changed().unwrap());

    let simulated = gateway.simulated();
    assert_eq!(simulated.len(), 2);
    assert_eq!(
        simulated[1].data,
        Bytes::from(abi::quote_calldata(contracts().pool, ether(2_000), false))
    );
}

#[tokio::test(start_paused = true)]
async fn toggle_onto_zero_input_keeps_swapped_amounts() {
    let gateway = MockGateway::new();
    gateway.push_simulation(Ok(quote_bytes(U256::ZERO)));
    let (_manager, engine) = engine(&gateway).await;

    engine
        .request_quote(QuoteDirection::Forward, Decimal::from(5))
        .await;
    assert_eq!(engine.display().output, Decimal::ZERO);

    let outcome = engine.toggle_direction().await;
    assert_eq!(outcome, QuoteOutcome::NoQuote);

    let display = engine.display();
    assert_eq!(display.direction, QuoteDirection::Reverse);
    assert_eq!(display.input, Decimal::ZERO);
    assert_eq!(display.output, Decimal::from(5));
    assert!(!display.busy);
    assert_eq!(gateway.simulated().len(), 1);
}
