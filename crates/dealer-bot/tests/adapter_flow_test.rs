//! End-to-end adapter tests: mock venue stream in, mock order sender out.

mod common;

use common::mock_venue::MockVenueServer;
use dealer_bot::{Adapter, AppConfig, AppError, Supervisor, VenueConfig};
use dealer_core::{ManualClock, Price, Side};
use dealer_executor::{ExecutionError, ExecutionOutcome, MockOrderSender};
use dealer_ws::ConnectionState;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const API_KEY: &str = "LAqUlngMIQkIUjXMUreyu3qn";
const SECRET: &str = "chNOOS4KvNXR_Xq4k4c9qsfoKWvnDecLATCRlcBwyKDYnWgO";

const POSITION_PARTIAL: &str = r#"{"table":"position","action":"partial","data":[{"account":1,"symbol":"XBTUSD","currency":"XBt","currentQty":-200,"avgEntryPrice":50100.0}]}"#;
const MARGIN_PARTIAL: &str = r#"{"table":"margin","action":"partial","data":[{"account":1,"currency":"XBt","marginBalance":200000000,"availableMargin":150000000}]}"#;
const QUOTE_PARTIAL: &str = r#"{"table":"quote","action":"partial","data":[{"symbol":"XBTUSD","bidPrice":50000.0,"askPrice":50000.5}]}"#;

fn venue(url: String) -> VenueConfig {
    let mut config = AppConfig::from_toml(&format!(
        r#"
[venue]
api_key = "{API_KEY}"
api_secret = "{SECRET}"
product = "XBTUSD"
collateral_pct = 10
ws_url = "{url}"
"#
    ))
    .unwrap();
    config.venue.rest_url = Some("http://127.0.0.1:1".to_string());
    config.venue
}

fn adapter(url: String, token: CancellationToken) -> (Arc<Adapter>, Arc<MockOrderSender>) {
    let sender = Arc::new(MockOrderSender::new());
    let adapter = Adapter::with_parts(
        venue(url),
        token,
        sender.clone(),
        Arc::new(ManualClock::from_secs(1_518_064_236)),
    );
    (Arc::new(adapter), sender)
}

async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_partials_ready_then_hedge_then_failure() {
    let server = MockVenueServer::start().await;
    let token = CancellationToken::new();
    let (adapter, sender) = adapter(server.url(), token.clone());

    let runner = adapter.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    // authKey + five subscriptions
    let msgs = server.wait_for_messages(6, Duration::from_secs(2)).await;
    assert_eq!(msgs.len(), 6);
    assert!(msgs[0].contains(r#""op":"authKey""#));
    assert!(!adapter.is_ready());
    assert_eq!(adapter.net_exposure(), None);

    server.send_text(POSITION_PARTIAL);
    server.send_text(QUOTE_PARTIAL);
    assert!(wait_until(|| adapter.bbo().bid.is_some()).await);
    assert!(!adapter.is_ready());
    server.send_text(MARGIN_PARTIAL);
    assert!(wait_until(|| adapter.is_ready()).await);

    assert_eq!(adapter.connection_state(), ConnectionState::Streaming);
    assert_eq!(adapter.net_exposure(), Some(-200));
    assert_eq!(adapter.open_price(), Some(Price::new(dec!(50100))));
    assert_eq!(
        adapter.status_summary(),
        "Connected | Price: 50000.25 | 1 position(s) | Balance loaded"
    );

    let capacity = adapter.open_capacity().unwrap();
    assert_eq!(capacity.free_balance, dec!(1.5));
    assert_eq!(capacity.collateral_per_unit, dec!(5000.025));

    let outcome = adapter.request_exposure_change(-150).await.unwrap();
    assert!(matches!(
        outcome,
        ExecutionOutcome::Submitted {
            side: Side::Sell,
            quantity: 100,
            ..
        }
    ));
    let sends = sender.get_sends();
    assert_eq!(sends.len(), 1);
    assert_eq!(
        sends[0].body,
        r#"{"ordType":"Limit","orderQty":100,"price":50000.0,"side":"Sell","symbol":"XBTUSD"}"#
    );
    // Positions move only when the venue reports them.
    assert_eq!(adapter.net_exposure(), Some(-200));

    server.close_client();
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(AppError::WebSocket(_))));
    assert_eq!(adapter.connection_state(), ConnectionState::Failed);
    assert!(!adapter.is_ready());
    assert_eq!(adapter.net_exposure(), None);

    let err = adapter.request_exposure_change(100).await.unwrap_err();
    assert!(matches!(err, ExecutionError::NotReady));
    assert_eq!(sender.call_count(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_ready_callback_fires_on_edges_only() {
    let server = MockVenueServer::start().await;
    let token = CancellationToken::new();
    let (adapter, _sender) = adapter(server.url(), token.clone());

    let edges = Arc::new(AtomicUsize::new(0));
    let seen = edges.clone();
    adapter.gate().on_ready_changed(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let runner = adapter.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    server.wait_for_messages(6, Duration::from_secs(2)).await;

    server.send_text(POSITION_PARTIAL);
    server.send_text(MARGIN_PARTIAL);
    assert!(wait_until(|| adapter.is_ready()).await);

    // A repeated snapshot keeps the gate ready without a new edge.
    server.send_text(POSITION_PARTIAL);
    server.send_text(
        r#"{"table":"position","action":"update","data":[{"account":1,"symbol":"XBTUSD","currentQty":0}]}"#,
    );
    assert!(wait_until(|| adapter.net_exposure() == Some(0)).await);
    assert_eq!(edges.load(Ordering::SeqCst), 1);

    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(adapter.connection_state(), ConnectionState::Disconnected);
    // Stopping resets readiness: one falling edge.
    assert_eq!(edges.load(Ordering::SeqCst), 2);

    server.shutdown().await;
}

#[tokio::test]
async fn test_garbage_and_venue_errors_do_not_stop_stream() {
    let server = MockVenueServer::start().await;
    let token = CancellationToken::new();
    let (adapter, _sender) = adapter(server.url(), token.clone());

    let runner = adapter.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    server.wait_for_messages(6, Duration::from_secs(2)).await;

    server.send_text("not json");
    server.send_text(r#"{"error":"Signature not valid.","status":401}"#);
    server.send_text(r#"{"table":"position","action":"partial","data":[{"symbol":"XBTUSD","currentQty":"abc"}]}"#);
    server.send_text(MARGIN_PARTIAL);

    assert!(wait_until(|| adapter.decode_error_count() == 1).await);
    assert!(wait_until(|| adapter.balance_report().to_string().contains("[XBT]")).await);
    assert_eq!(adapter.connection_state(), ConnectionState::Streaming);
    // The malformed position snapshot never initialized the feed.
    assert!(!adapter.is_ready());

    token.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_switch_off_stops_without_restart() {
    let server = MockVenueServer::start().await;
    let mut config = AppConfig::from_toml(
        "[venue]\nproduct = \"XBTUSD\"\ncollateral_pct = 10\n",
    )
    .unwrap();
    config.venue.ws_url = Some(server.url());

    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let (switch_tx, switch_rx) = watch::channel(true);
    let shutdown = CancellationToken::new();
    let supervisor = Supervisor::with_factory(
        config,
        switch_rx,
        shutdown.clone(),
        Box::new(move |venue: &VenueConfig, token: CancellationToken| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Adapter::with_parts(
                venue.clone(),
                token,
                Arc::new(MockOrderSender::new()),
                Arc::new(ManualClock::from_secs(0)),
            ))
        }),
    );
    let adapters = supervisor.handle();
    let task = tokio::spawn(supervisor.run());

    // No credentials: five subscriptions, no authKey.
    server.wait_for_messages(5, Duration::from_secs(2)).await;
    assert!(wait_until(|| adapters
        .current()
        .map(|a| a.connection_state() == ConnectionState::Streaming)
        .unwrap_or(false))
    .await);

    switch_tx.send(false).unwrap();
    assert!(wait_until(|| adapters.current().is_none()).await);
    assert_eq!(adapters.status_summary(), "stopped");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    switch_tx.send(true).unwrap();
    assert!(wait_until(|| builds.load(Ordering::SeqCst) == 2).await);
    assert!(wait_until(|| adapters.current().is_some()).await);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(server.connection_count().await, 2);
    server.shutdown().await;
}
