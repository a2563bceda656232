//! Hedging venue adapter.
//!
//! Composes the stream lifecycle, readiness gate, top-of-book tracker,
//! account tables and execution engine for one venue session. A single task
//! drives the lifecycle and the frame dispatch loop from one `select!`, so
//! frame handlers never run concurrently. Queries read shared tables once
//! and never hold a lock across an await.
//!
//! An `Adapter` runs once. After the stream fails the supervisor builds a
//! fresh one; tables are never carried over between sessions.

use crate::config::VenueConfig;
use crate::error::{AppError, AppResult};
use crate::status::{BalanceReport, PositionsReport, StatusSnapshot};
use dealer_core::{Bbo, Clock, Feed, FeedInitState, Price, SystemClock};
use dealer_executor::{
    DynOrderSender, ExecutionEngine, ExecutionError, ExecutionOutcome, ExecutionResult,
    ReadinessGate, RestOrderSender,
};
use dealer_feed::{
    parse_book_levels, parse_instruments, parse_margins, parse_positions, parse_quotes,
    AccountState, FeedResult, ReferenceSource, SharedTopOfBook,
};
use dealer_telemetry::Metrics;
use dealer_ws::{Action, ConnectionLifecycle, ConnectionState, InboundMessage, Table, TableMessage};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Display name used in reports.
pub const VENUE_NAME: &str = "BitMEX";

/// Capacity of the lifecycle -> dispatch channel.
const MESSAGE_CHANNEL_CAPACITY: usize = 1024;

/// Gauge refresh period while running.
const METRICS_INTERVAL: Duration = Duration::from_secs(1);

/// How much more exposure the current free balance can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenCapacity {
    /// Free settlement balance.
    pub free_balance: Decimal,
    pub reference_price: Price,
    /// `collateral_pct / 100`.
    pub collateral_ratio: Decimal,
    /// Collateral needed per unit of exposure (`price * ratio`).
    pub collateral_per_unit: Decimal,
    /// `free_balance / collateral_per_unit`.
    pub max_quantity: Decimal,
}

/// Settlement cash summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashMetrics {
    pub total: Decimal,
    /// Always zero; the venue reports no pending transfers.
    pub pending: Decimal,
    pub ratio: Decimal,
}

/// One venue session.
pub struct Adapter {
    venue: VenueConfig,
    lifecycle: ConnectionLifecycle,
    message_rx: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
    gate: Arc<ReadinessGate>,
    book: SharedTopOfBook,
    account: Arc<AccountState>,
    engine: ExecutionEngine,
}

impl Adapter {
    /// Build an adapter that submits orders over REST.
    pub fn new(venue: VenueConfig, shutdown: CancellationToken) -> AppResult<Self> {
        let sender = RestOrderSender::new(venue.rest_url(), venue.request_timeout())?;
        Ok(Self::with_parts(
            venue,
            shutdown,
            Arc::new(sender),
            Arc::new(SystemClock),
        ))
    }

    /// Build an adapter around an explicit order sender and clock.
    pub fn with_parts(
        venue: VenueConfig,
        shutdown: CancellationToken,
        sender: DynOrderSender,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let lifecycle = ConnectionLifecycle::with_clock(
            venue.lifecycle_config(),
            message_tx,
            shutdown,
            clock.clone(),
        );

        let gate = Arc::new(ReadinessGate::new(venue.required_feeds.iter().copied()));
        gate.on_ready_changed(|ready| {
            Metrics::ready_set(ready);
            if ready {
                info!("Adapter ready");
            } else {
                warn!("Adapter no longer ready");
            }
        });

        let book = SharedTopOfBook::new(venue.product.clone());
        let account = Arc::new(AccountState::new());
        let engine = ExecutionEngine::with_clock(
            venue.execution_config(),
            venue.credentials().map(dealer_core::RequestSigner::new),
            gate.clone(),
            Arc::new(book.clone()),
            sender,
            clock,
        );

        Self {
            venue,
            lifecycle,
            message_rx: Mutex::new(Some(message_rx)),
            gate,
            book,
            account,
            engine,
        }
    }

    // ========================================================================
    // Stream loop
    // ========================================================================

    /// Run the session until the stream fails or shutdown is requested.
    ///
    /// Returns `Ok(())` only after cooperative shutdown. Readiness is reset
    /// on the way out, so queries report "not ready" once this returns.
    pub async fn run(&self) -> AppResult<()> {
        let mut message_rx = self.message_rx.lock().take().ok_or(AppError::AlreadyRan)?;

        info!(
            product = %self.venue.product,
            url = %self.venue.ws_url(),
            required = ?self.gate.required_feeds(),
            "Adapter starting"
        );

        let lifecycle = self.lifecycle.run();
        tokio::pin!(lifecycle);
        let mut metrics_interval = tokio::time::interval(METRICS_INTERVAL);

        let result = loop {
            tokio::select! {
                result = &mut lifecycle => break result,

                Some(msg) = message_rx.recv() => self.dispatch(msg),

                _ = metrics_interval.tick() => self.publish_metrics(),
            }
        };

        // Frames forwarded just before the stream ended.
        while let Ok(msg) = message_rx.try_recv() {
            self.dispatch(msg);
        }

        self.gate.reset();
        self.publish_metrics();

        match result {
            Ok(()) => {
                info!("Adapter stopped");
                Ok(())
            }
            Err(e) => Err(AppError::from(e)),
        }
    }

    /// Request cooperative shutdown of the stream.
    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
    }

    fn dispatch(&self, msg: InboundMessage) {
        let InboundMessage::Table(table) = msg else {
            trace!(kind = msg.kind(), "Control frame");
            return;
        };
        let name = table.table.as_str();
        Metrics::frame_received(name);

        if let Err(e) = self.handle_table(&table) {
            warn!(table = name, action = ?table.action, error = %e, "Frame handler failed");
            Metrics::handler_error(name);
        }
    }

    fn handle_table(&self, msg: &TableMessage) -> FeedResult<()> {
        let feed = match msg.table {
            Table::Position => Feed::Positions,
            Table::Margin => Feed::Balances,
            Table::OrderBookL2 => Feed::OrderBook,
            Table::Quote => Feed::Quotes,
            Table::Instrument => Feed::Instrument,
            Table::Unknown => {
                trace!("Ignoring unconsumed table");
                return Ok(());
            }
        };
        self.gate.note_feed_message(feed);

        match msg.table {
            Table::Position => self.on_positions(msg)?,
            Table::Margin => self.on_margins(msg)?,
            Table::OrderBookL2 => self.on_book(msg)?,
            Table::Quote => self.on_quotes(msg)?,
            Table::Instrument => self.on_instruments(msg)?,
            Table::Unknown => {}
        }

        if msg.action.is_snapshot() {
            self.gate.mark_feed_initialized(feed);
        }
        Ok(())
    }

    fn on_positions(&self, msg: &TableMessage) -> FeedResult<()> {
        if msg.action == Action::Delete {
            debug!(rows = msg.data.len(), "Ignoring position delete");
            return Ok(());
        }
        self.account.apply_positions(parse_positions(&msg.data)?);
        Ok(())
    }

    fn on_margins(&self, msg: &TableMessage) -> FeedResult<()> {
        if msg.action == Action::Delete {
            debug!(rows = msg.data.len(), "Ignoring margin delete");
            return Ok(());
        }
        self.account.apply_margins(parse_margins(&msg.data)?);
        Ok(())
    }

    fn on_book(&self, msg: &TableMessage) -> FeedResult<()> {
        let levels = parse_book_levels(&msg.data, msg.action)?;
        if msg.action.is_snapshot() {
            self.book.apply_snapshot(&levels);
        } else {
            self.book.apply_delta(&levels);
        }
        Ok(())
    }

    fn on_quotes(&self, msg: &TableMessage) -> FeedResult<()> {
        for quote in parse_quotes(&msg.data)? {
            if quote.instrument != self.venue.product {
                continue;
            }
            if !self.book.apply_quote(quote.bid, quote.ask) {
                continue;
            }
            if let Some(mid) = self.book.bbo().mid() {
                if self.account.offer_quote_mid(mid) {
                    info!(mid = %mid, "Reference price seeded from quote");
                }
            }
        }
        Ok(())
    }

    fn on_instruments(&self, msg: &TableMessage) -> FeedResult<()> {
        for update in parse_instruments(&msg.data)? {
            if update.instrument == self.venue.product {
                self.account.apply_instrument(&update);
            }
        }
        Ok(())
    }

    fn publish_metrics(&self) {
        Metrics::connection_state_set(&self.connection_state().to_string().to_lowercase());
        Metrics::decode_errors_set(self.lifecycle.decode_error_count());
        if let Some(exposure) = self.net_exposure() {
            Metrics::net_exposure_set(exposure);
        }
        if let Some(price) = self.account.reference_price().and_then(|p| p.to_f64()) {
            Metrics::reference_price_set(price);
        }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Change exposure by `quantity` contracts (positive buys, negative sells).
    pub async fn request_exposure_change(
        &self,
        quantity: i64,
    ) -> ExecutionResult<ExecutionOutcome> {
        let result = self.engine.request_exposure_change(quantity).await;
        let side = if quantity >= 0 { "buy" } else { "sell" };
        match &result {
            Ok(ExecutionOutcome::NoOp) => {}
            Ok(ExecutionOutcome::Submitted { .. }) => Metrics::order_result(side, "accepted"),
            Err(ExecutionError::NotReady) => Metrics::order_result(side, "not_ready"),
            Err(ExecutionError::PriceUnavailable { .. }) => {
                Metrics::order_result(side, "no_price")
            }
            Err(ExecutionError::Request { .. }) => Metrics::order_result(side, "rejected"),
            Err(_) => Metrics::order_result(side, "error"),
        }
        result
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn gate(&self) -> &Arc<ReadinessGate> {
        &self.gate
    }

    pub fn venue(&self) -> &VenueConfig {
        &self.venue
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    pub fn feed_states(&self) -> Vec<(Feed, FeedInitState)> {
        self.gate.feed_states()
    }

    pub fn decode_error_count(&self) -> u64 {
        self.lifecycle.decode_error_count()
    }

    /// Current best bid and ask.
    pub fn bbo(&self) -> Bbo {
        self.book.bbo()
    }

    pub fn reference_price(&self) -> Option<Price> {
        self.account.reference_price()
    }

    pub fn reference_source(&self) -> Option<ReferenceSource> {
        self.account.reference_source()
    }

    /// Net signed exposure on the configured instrument, `None` until ready.
    pub fn net_exposure(&self) -> Option<i64> {
        if !self.is_ready() {
            return None;
        }
        Some(self.account.net_exposure(&self.venue.product))
    }

    /// Exposure the free settlement balance can still carry.
    ///
    /// `None` when not ready, when the settlement balance is absent, or when
    /// no positive reference price is known.
    pub fn open_capacity(&self) -> Option<OpenCapacity> {
        if !self.is_ready() {
            return None;
        }
        let balance = self.account.balance(&self.venue.settlement_currency)?;
        let price = self.account.reference_price().filter(|p| p.is_positive())?;

        let collateral_ratio = self.venue.collateral_ratio();
        let collateral_per_unit = price.inner() * collateral_ratio;
        let max_quantity = balance.available.checked_div(collateral_per_unit)?;

        Some(OpenCapacity {
            free_balance: balance.available,
            reference_price: price,
            collateral_ratio,
            collateral_per_unit,
            max_quantity,
        })
    }

    /// Average entry price when exactly one position record exists.
    pub fn open_price(&self) -> Option<Price> {
        match self.account.positions_for(&self.venue.product).as_slice() {
            [only] => only.average_entry_price,
            _ => None,
        }
    }

    /// Unrealized PnL when exactly one position record exists and reports it.
    pub fn unrealized_pnl(&self) -> Option<Decimal> {
        self.positions_report().pnl()
    }

    /// `min(target, total settlement balance)`, `None` until ready.
    pub fn min_target_balance(&self, target: Decimal) -> Option<Decimal> {
        if !self.is_ready() {
            return None;
        }
        let balance = self.account.balance(&self.venue.settlement_currency)?;
        Some(target.min(balance.total))
    }

    pub fn cash_metrics(&self) -> Option<CashMetrics> {
        let balance = self.account.balance(&self.venue.settlement_currency)?;
        Some(CashMetrics {
            total: balance.total,
            pending: Decimal::ZERO,
            ratio: self.venue.collateral_ratio(),
        })
    }

    pub fn leverage(&self) -> Option<Decimal> {
        self.venue.leverage()
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            connected: self.connection_state().is_connected(),
            ready: self.is_ready(),
            balances: self.gate.feed_state(Feed::Balances),
            positions: self.gate.feed_state(Feed::Positions),
            reference_price: self.account.reference_price(),
            position_count: self.account.positions_for(&self.venue.product).len(),
            has_balances: self.account.has_balances(),
        }
    }

    /// One-line human-readable status. Pure read.
    pub fn status_summary(&self) -> String {
        self.status_snapshot().summary()
    }

    pub fn positions_report(&self) -> PositionsReport {
        PositionsReport {
            venue: VENUE_NAME.to_string(),
            product: self.venue.product.clone(),
            net_exposure: self.net_exposure(),
            positions: self.account.positions_for(&self.venue.product),
        }
    }

    pub fn balance_report(&self) -> BalanceReport {
        BalanceReport {
            venue: VENUE_NAME.to_string(),
            balances: self.account.balances(),
        }
    }
}
