//! Common data types shared by the feed, executor and adapter crates.
//!
//! Contains order sides, book levels, the best bid/offer pair, the position
//! and balance records kept by the adapter, and the feed identifiers used by
//! the readiness gate.

use crate::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side as sent to the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Side for a signed quantity. Zero has no side.
    pub fn from_signed(quantity: i64) -> Option<Self> {
        match quantity {
            q if q > 0 => Some(Self::Buy),
            q if q < 0 => Some(Self::Sell),
            _ => None,
        }
    }

    /// Venue wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }

    /// The side of the book an order on this side executes against.
    pub fn opposing_book_side(&self) -> BookSide {
        match self {
            Self::Buy => BookSide::Ask,
            Self::Sell => BookSide::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookSide {
    Bid,
    Ask,
}

impl BookSide {
    /// Map the venue's order-book side string (`Buy`/`Sell`).
    pub fn from_venue(side: &str) -> Option<Self> {
        match side {
            "Buy" => Some(Self::Bid),
            "Sell" => Some(Self::Ask),
            _ => None,
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

/// A single order-book level event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLevel {
    /// Instrument symbol the level belongs to.
    pub instrument: String,
    pub side: BookSide,
    pub price: Price,
    /// Resting size. Zero means the level was removed.
    pub size: u64,
}

impl BookLevel {
    pub fn new(instrument: impl Into<String>, side: BookSide, price: Price, size: u64) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            price,
            size,
        }
    }

    /// True when this event removes the level.
    pub fn is_removal(&self) -> bool {
        self.size == 0
    }
}

/// Best bid and offer as currently known. Either side may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bbo {
    pub bid: Option<Price>,
    pub ask: Option<Price>,
}

impl Bbo {
    /// Price an order on `side` would execute at (the opposing touch).
    pub fn touch_for(&self, side: Side) -> Option<Price> {
        match side.opposing_book_side() {
            BookSide::Bid => self.bid,
            BookSide::Ask => self.ask,
        }
    }

    /// Mid price when both sides are known.
    pub fn mid(&self) -> Option<Price> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(Price::mid(bid, ask)),
            _ => None,
        }
    }

    /// True when both sides are known and bid >= ask.
    pub fn is_crossed(&self) -> bool {
        matches!((self.bid, self.ask), (Some(bid), Some(ask)) if bid >= ask)
    }
}

/// Position snapshot for one instrument on one account.
///
/// Replaced wholesale by every position row; optional fields stay `None`
/// when the venue did not send them, which is distinct from zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionRecord {
    pub instrument: String,
    pub account: i64,
    /// Signed contract quantity (positive = long).
    pub signed_quantity: i64,
    pub average_entry_price: Option<Price>,
    pub leverage: Option<Decimal>,
    pub liquidation_price: Option<Price>,
    pub collateral: Option<Decimal>,
    pub collateral_min: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
}

impl fmt::Display for PositionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let price = self
            .average_entry_price
            .map(|p| p.display_2dp())
            .unwrap_or_else(|| "N/A".to_string());
        let lev = self
            .leverage
            .map(|l| l.round_dp(2).to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let liq = self
            .liquidation_price
            .map(|p| p.display_2dp())
            .unwrap_or_else(|| "N/A".to_string());
        let col = self
            .collateral
            .map(|c| c.round_dp(2).to_string())
            .unwrap_or_else(|| "N/A".to_string());
        write!(
            f,
            "<id: {} -- vol: {}, price: {} -- lev: {}, liq: {}, col: {}>",
            self.instrument, self.signed_quantity, price, lev, liq, col
        )
    }
}

/// Balance for one currency, in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRecord {
    pub currency: String,
    pub total: Decimal,
    pub available: Decimal,
}

impl fmt::Display for BalanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<[{}] total: {}, free: {}>",
            self.currency,
            self.total.round_dp(8).normalize(),
            self.available.round_dp(8).normalize()
        )
    }
}

/// Logical data feeds tracked by the readiness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Positions,
    Balances,
    OrderBook,
    Quotes,
    Instrument,
}

impl Feed {
    pub const ALL: [Feed; 5] = [
        Feed::Positions,
        Feed::Balances,
        Feed::OrderBook,
        Feed::Quotes,
        Feed::Instrument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positions => "positions",
            Self::Balances => "balances",
            Self::OrderBook => "order_book",
            Self::Quotes => "quotes",
            Self::Instrument => "instrument",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Initialization state of a single feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FeedInitState {
    #[default]
    Uninitialized,
    /// At least one message seen, no full snapshot yet.
    Snapshotting,
    /// A full snapshot has been applied.
    Initialized,
}

impl fmt::Display for FeedInitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "UNINITIALIZED"),
            Self::Snapshotting => write!(f, "SNAPSHOTTING"),
            Self::Initialized => write!(f, "INITIALIZED"),
        }
    }
}
