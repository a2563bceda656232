//! Row parsing for venue tables.
//!
//! Every table row arrives as a JSON object inside a `TableMessage`. Rows are
//! deserialized into raw structs and converted into domain types. Numeric
//! fields the venue omits stay `None`; zero is kept as a real value.

use crate::error::{FeedError, FeedResult};
use dealer_core::{BookLevel, BookSide, PositionRecord, Price};
use dealer_ws::Action;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

// ============================================================================
// Raw rows
// ============================================================================

/// Raw `orderBookL2` row.
#[derive(Debug, Deserialize)]
pub struct RawBookRow {
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// Raw `quote` row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuoteRow {
    pub symbol: String,
    #[serde(default)]
    pub bid_price: Option<Decimal>,
    #[serde(default)]
    pub ask_price: Option<Decimal>,
}

/// Raw `instrument` row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstrumentRow {
    pub symbol: String,
    #[serde(default)]
    pub index_price: Option<Decimal>,
    #[serde(default)]
    pub last_price: Option<Decimal>,
}

/// Raw `position` row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPositionRow {
    pub symbol: String,
    #[serde(default)]
    pub account: Option<i64>,
    #[serde(default)]
    pub current_qty: Option<i64>,
    #[serde(default)]
    pub avg_entry_price: Option<Decimal>,
    #[serde(default)]
    pub leverage: Option<Decimal>,
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,
    #[serde(default, alias = "margin")]
    pub pos_margin: Option<Decimal>,
    #[serde(default)]
    pub init_margin: Option<Decimal>,
    #[serde(default)]
    pub unrealised_pnl: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Raw `margin` row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarginRow {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub margin_balance: Option<Decimal>,
    #[serde(default)]
    pub available_margin: Option<Decimal>,
}

// ============================================================================
// Parsed updates
// ============================================================================

/// Quote row for one instrument. Either side may be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteUpdate {
    pub instrument: String,
    pub bid: Option<Price>,
    pub ask: Option<Price>,
}

/// Instrument row carrying reference prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentUpdate {
    pub instrument: String,
    pub index_price: Option<Price>,
    pub last_price: Option<Price>,
}

/// Margin row normalized to base units. Absent amounts stay `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarginUpdate {
    pub currency: String,
    pub total: Option<Decimal>,
    pub available: Option<Decimal>,
}

fn parse_row<'a, T: Deserialize<'a>>(table: &str, row: &'a Value) -> FeedResult<T> {
    T::deserialize(row).map_err(|e| FeedError::ParseError(format!("{table} row: {e}")))
}

// ============================================================================
// Table parsers
// ============================================================================

/// Parse `orderBookL2` rows into level events.
///
/// `delete` rows are removals whatever their size field says. Rows without a
/// price or with an unknown side are skipped.
pub fn parse_book_levels(rows: &[Value], action: Action) -> FeedResult<Vec<BookLevel>> {
    let mut levels = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: RawBookRow = parse_row("orderBookL2", row)?;
        let Some(side) = BookSide::from_venue(&raw.side) else {
            debug!(side = %raw.side, "Skipping book row with unknown side");
            continue;
        };
        let Some(price) = raw.price else {
            trace!(symbol = %raw.symbol, "Skipping book row without price");
            continue;
        };
        let size = match action {
            Action::Delete => 0,
            _ => raw.size.unwrap_or(0),
        };
        levels.push(BookLevel::new(raw.symbol, side, Price::new(price), size));
    }
    Ok(levels)
}

/// Parse `quote` rows.
pub fn parse_quotes(rows: &[Value]) -> FeedResult<Vec<QuoteUpdate>> {
    rows.iter()
        .map(|row| {
            let raw: RawQuoteRow = parse_row("quote", row)?;
            Ok(QuoteUpdate {
                instrument: raw.symbol,
                bid: raw.bid_price.map(Price::new),
                ask: raw.ask_price.map(Price::new),
            })
        })
        .collect()
}

/// Parse `instrument` rows.
pub fn parse_instruments(rows: &[Value]) -> FeedResult<Vec<InstrumentUpdate>> {
    rows.iter()
        .map(|row| {
            let raw: RawInstrumentRow = parse_row("instrument", row)?;
            Ok(InstrumentUpdate {
                instrument: raw.symbol,
                index_price: raw.index_price.map(Price::new),
                last_price: raw.last_price.map(Price::new),
            })
        })
        .collect()
}

/// Parse `position` rows into full records.
///
/// Each row replaces the stored record for its key, so a row without
/// `currentQty` cannot form a record and is skipped. Collateral amounts are
/// normalized with the row's settlement currency.
pub fn parse_positions(rows: &[Value]) -> FeedResult<Vec<PositionRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: RawPositionRow = parse_row("position", row)?;
        // Update rows without a quantity would otherwise overwrite a known
        // exposure with zero.
        let Some(quantity) = raw.current_qty else {
            debug!(symbol = %raw.symbol, "Skipping position row without currentQty");
            continue;
        };
        let scale = raw
            .currency
            .as_deref()
            .map(|c| normalize_currency(c).1)
            .unwrap_or(Decimal::ONE);

        records.push(PositionRecord {
            instrument: raw.symbol,
            account: raw.account.unwrap_or_default(),
            signed_quantity: quantity,
            average_entry_price: raw.avg_entry_price.map(Price::new),
            leverage: raw.leverage,
            liquidation_price: raw.liquidation_price.map(Price::new),
            collateral: raw.pos_margin.map(|m| m * scale),
            collateral_min: raw.init_margin.map(|m| m * scale),
            unrealized_pnl: raw.unrealised_pnl.map(|p| p * scale),
        });
    }
    Ok(records)
}

/// Parse `margin` rows, normalizing smallest-unit currencies.
///
/// Rows without a currency are the venue's default `XBt` account.
pub fn parse_margins(rows: &[Value]) -> FeedResult<Vec<MarginUpdate>> {
    rows.iter()
        .map(|row| {
            let raw: RawMarginRow = parse_row("margin", row)?;
            let (currency, scale) = normalize_currency(raw.currency.as_deref().unwrap_or("XBt"));
            Ok(MarginUpdate {
                currency,
                total: raw.margin_balance.map(|v| v * scale),
                available: raw.available_margin.map(|v| v * scale),
            })
        })
        .collect()
}

/// Map a venue currency code to its base-unit code and the multiplier that
/// converts venue amounts into base units.
///
/// `XBt` (satoshi) -> `XBT` x 1e-8, `USDt` -> `USDT` x 1e-6, `GWei` -> `ETH`
/// x 1e-9. Other codes pass through with a multiplier of one.
pub fn normalize_currency(code: &str) -> (String, Decimal) {
    match code {
        "XBt" => ("XBT".to_string(), Decimal::new(1, 8)),
        "USDt" => ("USDT".to_string(), Decimal::new(1, 6)),
        "GWei" => ("ETH".to_string(), Decimal::new(1, 9)),
        other => (other.to_string(), Decimal::ONE),
    }
}
