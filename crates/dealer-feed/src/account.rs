//! Account state: positions, balances and the reference price.
//!
//! Position records are keyed by (instrument, account) and replaced wholesale
//! by every row. Balance records are keyed by normalized currency; a margin row
//! only overwrites the amounts it carries.
//!
//! Reference price ordering: the instrument feed's index price always wins. A
//! quote mid-price is only accepted while no reference price has ever been
//! set.

use crate::parser::{InstrumentUpdate, MarginUpdate};
use dashmap::DashMap;
use dealer_core::{BalanceRecord, PositionRecord, Price};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

/// Where the current reference price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    /// Venue index price.
    Index,
    /// Quote mid-price fallback.
    QuoteMid,
}

#[derive(Debug, Clone, Copy)]
struct ReferencePrice {
    price: Price,
    source: ReferenceSource,
}

/// Shared account tables for one adapter.
#[derive(Debug, Default)]
pub struct AccountState {
    positions: DashMap<(String, i64), PositionRecord>,
    balances: DashMap<String, BalanceRecord>,
    reference: RwLock<Option<ReferencePrice>>,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Positions
    // ------------------------------------------------------------------

    /// Store position records, replacing any previous record for the same key.
    pub fn apply_positions(&self, records: Vec<PositionRecord>) {
        for record in records {
            debug!(
                instrument = %record.instrument,
                account = record.account,
                qty = record.signed_quantity,
                "Position updated"
            );
            self.positions
                .insert((record.instrument.clone(), record.account), record);
        }
    }

    /// Sum of signed quantities across every record for `instrument`.
    pub fn net_exposure(&self, instrument: &str) -> i64 {
        self.positions
            .iter()
            .filter(|entry| entry.key().0 == instrument)
            .map(|entry| entry.value().signed_quantity)
            .sum()
    }

    /// Position records for one instrument, ordered by account.
    pub fn positions_for(&self, instrument: &str) -> Vec<PositionRecord> {
        let mut records: Vec<PositionRecord> = self
            .positions
            .iter()
            .filter(|entry| entry.key().0 == instrument)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| r.account);
        records
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    // ------------------------------------------------------------------
    // Balances
    // ------------------------------------------------------------------

    /// Merge normalized margin rows into the balance table.
    pub fn apply_margins(&self, updates: Vec<MarginUpdate>) {
        for update in updates {
            let mut entry = self
                .balances
                .entry(update.currency.clone())
                .or_insert_with(|| BalanceRecord {
                    currency: update.currency.clone(),
                    total: Decimal::ZERO,
                    available: Decimal::ZERO,
                });
            if let Some(total) = update.total {
                entry.total = total;
            }
            if let Some(available) = update.available {
                entry.available = available;
            }
            debug!(
                currency = %entry.currency,
                total = %entry.total,
                available = %entry.available,
                "Balance updated"
            );
        }
    }

    pub fn balance(&self, currency: &str) -> Option<BalanceRecord> {
        self.balances.get(currency).map(|b| b.value().clone())
    }

    /// Snapshot of all balances, ordered by currency.
    pub fn balances(&self) -> Vec<BalanceRecord> {
        let mut records: Vec<BalanceRecord> =
            self.balances.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| a.currency.cmp(&b.currency));
        records
    }

    pub fn has_balances(&self) -> bool {
        !self.balances.is_empty()
    }

    // ------------------------------------------------------------------
    // Reference price
    // ------------------------------------------------------------------

    /// Apply an instrument row. A positive index price always replaces the
    /// reference price. Returns `true` when the reference price changed.
    pub fn apply_instrument(&self, update: &InstrumentUpdate) -> bool {
        if let Some(last) = update.last_price {
            debug!(instrument = %update.instrument, last = %last, "Last price");
        }
        match update.index_price {
            Some(index) if index.is_positive() => {
                let mut reference = self.reference.write();
                let changed = reference.map(|r| r.price) != Some(index);
                *reference = Some(ReferencePrice {
                    price: index,
                    source: ReferenceSource::Index,
                });
                debug!(index = %index, "Index price updated");
                changed
            }
            _ => false,
        }
    }

    /// Offer a quote mid-price. Accepted only while no reference price has
    /// ever been set. Returns `true` when accepted.
    pub fn offer_quote_mid(&self, mid: Price) -> bool {
        if !mid.is_positive() {
            return false;
        }
        let mut reference = self.reference.write();
        if reference.is_some() {
            return false;
        }
        *reference = Some(ReferencePrice {
            price: mid,
            source: ReferenceSource::QuoteMid,
        });
        debug!(mid = %mid, "Using quote mid-price as reference");
        true
    }

    pub fn reference_price(&self) -> Option<Price> {
        self.reference.read().map(|r| r.price)
    }

    pub fn reference_source(&self) -> Option<ReferenceSource> {
        self.reference.read().map(|r| r.source)
    }

    /// Drop every table. Used when the stream restarts.
    pub fn clear(&self) {
        self.positions.clear();
        self.balances.clear();
        *self.reference.write() = None;
    }
}
