//! Top-of-book tracking.
//!
//! Holds only the best bid and best ask for one instrument, not the full
//! book. Removing the level at the current best makes that side unknown until
//! the next snapshot, improving delta or quote; the tracker never searches for
//! the next-best level.

use dealer_core::{Bbo, BookLevel, BookSide, Price};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Best bid / best ask tracker for a single instrument.
#[derive(Debug, Clone)]
pub struct TopOfBookTracker {
    instrument: String,
    best_bid: Option<Price>,
    best_ask: Option<Price>,
}

impl TopOfBookTracker {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            best_bid: None,
            best_ask: None,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.best_bid
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.best_ask
    }

    pub fn bbo(&self) -> Bbo {
        Bbo {
            bid: self.best_bid,
            ask: self.best_ask,
        }
    }

    /// Replace both sides from a full snapshot.
    ///
    /// Best bid is the highest bid price, best ask the lowest ask price, among
    /// rows for the tracked instrument with a positive size. A side with no
    /// such rows becomes unknown.
    pub fn apply_snapshot(&mut self, levels: &[BookLevel]) {
        let mut bid: Option<Price> = None;
        let mut ask: Option<Price> = None;

        for level in levels.iter().filter(|l| self.tracks(l) && !l.is_removal()) {
            match level.side {
                BookSide::Bid => {
                    if bid.map_or(true, |b| level.price > b) {
                        bid = Some(level.price);
                    }
                }
                BookSide::Ask => {
                    if ask.map_or(true, |a| level.price < a) {
                        ask = Some(level.price);
                    }
                }
            }
        }

        self.best_bid = bid;
        self.best_ask = ask;
        debug!(
            instrument = %self.instrument,
            bid = ?self.best_bid,
            ask = ?self.best_ask,
            "Book snapshot applied"
        );
        self.check_crossed();
    }

    /// Apply incremental level changes in order.
    pub fn apply_delta(&mut self, levels: &[BookLevel]) {
        for level in levels {
            if self.tracks(level) {
                self.apply_level(level);
            }
        }
        self.check_crossed();
    }

    fn apply_level(&mut self, level: &BookLevel) {
        let best = match level.side {
            BookSide::Bid => &mut self.best_bid,
            BookSide::Ask => &mut self.best_ask,
        };

        if level.is_removal() {
            if *best == Some(level.price) {
                debug!(side = %level.side, price = %level.price, "Best level removed");
                *best = None;
            }
            return;
        }

        let improves = match (level.side, *best) {
            (_, None) => true,
            (BookSide::Bid, Some(current)) => level.price > current,
            (BookSide::Ask, Some(current)) => level.price < current,
        };
        if improves {
            *best = Some(level.price);
        }
    }

    /// Overwrite both sides from a quote when both prices are present and positive.
    ///
    /// Returns `true` when the quote was applied.
    pub fn apply_quote(&mut self, bid: Option<Price>, ask: Option<Price>) -> bool {
        match (bid, ask) {
            (Some(bid), Some(ask)) if bid.is_positive() && ask.is_positive() => {
                self.best_bid = Some(bid);
                self.best_ask = Some(ask);
                self.check_crossed();
                true
            }
            _ => false,
        }
    }

    /// Forget both sides.
    pub fn clear(&mut self) {
        self.best_bid = None;
        self.best_ask = None;
    }

    fn tracks(&self, level: &BookLevel) -> bool {
        level.instrument == self.instrument
    }

    fn check_crossed(&self) {
        if self.bbo().is_crossed() {
            warn!(
                instrument = %self.instrument,
                bid = ?self.best_bid,
                ask = ?self.best_ask,
                "Crossed book"
            );
        }
    }
}

/// Tracker shared between the stream loop and order execution.
///
/// Readers take a `Bbo` copy; the lock is never held across an await.
#[derive(Debug, Clone)]
pub struct SharedTopOfBook {
    inner: Arc<RwLock<TopOfBookTracker>>,
}

impl SharedTopOfBook {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TopOfBookTracker::new(instrument))),
        }
    }

    /// Copy of the current best bid and ask.
    pub fn bbo(&self) -> Bbo {
        self.inner.read().bbo()
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.inner.read().best_bid()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.inner.read().best_ask()
    }

    pub fn apply_snapshot(&self, levels: &[BookLevel]) {
        self.inner.write().apply_snapshot(levels);
    }

    pub fn apply_delta(&self, levels: &[BookLevel]) {
        self.inner.write().apply_delta(levels);
    }

    pub fn apply_quote(&self, bid: Option<Price>, ask: Option<Price>) -> bool {
        self.inner.write().apply_quote(bid, ask)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}
