//! Adapter readiness gate.
//!
//! Tracks the initialization state of every feed and derives a single ready
//! flag: ready holds exactly when every required feed has applied a full
//! snapshot. Callbacks and watch subscribers are notified only when the flag
//! flips, never on transitions that leave it unchanged.
//!
//! Evaluation runs synchronously on the caller, which is the stream loop for
//! feed transitions. Callbacks run after the internal lock is released, so a
//! callback may query the gate, but must not register further callbacks.

use dealer_core::{Feed, FeedInitState};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Readiness change callback, called with the new ready value.
pub type ReadyCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Feeds required by default.
pub const DEFAULT_REQUIRED_FEEDS: [Feed; 2] = [Feed::Positions, Feed::Balances];

#[derive(Debug)]
struct GateState {
    feeds: BTreeMap<Feed, FeedInitState>,
    ready: bool,
}

/// Readiness gate over a configurable set of required feeds.
pub struct ReadinessGate {
    required: BTreeSet<Feed>,
    state: Mutex<GateState>,
    callbacks: RwLock<Vec<ReadyCallback>>,
    tx: watch::Sender<bool>,
}

impl ReadinessGate {
    /// Create a gate requiring the given feeds.
    pub fn new(required: impl IntoIterator<Item = Feed>) -> Self {
        let required: BTreeSet<Feed> = required.into_iter().collect();
        let feeds = Feed::ALL
            .iter()
            .map(|f| (*f, FeedInitState::Uninitialized))
            .collect();
        let ready = required.is_empty();
        let (tx, _rx) = watch::channel(ready);

        Self {
            required,
            state: Mutex::new(GateState { feeds, ready }),
            callbacks: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Required feed set.
    pub fn required_feeds(&self) -> Vec<Feed> {
        self.required.iter().copied().collect()
    }

    pub fn is_required(&self, feed: Feed) -> bool {
        self.required.contains(&feed)
    }

    /// Record that a message arrived for `feed`. Moves an uninitialized feed
    /// to `Snapshotting`; never initializes it.
    pub fn note_feed_message(&self, feed: Feed) {
        let mut state = self.state.lock();
        let entry = state.feeds.entry(feed).or_default();
        if *entry == FeedInitState::Uninitialized {
            *entry = FeedInitState::Snapshotting;
            debug!(%feed, "Feed snapshotting");
        }
    }

    /// Record that a full snapshot was applied for `feed`.
    pub fn mark_feed_initialized(&self, feed: Feed) {
        let changed = {
            let mut state = self.state.lock();
            let prev = state.feeds.insert(feed, FeedInitState::Initialized);
            if prev != Some(FeedInitState::Initialized) {
                debug!(%feed, "Feed initialized");
            }
            self.evaluate(&mut state)
        };
        if let Some(ready) = changed {
            self.notify(ready);
        }
    }

    /// Current ready flag.
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    pub fn feed_state(&self, feed: Feed) -> FeedInitState {
        self.state
            .lock()
            .feeds
            .get(&feed)
            .copied()
            .unwrap_or_default()
    }

    /// State of every known feed, ordered by feed.
    pub fn feed_states(&self) -> Vec<(Feed, FeedInitState)> {
        self.state
            .lock()
            .feeds
            .iter()
            .map(|(f, s)| (*f, *s))
            .collect()
    }

    /// Register a callback fired on every readiness edge.
    pub fn on_ready_changed<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Box::new(callback));
    }

    /// Subscribe to readiness changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Wait until the gate is ready.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() {
            return;
        }
        loop {
            if rx.changed().await.is_err() {
                warn!("ReadinessGate sender dropped while waiting");
                return;
            }
            if *rx.borrow() {
                return;
            }
        }
    }

    /// Return every feed to `Uninitialized`.
    ///
    /// Fires a falling edge when the gate was ready.
    pub fn reset(&self) {
        let changed = {
            let mut state = self.state.lock();
            for value in state.feeds.values_mut() {
                *value = FeedInitState::Uninitialized;
            }
            self.evaluate(&mut state)
        };
        debug!("ReadinessGate reset - all feeds uninitialized");
        if let Some(ready) = changed {
            self.notify(ready);
        }
    }

    /// Recompute the ready flag. Returns the new value when it flipped.
    fn evaluate(&self, state: &mut GateState) -> Option<bool> {
        let ready = self
            .required
            .iter()
            .all(|f| state.feeds.get(f) == Some(&FeedInitState::Initialized));
        if ready == state.ready {
            return None;
        }
        state.ready = ready;
        Some(ready)
    }

    fn notify(&self, ready: bool) {
        if ready {
            info!(required = ?self.required, "READY: all required feeds initialized");
        } else {
            info!("NOT READY: required feeds lost initialization");
        }
        self.tx.send_replace(ready);
        for callback in self.callbacks.read().iter() {
            callback(ready);
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_FEEDS)
    }
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("required", &self.required)
            .field("ready", &self.is_ready())
            .field("callbacks", &self.callbacks.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_gate() -> (ReadinessGate, Arc<AtomicUsize>, Arc<Mutex<Vec<bool>>>) {
        let gate = ReadinessGate::default();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let c = count.clone();
        let s = seen.clone();
        gate.on_ready_changed(move |ready| {
            c.fetch_add(1, Ordering::SeqCst);
            s.lock().push(ready);
        });
        (gate, count, seen)
    }

    #[test]
    fn test_new_not_ready() {
        let gate = ReadinessGate::default();
        assert!(!gate.is_ready());
        assert_eq!(gate.required_feeds(), vec![Feed::Positions, Feed::Balances]);
        assert_eq!(gate.feed_state(Feed::Positions), FeedInitState::Uninitialized);
    }

    #[test]
    fn test_ready_requires_every_required_feed() {
        let gate = ReadinessGate::default();
        gate.mark_feed_initialized(Feed::Positions);
        assert!(!gate.is_ready());
        gate.mark_feed_initialized(Feed::Balances);
        assert!(gate.is_ready());
    }

    #[test]
    fn test_optional_feed_does_not_affect_readiness() {
        let gate = ReadinessGate::default();
        gate.mark_feed_initialized(Feed::OrderBook);
        gate.mark_feed_initialized(Feed::Quotes);
        assert!(!gate.is_ready());
    }

    #[test]
    fn test_message_moves_to_snapshotting_only() {
        let gate = ReadinessGate::default();
        gate.note_feed_message(Feed::Balances);
        assert_eq!(gate.feed_state(Feed::Balances), FeedInitState::Snapshotting);

        gate.mark_feed_initialized(Feed::Balances);
        gate.note_feed_message(Feed::Balances);
        assert_eq!(gate.feed_state(Feed::Balances), FeedInitState::Initialized);
    }

    #[test]
    fn test_callback_fires_exactly_once_per_edge() {
        let (gate, count, seen) = counting_gate();

        gate.mark_feed_initialized(Feed::Positions);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        gate.mark_feed_initialized(Feed::Balances);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Repeated transitions with no edge do not fire
        gate.mark_feed_initialized(Feed::Balances);
        gate.mark_feed_initialized(Feed::Positions);
        gate.note_feed_message(Feed::Positions);
        gate.mark_feed_initialized(Feed::OrderBook);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        gate.reset();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[test]
    fn test_reset_when_not_ready_does_not_fire() {
        let (gate, count, _seen) = counting_gate();
        gate.mark_feed_initialized(Feed::Positions);
        gate.reset();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(gate.feed_state(Feed::Positions), FeedInitState::Uninitialized);
    }

    #[test]
    fn test_callback_may_query_gate() {
        let gate = Arc::new(ReadinessGate::default());
        let observed = Arc::new(Mutex::new(None));
        let g = Arc::downgrade(&gate);
        let o = observed.clone();
        gate.on_ready_changed(move |_| {
            if let Some(g) = g.upgrade() {
                *o.lock() = Some(g.is_ready());
            }
        });
        gate.mark_feed_initialized(Feed::Positions);
        gate.mark_feed_initialized(Feed::Balances);
        assert_eq!(*observed.lock(), Some(true));
    }

    #[test]
    fn test_custom_required_set() {
        let gate = ReadinessGate::new([Feed::Positions, Feed::Balances, Feed::OrderBook]);
        gate.mark_feed_initialized(Feed::Positions);
        gate.mark_feed_initialized(Feed::Balances);
        assert!(!gate.is_ready());
        gate.mark_feed_initialized(Feed::OrderBook);
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn test_watch_channel_notifications() {
        let gate = ReadinessGate::default();
        let mut rx = gate.subscribe();
        assert!(!*rx.borrow());

        gate.mark_feed_initialized(Feed::Positions);
        gate.mark_feed_initialized(Feed::Balances);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());

        gate.reset();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn test_wait_until_ready() {
        let gate = Arc::new(ReadinessGate::default());
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_until_ready().await })
        };
        tokio::task::yield_now().await;
        gate.mark_feed_initialized(Feed::Balances);
        gate.mark_feed_initialized(Feed::Positions);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
