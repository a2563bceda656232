//! Subscription topics.

use std::fmt;

/// Topics subscribed on connect, in subscription order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Position,
    /// Account-wide; takes no instrument filter.
    Margin,
    OrderBookL2,
    Quote,
    Instrument,
}

impl Topic {
    /// Default subscription set.
    pub const ALL: [Topic; 5] = [
        Topic::Position,
        Topic::Margin,
        Topic::OrderBookL2,
        Topic::Quote,
        Topic::Instrument,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Margin => "margin",
            Self::OrderBookL2 => "orderBookL2",
            Self::Quote => "quote",
            Self::Instrument => "instrument",
        }
    }

    /// Whether the topic is filtered by instrument.
    pub fn is_instrument_scoped(&self) -> bool {
        !matches!(self, Self::Margin)
    }

    /// Subscription argument, e.g. `orderBookL2:XBTUSD` or `margin`.
    pub fn arg(&self, instrument: &str) -> String {
        if self.is_instrument_scoped() {
            format!("{}:{}", self.name(), instrument)
        } else {
            self.name().to_string()
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
