//! Venue data aggregation for the dealer.
//!
//! Turns decoded table rows into adapter state:
//! - `parser`: typed rows for order book, quote, instrument, position and margin tables
//! - `book`: top-of-book tracking from snapshot, delta and quote streams
//! - `account`: position and balance tables plus the reference price

pub mod account;
pub mod book;
pub mod error;
pub mod parser;

pub use account::{AccountState, ReferenceSource};
pub use book::{SharedTopOfBook, TopOfBookTracker};
pub use error::{FeedError, FeedResult};
pub use parser::{
    normalize_currency, parse_book_levels, parse_instruments, parse_margins, parse_positions,
    parse_quotes, InstrumentUpdate, MarginUpdate, QuoteUpdate,
};
