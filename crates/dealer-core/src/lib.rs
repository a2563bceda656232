//! Core domain types for the maker/taker dealer.
//!
//! This crate provides the building blocks shared by every other crate:
//! - `Price`: precision-safe price type
//! - `Side`, `BookSide`, `BookLevel`, `Bbo`: order and book primitives
//! - `PositionRecord`, `BalanceRecord`: account snapshots
//! - `Feed`, `FeedInitState`: readiness bookkeeping
//! - `RequestSigner`: HMAC-SHA256 request signing
//! - `Clock`: injectable time source

pub mod clock;
pub mod decimal;
pub mod error;
pub mod signer;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use signer::{Credentials, RequestSigner};
pub use types::{
    BalanceRecord, Bbo, BookLevel, BookSide, Feed, FeedInitState, PositionRecord, Side,
};
