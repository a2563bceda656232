//! Taker-venue exchange adapter for the maker/taker dealer.
//!
//! Orchestrates one hedging venue session:
//! - Stream lifecycle and frame dispatch
//! - Feed readiness gating
//! - Top-of-book and account state
//! - Exposure changes as signed limit orders at the touch
//! - Supervision with restart delay and a run switch

pub mod adapter;
pub mod config;
pub mod error;
pub mod status;
pub mod supervisor;
pub mod venue;

pub use adapter::{Adapter, CashMetrics, OpenCapacity, VENUE_NAME};
pub use config::{AppConfig, HedgerConfig, SupervisorConfig, VenueConfig};
pub use error::{AppError, AppResult};
pub use status::{BalanceReport, PositionsReport, StatusSnapshot};
pub use supervisor::{AdapterFactory, AdapterHandle, Supervisor};
pub use venue::HedgeVenue;
