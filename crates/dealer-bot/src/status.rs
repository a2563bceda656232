//! Human-readable adapter status and account reports.

use dealer_core::{BalanceRecord, FeedInitState, PositionRecord, Price};
use std::fmt;

/// Inputs for the one-line status summary, read once from the adapter.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub ready: bool,
    pub balances: FeedInitState,
    pub positions: FeedInitState,
    pub reference_price: Option<Price>,
    /// Position records for the configured instrument.
    pub position_count: usize,
    pub has_balances: bool,
}

impl StatusSnapshot {
    /// One-line status.
    ///
    /// While not ready this names the first thing being waited on. Once ready
    /// (or when only optional feeds are missing) it is a `" | "`-joined
    /// composite of connection, price, position and balance status.
    pub fn summary(&self) -> String {
        if !self.ready {
            if !self.connected {
                return "awaiting connection...".to_string();
            }
            if self.balances != FeedInitState::Initialized {
                return format!("awaiting balance snapshot... (state: {})", self.balances);
            }
            if self.positions != FeedInitState::Initialized {
                return format!(
                    "awaiting positions snapshot... (state: {})",
                    self.positions
                );
            }
        }

        let mut parts = Vec::with_capacity(4);
        parts.push(if self.connected { "Connected" } else { "Disconnected" }.to_string());
        parts.push(match self.reference_price {
            Some(p) if p.is_positive() => format!("Price: {}", p.display_2dp()),
            _ => "No price data".to_string(),
        });
        parts.push(if self.position_count > 0 {
            format!("{} position(s)", self.position_count)
        } else {
            "No positions".to_string()
        });
        parts.push(
            if self.has_balances {
                "Balance loaded"
            } else {
                "No balance data"
            }
            .to_string(),
        );
        parts.join(" | ")
    }
}

/// Position report for the dashboard.
#[derive(Debug, Clone)]
pub struct PositionsReport {
    pub venue: String,
    pub product: String,
    pub net_exposure: Option<i64>,
    /// Records for `product` only.
    pub positions: Vec<PositionRecord>,
}

impl PositionsReport {
    /// PnL of the single open record, if exactly one exists and reports it.
    pub fn pnl(&self) -> Option<rust_decimal::Decimal> {
        match self.positions.as_slice() {
            [only] => only.unrealized_pnl,
            _ => None,
        }
    }
}

impl fmt::Display for PositionsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exp = self
            .net_exposure
            .map(|e| e.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        writeln!(
            f,
            " ** {} -- exp: {} -- product: {}",
            self.venue, exp, self.product
        )?;
        if self.positions.is_empty() {
            return writeln!(f, "    N/A");
        }
        for pos in &self.positions {
            writeln!(f, " *  {pos}")?;
        }
        Ok(())
    }
}

/// Balance report for the dashboard.
#[derive(Debug, Clone)]
pub struct BalanceReport {
    pub venue: String,
    pub balances: Vec<BalanceRecord>,
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " +- {}:", self.venue)?;
        if self.balances.is_empty() {
            return write!(f, " +  <N/A>");
        }
        for balance in &self.balances {
            writeln!(f, " +    {balance}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            connected: true,
            ready: true,
            balances: FeedInitState::Initialized,
            positions: FeedInitState::Initialized,
            reference_price: Some(Price::new(dec!(50000))),
            position_count: 1,
            has_balances: true,
        }
    }

    #[test]
    fn test_ready_summary() {
        assert_eq!(
            snapshot().summary(),
            "Connected | Price: 50000.00 | 1 position(s) | Balance loaded"
        );
    }

    #[test]
    fn test_ready_summary_without_data() {
        let s = StatusSnapshot {
            reference_price: None,
            position_count: 0,
            has_balances: false,
            ..snapshot()
        };
        assert_eq!(
            s.summary(),
            "Connected | No price data | No positions | No balance data"
        );
    }

    #[test]
    fn test_waiting_messages_in_order() {
        let mut s = StatusSnapshot {
            connected: false,
            ready: false,
            balances: FeedInitState::Uninitialized,
            positions: FeedInitState::Uninitialized,
            ..snapshot()
        };
        assert_eq!(s.summary(), "awaiting connection...");

        s.connected = true;
        s.balances = FeedInitState::Snapshotting;
        assert_eq!(
            s.summary(),
            "awaiting balance snapshot... (state: SNAPSHOTTING)"
        );

        s.balances = FeedInitState::Initialized;
        assert_eq!(
            s.summary(),
            "awaiting positions snapshot... (state: UNINITIALIZED)"
        );
    }

    #[test]
    fn test_positions_report_format() {
        let report = PositionsReport {
            venue: "BitMEX".to_string(),
            product: "XBTUSD".to_string(),
            net_exposure: Some(-200),
            positions: vec![PositionRecord {
                instrument: "XBTUSD".to_string(),
                account: 1,
                signed_quantity: -200,
                average_entry_price: Some(Price::new(dec!(50000))),
                leverage: None,
                liquidation_price: None,
                collateral: None,
                collateral_min: None,
                unrealized_pnl: Some(dec!(0.0012)),
            }],
        };
        let text = report.to_string();
        assert!(text.starts_with(" ** BitMEX -- exp: -200 -- product: XBTUSD\n"));
        assert!(text.contains(" *  <id: XBTUSD -- vol: -200, price: 50000.00"));
        assert_eq!(report.pnl(), Some(dec!(0.0012)));
    }

    #[test]
    fn test_empty_reports() {
        let positions = PositionsReport {
            venue: "BitMEX".to_string(),
            product: "XBTUSD".to_string(),
            net_exposure: None,
            positions: vec![],
        };
        assert_eq!(
            positions.to_string(),
            " ** BitMEX -- exp: N/A -- product: XBTUSD\n    N/A\n"
        );
        assert_eq!(positions.pnl(), None);

        let balances = BalanceReport {
            venue: "BitMEX".to_string(),
            balances: vec![],
        };
        assert_eq!(balances.to_string(), " +- BitMEX:\n +  <N/A>");
    }
}
