//! Best bid/offer source for order pricing.

use dealer_core::Bbo;
use dealer_feed::SharedTopOfBook;

/// Provides a point-in-time copy of the best bid and offer.
pub trait BboProvider: Send + Sync {
    fn bbo(&self) -> Bbo;
}

impl BboProvider for SharedTopOfBook {
    fn bbo(&self) -> Bbo {
        SharedTopOfBook::bbo(self)
    }
}

/// Fixed quote, for tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticBbo(pub Bbo);

impl BboProvider for StaticBbo {
    fn bbo(&self) -> Bbo {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealer_core::{BookLevel, BookSide, Price};
    use rust_decimal_macros::dec;

    #[test]
    fn test_shared_book_provider_reflects_updates() {
        let book = SharedTopOfBook::new("XBTUSD");
        let provider: &dyn BboProvider = &book;
        assert_eq!(provider.bbo(), Bbo::default());

        book.apply_snapshot(&[
            BookLevel::new("XBTUSD", BookSide::Bid, Price::new(dec!(100)), 1),
            BookLevel::new("XBTUSD", BookSide::Ask, Price::new(dec!(101)), 1),
        ]);
        assert_eq!(provider.bbo().bid, Some(Price::new(dec!(100))));
        assert_eq!(provider.bbo().ask, Some(Price::new(dec!(101))));
    }
}
