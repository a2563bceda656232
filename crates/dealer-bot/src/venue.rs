//! Seam between the hedging policy and a concrete venue adapter.

use crate::adapter::{Adapter, OpenCapacity};
use dealer_executor::{BoxFuture, ExecutionOutcome, ExecutionResult};

/// What the dealer's hedging policy needs from a taker venue.
pub trait HedgeVenue: Send + Sync {
    /// Change exposure by `quantity` contracts (positive buys, negative sells).
    fn request_exposure_change(
        &self,
        quantity: i64,
    ) -> BoxFuture<'_, ExecutionResult<ExecutionOutcome>>;

    /// Net signed exposure, `None` until ready.
    fn net_exposure(&self) -> Option<i64>;

    fn open_capacity(&self) -> Option<OpenCapacity>;

    fn is_ready(&self) -> bool;
}

impl HedgeVenue for Adapter {
    fn request_exposure_change(
        &self,
        quantity: i64,
    ) -> BoxFuture<'_, ExecutionResult<ExecutionOutcome>> {
        Box::pin(Adapter::request_exposure_change(self, quantity))
    }

    fn net_exposure(&self) -> Option<i64> {
        Adapter::net_exposure(self)
    }

    fn open_capacity(&self) -> Option<OpenCapacity> {
        Adapter::open_capacity(self)
    }

    fn is_ready(&self) -> bool {
        Adapter::is_ready(self)
    }
}
