//! Fill records produced by matching
//!
//! A fill is the immutable record of one match event between a resting
//! maker and an incoming taker. Settlement and fees are downstream
//! concerns; the engine only reports what crossed.

use crate::ids::{FillId, OrderId, OwnerId, Symbol};
use crate::numeric::{Price, Quantity};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One executed match between a maker and a taker
///
/// `price` is always the maker's resting price; price improvement favors
/// the resting side. `sequence` is the per-symbol monotonic counter
/// value consumed by this fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub fill_id: FillId,
    pub sequence: u64,
    pub symbol: Symbol,

    // Order references
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,

    // Owner references, for self-trade audit and settlement routing
    pub maker_owner_id: OwnerId,
    pub taker_owner_id: OwnerId,

    // Execution details (side is the taker's, the aggressor)
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,

    pub executed_at: i64, // Unix nanos
}

impl Fill {
    /// Create a new fill record
    ///
    /// The engine mints `fill_id` deterministically from the symbol and
    /// sequence, so journal replay reproduces identical fills.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fill_id: FillId,
        sequence: u64,
        symbol: Symbol,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        maker_owner_id: OwnerId,
        taker_owner_id: OwnerId,
        side: Side,
        price: Price,
        quantity: Quantity,
        executed_at: i64,
    ) -> Self {
        Self {
            fill_id,
            sequence,
            symbol,
            maker_order_id,
            taker_order_id,
            maker_owner_id,
            taker_owner_id,
            side,
            price,
            quantity,
            executed_at,
        }
    }

    /// Notional value (price × quantity)
    pub fn notional(&self) -> Decimal {
        self.quantity.as_decimal() * self.price.as_decimal()
    }

    /// Validate the self-trade invariant
    pub fn validate_no_self_trade(&self) -> bool {
        self.maker_owner_id != self.taker_owner_id
    }
}
