//! Fill execution logic
//!
//! Validates a located match and produces the immutable fill record.

use thiserror::Error;
use types::fill::Fill;
use types::ids::{FillId, OrderId, OwnerId, Symbol};
use types::numeric::{Price, Quantity};
use types::order::Side;
use uuid::Uuid;

/// Fill execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// Self-trade prevention triggered
    #[error("Self-trade: maker and taker share an owner")]
    SelfTrade,
    /// Invalid quantity (zero)
    #[error("Invalid fill quantity")]
    InvalidQuantity,
}

/// Mint the deterministic id for the fill at `sequence`
///
/// Derived from the symbol and sequence so journal replay reproduces
/// byte-identical fills. The "fill:" prefix keeps the namespace
/// disjoint from event ids.
pub fn deterministic_fill_id(symbol: &Symbol, sequence: u64) -> FillId {
    let name = format!("fill:{}:{}", symbol, sequence);
    FillId::from_uuid(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
}

/// Execute a fill between a maker and a taker
///
/// `price` is the maker's resting price and `side` the taker's.
/// The self-trade check here is a final guard; matching is expected to
/// have skipped same-owner entries before ever calling this.
#[allow(clippy::too_many_arguments)]
pub fn execute_fill(
    sequence: u64,
    symbol: &Symbol,
    maker_order_id: OrderId,
    taker_order_id: OrderId,
    maker_owner_id: OwnerId,
    taker_owner_id: OwnerId,
    side: Side,
    price: Price,
    quantity: Quantity,
    timestamp: i64,
) -> Result<Fill, MatchError> {
    if maker_owner_id == taker_owner_id {
        return Err(MatchError::SelfTrade);
    }
    if quantity.is_zero() {
        return Err(MatchError::InvalidQuantity);
    }

    Ok(Fill::new(
        deterministic_fill_id(symbol, sequence),
        sequence,
        symbol.clone(),
        maker_order_id,
        taker_order_id,
        maker_owner_id,
        taker_owner_id,
        side,
        price,
        quantity,
        timestamp,
    ))
}
