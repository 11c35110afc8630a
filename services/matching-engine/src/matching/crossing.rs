//! Crossing detection logic
//!
//! Determines when an incoming order and a resting order can match
//! based on price compatibility.

use types::numeric::Price;
use types::order::Side;

/// Check if a bid and ask can match at given prices
///
/// For a buy order to match with a sell order:
/// - Buy price must be >= sell price
pub fn can_match(bid_price: Price, ask_price: Price) -> bool {
    bid_price >= ask_price
}

/// Check if an incoming order can match against a resting price
///
/// `incoming_limit` of None is a market order, which crosses any
/// resting price.
pub fn incoming_can_match(
    incoming_side: Side,
    incoming_limit: Option<Price>,
    resting_price: Price,
) -> bool {
    let Some(limit) = incoming_limit else {
        return true;
    };
    match incoming_side {
        Side::BUY => limit >= resting_price,  // Buy crosses sell if bid >= ask
        Side::SELL => limit <= resting_price, // Sell crosses buy if ask <= bid
    }
}
