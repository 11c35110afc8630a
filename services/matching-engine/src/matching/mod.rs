//! Matching logic module
//!
//! Implements price-time priority matching: best price first, earliest
//! admission sequence first within a price, maker's price on every
//! fill.

pub mod crossing;
pub mod executor;

pub use crossing::{can_match, incoming_can_match};
pub use executor::{deterministic_fill_id, execute_fill, MatchError};

use types::errors::EngineError;
use types::fill::Fill;
use types::numeric::{Price, Quantity};
use types::order::{Order, Side};

use crate::book::OrderBook;
use crate::sequence::Sequencer;

/// One fill plus the maker-side bookkeeping the engine reports on
#[derive(Debug, Clone)]
pub struct MakerFill {
    pub fill: Fill,
    /// Sequence consumed for the maker's status event.
    pub maker_event_sequence: u64,
    pub maker_side: Side,
    pub maker_price: Price,
    /// Maker's cumulative filled quantity after this fill.
    pub maker_filled_quantity: Quantity,
    /// Maker's remaining quantity after this fill; zero means filled out.
    pub maker_remaining: Quantity,
}

impl MakerFill {
    pub fn maker_is_filled(&self) -> bool {
        self.maker_remaining.is_zero()
    }
}

/// Match an incoming order against the book until it exhausts its
/// quantity or the opposing side stops crossing
///
/// The taker is not yet tracked in the book, so maker records can be
/// mutated freely. Self-owned makers are skipped in place; each fill
/// strictly reduces the taker's remaining quantity, so the loop
/// terminates. Two sequences are consumed per fill: one for the fill
/// itself, one for the maker's status event.
pub fn match_incoming(
    book: &mut OrderBook,
    taker: &mut Order,
    sequencer: &mut Sequencer,
    timestamp: i64,
) -> Result<Vec<MakerFill>, EngineError> {
    let mut fills = Vec::new();

    while !taker.remaining_quantity.is_zero() {
        let Some((price, index)) = book.next_matchable(taker.side, taker.price, &taker.owner_id)
        else {
            break;
        };
        let Some(entry) = book.opposing_entry_at(taker.side, price, index) else {
            break;
        };

        let fill_quantity = taker.remaining_quantity.min(entry.remaining_quantity);
        let fill_sequence = sequencer.next_sequence();
        let fill = execute_fill(
            fill_sequence,
            book.symbol(),
            entry.order_id,
            taker.order_id,
            entry.owner_id,
            taker.owner_id,
            taker.side,
            price,
            fill_quantity,
            timestamp,
        )
        .map_err(|e| EngineError::System {
            message: format!("fill execution failed: {e}"),
        })?;

        let maker_remaining = book
            .reduce_opposing_at(taker.side, price, index, fill_quantity)
            .ok_or_else(|| EngineError::System {
                message: format!("maker entry vanished at {price}"),
            })?;

        let maker_event_sequence = sequencer.next_sequence();
        let maker = book
            .get_mut(&entry.order_id)
            .ok_or_else(|| EngineError::System {
                message: format!("maker order {} missing from map", entry.order_id),
            })?;
        maker.apply_fill(fill_quantity, timestamp)?;
        debug_assert_eq!(maker.remaining_quantity, maker_remaining);
        let maker_filled_quantity = maker.filled_quantity;

        taker.apply_fill(fill_quantity, timestamp)?;

        fills.push(MakerFill {
            fill,
            maker_event_sequence,
            maker_side: taker.side.opposite(),
            maker_price: price,
            maker_filled_quantity,
            maker_remaining,
        });
    }

    Ok(fills)
}
