//! Read-only book views
//!
//! Aggregated depth and top-of-book quotes, stamped with the sequence
//! they were taken at so consumers can order them against the event
//! stream.

use serde::{Deserialize, Serialize};
use types::ids::Symbol;
use types::numeric::{Price, Quantity};

/// One aggregated price level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: usize,
}

/// Aggregated depth for one symbol, best prices first on both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub symbol: Symbol,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
    /// Last sequence consumed when this view was taken.
    pub sequence: u64,
}

impl DepthSnapshot {
    pub fn from_sides(
        symbol: Symbol,
        bids: Vec<(Price, Quantity, usize)>,
        asks: Vec<(Price, Quantity, usize)>,
        sequence: u64,
    ) -> Self {
        let to_levels = |side: Vec<(Price, Quantity, usize)>| {
            side.into_iter()
                .map(|(price, quantity, order_count)| DepthLevel {
                    price,
                    quantity,
                    order_count,
                })
                .collect()
        };
        Self {
            symbol,
            bids: to_levels(bids),
            asks: to_levels(asks),
            sequence,
        }
    }
}

/// One side of the touch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Price,
    pub quantity: Quantity,
}

/// Best bid and ask for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub symbol: Symbol,
    pub bid: Option<Quote>,
    pub ask: Option<Quote>,
    pub sequence: u64,
}

impl TopOfBook {
    pub fn new(
        symbol: Symbol,
        bid: Option<(Price, Quantity)>,
        ask: Option<(Price, Quantity)>,
        sequence: u64,
    ) -> Self {
        let quote = |side: Option<(Price, Quantity)>| {
            side.map(|(price, quantity)| Quote { price, quantity })
        };
        Self {
            symbol,
            bid: quote(bid),
            ask: quote(ask),
            sequence,
        }
    }

    /// Quoted spread; None unless both sides are present
    pub fn spread(&self) -> Option<rust_decimal::Decimal> {
        match (&self.bid, &self.ask) {
            (Some(bid), Some(ask)) => Some(ask.price.as_decimal() - bid.price.as_decimal()),
            _ => None,
        }
    }
}
