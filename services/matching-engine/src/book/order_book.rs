//! Per-symbol order book
//!
//! Combines the bid and ask sides with the canonical order map. The
//! side books hold lightweight queue entries; the map holds the full
//! order records. Terminal records stay queryable until a snapshot
//! boundary prunes them; their history lives on in the journal and
//! the event stream.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use types::errors::BookError;
use types::ids::{OrderId, OwnerId, Symbol};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderStatus, Side};

use super::ask_book::AskBook;
use super::bid_book::BidBook;
use super::price_level::LevelEntry;

/// A single symbol's book: both sides plus the order map
///
/// An incoming taker is never in the map while it matches; it is
/// tracked once its outcome is decided. That keeps maker lookups free
/// of aliasing with the taker being mutated.
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: Symbol,
    bids: BidBook,
    asks: AskBook,
    /// Orders keyed by id. Terminal records stay until pruned.
    orders: HashMap<OrderId, Order>,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BidBook::new(),
            asks: AskBook::new(),
            orders: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Whether an order id is currently tracked (terminal included)
    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.orders.contains_key(order_id)
    }

    /// Whether a live (non-terminal) order holds this id
    ///
    /// Admission checks against this, never against terminal history,
    /// so the answer is the same whether or not a prune has run. That
    /// is what lets replay re-admit a journaled id reuse.
    pub fn has_open(&self, order_id: &OrderId) -> bool {
        self.orders
            .get(order_id)
            .map(|order| !order.status.is_terminal())
            .unwrap_or(false)
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub(crate) fn get_mut(&mut self, order_id: &OrderId) -> Option<&mut Order> {
        self.orders.get_mut(order_id)
    }

    /// Add an order to the map
    ///
    /// Fails while a live order holds the same id. A terminal record
    /// under the id gives way: it is never left indexed, so replacing
    /// it cannot orphan a side-book entry.
    pub fn track(&mut self, order: Order) -> Result<(), BookError> {
        match self.orders.entry(order.order_id) {
            Entry::Occupied(mut slot) => {
                if !slot.get().status.is_terminal() {
                    return Err(BookError::DuplicateOrderId {
                        order_id: order.order_id.to_string(),
                    });
                }
                slot.insert(order);
            }
            Entry::Vacant(slot) => {
                slot.insert(order);
            }
        }
        Ok(())
    }

    /// Index a tracked order into its side book
    pub fn index_resting(&mut self, order: &Order) -> Result<(), BookError> {
        let price = order.price.ok_or_else(|| BookError::NoRestingPrice {
            order_id: order.order_id.to_string(),
        })?;
        let entry = LevelEntry {
            order_id: order.order_id,
            owner_id: order.owner_id,
            sequence: order.sequence,
            remaining_quantity: order.remaining_quantity,
        };
        match order.side {
            Side::BUY => self.bids.insert(price, entry),
            Side::SELL => self.asks.insert(price, entry),
        }
        Ok(())
    }

    /// Remove a resting order from its side book
    ///
    /// Returns the queue entry's remaining quantity, or None if the
    /// order was not indexed (already swept or never rested).
    pub fn unindex(&mut self, order: &Order) -> Option<Quantity> {
        let price = order.price?;
        match order.side {
            Side::BUY => self.bids.remove(&order.order_id, price),
            Side::SELL => self.asks.remove(&order.order_id, price),
        }
    }

    /// Locate the next maker a taker on `taker_side` can hit
    ///
    /// Buys match against asks, sells against bids. `limit` of None is
    /// a market order. Entries owned by `exclude` are skipped in place.
    pub fn next_matchable(
        &self,
        taker_side: Side,
        limit: Option<Price>,
        exclude: &OwnerId,
    ) -> Option<(Price, usize)> {
        match taker_side {
            Side::BUY => self.asks.next_matchable(limit, exclude),
            Side::SELL => self.bids.next_matchable(limit, exclude),
        }
    }

    /// Clone the opposing entry at a located position
    pub fn opposing_entry_at(
        &self,
        taker_side: Side,
        price: Price,
        index: usize,
    ) -> Option<LevelEntry> {
        match taker_side {
            Side::BUY => self.asks.entry_at(price, index),
            Side::SELL => self.bids.entry_at(price, index),
        }
    }

    /// Reduce the opposing entry at a located position by `quantity`
    pub fn reduce_opposing_at(
        &mut self,
        taker_side: Side,
        price: Price,
        index: usize,
        quantity: Quantity,
    ) -> Option<Quantity> {
        match taker_side {
            Side::BUY => self.asks.reduce_entry_at(price, index, quantity),
            Side::SELL => self.bids.reduce_entry_at(price, index, quantity),
        }
    }

    /// Total opposing quantity a taker could fill, excluding its own
    /// resting liquidity
    pub fn available_opposing(
        &self,
        taker_side: Side,
        limit: Option<Price>,
        exclude: &OwnerId,
    ) -> Quantity {
        match taker_side {
            Side::BUY => self.asks.available_quantity(limit, exclude),
            Side::SELL => self.bids.available_quantity(limit, exclude),
        }
    }

    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.bids.best_bid()
    }

    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        self.asks.best_ask()
    }

    /// Depth per side: (price, quantity, order count), best price first
    pub fn depth(
        &self,
        max_levels: usize,
    ) -> (Vec<(Price, Quantity, usize)>, Vec<(Price, Quantity, usize)>) {
        (
            self.bids.depth_snapshot(max_levels),
            self.asks.depth_snapshot(max_levels),
        )
    }

    /// Plain crossed check: best bid at or above best ask
    ///
    /// Note that a book can legitimately hold a crossed pair when both
    /// sides belong to the same owner; admission only guarantees no
    /// cross against other owners' liquidity.
    pub fn is_crossed(&self) -> bool {
        match (self.bids.best_bid_price(), self.asks.best_ask_price()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    /// Number of orders currently indexed in the side books
    pub fn resting_count(&self) -> usize {
        self.bids.order_count() + self.asks.order_count()
    }

    /// Number of orders in the map, terminal included
    pub fn tracked_count(&self) -> usize {
        self.orders.len()
    }

    /// Drop every terminal record from the map
    ///
    /// Run at snapshot boundaries, so the exported state carries
    /// exactly the live book. The side books are untouched; terminal
    /// orders are never indexed. Returns how many records dropped.
    pub fn prune_terminal(&mut self) -> usize {
        let before = self.orders.len();
        self.orders.retain(|_, order| !order.status.is_terminal());
        before - self.orders.len()
    }

    /// Clone out every tracked order, sorted by admission sequence
    pub fn tracked_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.values().cloned().collect();
        orders.sort_by_key(|order| order.sequence);
        orders
    }

    /// Rebuild the book from a restored order set
    ///
    /// Tracks every order; indexes only those still open on a side.
    pub fn restore(&mut self, orders: Vec<Order>) -> Result<(), BookError> {
        for order in orders {
            let open = matches!(
                order.status,
                OrderStatus::Resting | OrderStatus::PartiallyFilled
            );
            self.track(order.clone())?;
            if open {
                self.index_resting(&order)?;
            }
        }
        Ok(())
    }
}
