//! Bid (buy-side) order book
//!
//! Maintains buy orders sorted by price descending (best bid first).
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use types::ids::{OrderId, OwnerId};
use types::numeric::{Price, Quantity};

use super::price_level::{LevelEntry, PriceLevel};

/// Bid (buy) side order book
///
/// Orders are sorted by price descending, so the highest bid is first.
/// At each price level, orders are maintained in admission-sequence order.
#[derive(Debug, Clone)]
pub struct BidBook {
    /// Price levels sorted descending (highest price first)
    /// Using BTreeMap ensures deterministic iteration
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    /// Create a new empty bid book
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Insert a resting entry into the bid book
    pub fn insert(&mut self, price: Price, entry: LevelEntry) {
        let level = self.levels.entry(price).or_insert_with(PriceLevel::new);
        level.insert(entry);
    }

    /// Remove an order from the bid book
    ///
    /// Returns the removed entry's remaining quantity if found.
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> Option<Quantity> {
        let level = self.levels.get_mut(&price)?;
        let removed = level.remove(order_id)?;
        // Remove empty price levels to keep book clean
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(removed)
    }

    /// Get the best bid (highest price)
    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        // BTreeMap iter is ascending, so we need last()
        self.levels
            .iter()
            .next_back()
            .map(|(price, level)| (*price, level.total_quantity()))
    }

    /// Get the best bid price
    pub fn best_bid_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    /// Locate the next entry an incoming sell can hit
    ///
    /// Walks prices from best to worst while they satisfy `limit`
    /// (None means a market order, which matches any price), skipping
    /// entries owned by `exclude`. A level that is entirely self-owned
    /// is passed over, not cancelled. Returns the price and queue index.
    pub fn next_matchable(
        &self,
        limit: Option<Price>,
        exclude: &OwnerId,
    ) -> Option<(Price, usize)> {
        for (&price, level) in self.levels.iter().rev() {
            if let Some(limit) = limit {
                if price < limit {
                    return None;
                }
            }
            if let Some(index) = level.first_matchable(exclude) {
                return Some((price, index));
            }
        }
        None
    }

    /// Clone the entry at a located position
    pub fn entry_at(&self, price: Price, index: usize) -> Option<LevelEntry> {
        self.levels
            .get(&price)
            .and_then(|level| level.entry_at(index))
            .cloned()
    }

    /// Reduce a located entry by `quantity`
    ///
    /// Exhausted entries and empty levels are removed. Returns the
    /// entry's remaining quantity after the reduction.
    pub fn reduce_entry_at(
        &mut self,
        price: Price,
        index: usize,
        quantity: Quantity,
    ) -> Option<Quantity> {
        let level = self.levels.get_mut(&price)?;
        let after = level.reduce_at(index, quantity)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(after)
    }

    /// Total quantity an incoming sell with `limit` could fill,
    /// excluding `exclude`'s own resting orders
    pub fn available_quantity(&self, limit: Option<Price>, exclude: &OwnerId) -> Quantity {
        let mut total = Quantity::zero();
        for (&price, level) in self.levels.iter().rev() {
            if let Some(limit) = limit {
                if price < limit {
                    break;
                }
            }
            total += level.available_excluding(exclude);
        }
        total
    }

    /// Get depth snapshot (top N price levels)
    ///
    /// Returns (price, total quantity, order count) per level,
    /// highest prices first.
    pub fn depth_snapshot(&self, depth: usize) -> Vec<(Price, Quantity, usize)> {
        self.levels
            .iter()
            .rev() // Reverse to get highest prices first
            .take(depth)
            .map(|(price, level)| (*price, level.total_quantity(), level.order_count()))
            .collect()
    }

    /// Check if the bid book is empty
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Get the total number of price levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Get the total number of resting orders across all levels
    pub fn order_count(&self) -> usize {
        self.levels.values().map(|level| level.order_count()).sum()
    }
}

impl Default for BidBook {
    fn default() -> Self {
        Self::new()
    }
}
