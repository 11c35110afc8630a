//! Ask (sell-side) order book
//!
//! Maintains sell orders sorted by price ascending (best ask first).
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use types::ids::{OrderId, OwnerId};
use types::numeric::{Price, Quantity};

use super::price_level::{LevelEntry, PriceLevel};

/// Ask (sell) side order book
///
/// Orders are sorted by price ascending, so the lowest ask is first.
/// At each price level, orders are maintained in admission-sequence order.
#[derive(Debug, Clone)]
pub struct AskBook {
    /// Price levels sorted ascending (lowest price first)
    /// Using BTreeMap ensures deterministic iteration
    levels: BTreeMap<Price, PriceLevel>,
}

impl AskBook {
    /// Create a new empty ask book
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Insert a resting entry into the ask book
    pub fn insert(&mut self, price: Price, entry: LevelEntry) {
        let level = self.levels.entry(price).or_insert_with(PriceLevel::new);
        level.insert(entry);
    }

    /// Remove an order from the ask book
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

    /// Get the best ask (lowest price)
    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        // BTreeMap iter is ascending, so first() gives us lowest price
        self.levels
            .iter()
            .next()
            .map(|(price, level)| (*price, level.total_quantity()))
    }

    /// Get the best ask price
    pub fn best_ask_price(&self) -> Option<Price> {
        self.levels.keys().next().copied()
    }

    /// Locate the next entry an incoming buy can hit
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
        for (&price, level) in self.levels.iter() {
            if let Some(limit) = limit {
                if price > limit {
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

    /// Total quantity an incoming buy with `limit` could fill,
    /// excluding `exclude`'s own resting orders
    pub fn available_quantity(&self, limit: Option<Price>, exclude: &OwnerId) -> Quantity {
        let mut total = Quantity::zero();
        for (&price, level) in self.levels.iter() {
            if let Some(limit) = limit {
                if price > limit {
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
    /// lowest prices first.
    pub fn depth_snapshot(&self, depth: usize) -> Vec<(Price, Quantity, usize)> {
        self.levels
            .iter()
            .take(depth)
            .map(|(price, level)| (*price, level.total_quantity(), level.order_count()))
            .collect()
    }

    /// Check if the ask book is empty
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

impl Default for AskBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(owner: OwnerId, seq: u64, qty: &str) -> LevelEntry {
        LevelEntry {
            order_id: OrderId::new(),
            owner_id: owner,
            sequence: seq,
            remaining_quantity: Quantity::from_str(qty).unwrap(),
        }
    }

    #[test]
    fn test_ask_book_insert() {
        let mut book = AskBook::new();

        book.insert(Price::from_u64(50000), entry(OwnerId::new(), 1, "1.0"));

        assert_eq!(book.level_count(), 1);
        assert!(!book.is_empty());
    }

    #[test]
    fn test_ask_book_best_ask() {
        let mut book = AskBook::new();
        let owner = OwnerId::new();

        book.insert(Price::from_u64(50000), entry(owner, 1, "1.0"));
        book.insert(Price::from_u64(51000), entry(owner, 2, "2.0")); // Higher price
        book.insert(Price::from_u64(49000), entry(owner, 3, "1.5")); // Lower price (best ask)

        let (best_price, best_qty) = book.best_ask().unwrap();
        assert_eq!(best_price, Price::from_u64(49000)); // Lowest price
        assert_eq!(best_qty, Quantity::from_str("1.5").unwrap());
    }

    #[test]
    fn test_ask_book_remove() {
        let mut book = AskBook::new();
        let e = entry(OwnerId::new(), 1, "1.0");
        let order_id = e.order_id;
        let price = Price::from_u64(50000);

        book.insert(price, e);
        assert_eq!(book.level_count(), 1);

        let removed = book.remove(&order_id, price);
        assert_eq!(removed, Some(Quantity::from_str("1.0").unwrap()));
        assert!(book.is_empty());
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn test_ask_book_next_matchable_respects_limit() {
        let mut book = AskBook::new();
        let maker = OwnerId::new();
        let taker = OwnerId::new();

        book.insert(Price::from_u64(50000), entry(maker, 1, "1.0"));
        book.insert(Price::from_u64(52000), entry(maker, 2, "2.0"));

        // Buy limit 51000: only the 50000 ask is marketable.
        let (price, index) = book
            .next_matchable(Some(Price::from_u64(51000)), &taker)
            .unwrap();
        assert_eq!(price, Price::from_u64(50000));
        assert_eq!(index, 0);

        // Buy limit 49000: nothing crosses.
        assert_eq!(book.next_matchable(Some(Price::from_u64(49000)), &taker), None);

        // Market buy sees the best ask.
        let (price, _) = book.next_matchable(None, &taker).unwrap();
        assert_eq!(price, Price::from_u64(50000));
    }

    #[test]
    fn test_ask_book_next_matchable_skips_own_liquidity() {
        let mut book = AskBook::new();
        let own = OwnerId::new();
        let other = OwnerId::new();

        book.insert(Price::from_u64(50000), entry(own, 1, "1.0"));
        book.insert(Price::from_u64(51000), entry(other, 2, "2.0"));

        // The better level is entirely self-owned; matching moves past it.
        let (price, index) = book.next_matchable(None, &own).unwrap();
        assert_eq!(price, Price::from_u64(51000));
        assert_eq!(index, 0);

        // The skipped order is untouched.
        assert_eq!(book.level_count(), 2);
    }

    #[test]
    fn test_ask_book_available_quantity() {
        let mut book = AskBook::new();
        let maker = OwnerId::new();
        let taker = OwnerId::new();

        book.insert(Price::from_u64(50000), entry(maker, 1, "1.0"));
        book.insert(Price::from_u64(51000), entry(maker, 2, "2.0"));
        book.insert(Price::from_u64(52000), entry(taker, 3, "4.0"));

        // Buy limit 51000 reaches 50000 and 51000; a higher limit would
        // only add the taker's own order, which never counts.
        assert_eq!(
            book.available_quantity(Some(Price::from_u64(51000)), &taker),
            Quantity::from_str("3.0").unwrap()
        );
        assert_eq!(
            book.available_quantity(None, &taker),
            Quantity::from_str("3.0").unwrap()
        );
    }

    #[test]
    fn test_ask_book_depth_snapshot() {
        let mut book = AskBook::new();
        let owner = OwnerId::new();

        book.insert(Price::from_u64(50000), entry(owner, 1, "1.0"));
        book.insert(Price::from_u64(51000), entry(owner, 2, "2.0"));
        book.insert(Price::from_u64(49000), entry(owner, 3, "1.5"));
        book.insert(Price::from_u64(52000), entry(owner, 4, "0.5"));

        let depth = book.depth_snapshot(2);

        // Should return top 2 levels (lowest prices first)
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].0, Price::from_u64(49000));
        assert_eq!(depth[1].0, Price::from_u64(50000));
    }

    #[test]
    fn test_ask_book_price_time_priority() {
        let mut book = AskBook::new();
        let owner = OwnerId::new();
        let price = Price::from_u64(50000);

        let first = entry(owner, 1, "1.0");
        let first_id = first.order_id;
        book.insert(price, first);
        book.insert(price, entry(owner, 2, "2.0")); // Same price, later sequence

        // Both orders share one level; the earlier sequence is at the front.
        assert_eq!(book.level_count(), 1);
        let (best_price, total_qty) = book.best_ask().unwrap();
        assert_eq!(best_price, price);
        assert_eq!(total_qty, Quantity::from_str("3.0").unwrap()); // 1.0 + 2.0

        let front = book.entry_at(price, 0).unwrap();
        assert_eq!(front.order_id, first_id);
    }
}
