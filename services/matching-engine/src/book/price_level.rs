//! Price level with a FIFO queue
//!
//! A price level holds every resting order at one price point, in
//! admission-sequence order. The sequence is the sole time-priority
//! tie-breaker; a partially filled order keeps its place.

use std::collections::VecDeque;
use types::ids::{OrderId, OwnerId};
use types::numeric::Quantity;

/// One resting order's footprint in the book
///
/// The full order record lives in the book's order map; the level keeps
/// only what matching needs per scan.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelEntry {
    pub order_id: OrderId,
    pub owner_id: OwnerId,
    /// Admission sequence, ascending within the queue.
    pub sequence: u64,
    pub remaining_quantity: Quantity,
}

/// A price level containing orders at a specific price
///
/// Maintains strict FIFO ordering for time-priority matching.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    /// Queue of orders at this price level (FIFO order)
    entries: VecDeque<LevelEntry>,
    /// Total quantity available at this level
    total_quantity: Quantity,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            total_quantity: Quantity::zero(),
        }
    }

    /// Insert an entry at the back of the queue (time priority)
    pub fn insert(&mut self, entry: LevelEntry) {
        debug_assert!(
            self.entries
                .back()
                .map(|last| last.sequence < entry.sequence)
                .unwrap_or(true),
            "Level entries must arrive in ascending sequence order"
        );
        self.total_quantity += entry.remaining_quantity;
        self.entries.push_back(entry);
    }

    /// Remove an order from the queue by OrderId
    ///
    /// Returns the remaining quantity of the removed order, or None if not found
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Quantity> {
        let position = self
            .entries
            .iter()
            .position(|entry| &entry.order_id == order_id)?;
        let entry = self.entries.remove(position)?;

        self.total_quantity = self.total_quantity.saturating_sub(entry.remaining_quantity);
        Some(entry.remaining_quantity)
    }

    /// Find the first entry not owned by `exclude`
    ///
    /// This is the self-trade skip: matching walks past an aggressor's own
    /// resting orders without touching them.
    pub fn first_matchable(&self, exclude: &OwnerId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| &entry.owner_id != exclude)
    }

    /// Get the entry at a queue position
    pub fn entry_at(&self, index: usize) -> Option<&LevelEntry> {
        self.entries.get(index)
    }

    /// Peek at the front entry without removing it
    pub fn peek_front(&self) -> Option<&LevelEntry> {
        self.entries.front()
    }

    /// Reduce the entry at `index` by `quantity`, removing it at zero
    ///
    /// Returns the entry's remaining quantity after the reduction, or None
    /// if the index is out of range.
    pub fn reduce_at(&mut self, index: usize, quantity: Quantity) -> Option<Quantity> {
        let entry = self.entries.get_mut(index)?;
        entry.remaining_quantity = entry.remaining_quantity.saturating_sub(quantity);
        self.total_quantity = self.total_quantity.saturating_sub(quantity);

        let after = entry.remaining_quantity;
        if after.is_zero() {
            self.entries.remove(index);
        }
        Some(after)
    }

    /// Total quantity at this level excluding one owner's orders
    pub fn available_excluding(&self, exclude: &OwnerId) -> Quantity {
        self.entries
            .iter()
            .filter(|entry| &entry.owner_id != exclude)
            .fold(Quantity::zero(), |acc, entry| {
                acc + entry.remaining_quantity
            })
    }

    /// Check if the price level is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the total quantity at this price level
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    /// Get the number of orders at this level
    pub fn order_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}
